use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{AudioError, Result};

/// Decoded audio held in memory as planar PCM samples
///
/// Each channel is its own `Vec<f32>` of samples in the range [-1.0, 1.0].
/// All channels always have the same length, and there is at least one.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl SampleBuffer {
    /// Create a buffer from per-channel sample vectors
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if channels.is_empty() {
            return Err(AudioError::DecodeFailure(
                "Sample buffer needs at least one channel".to_string(),
            ));
        }

        if sample_rate == 0 {
            return Err(AudioError::DecodeFailure(
                "Sample rate must be positive".to_string(),
            ));
        }

        let frames = channels[0].len();
        if channels.iter().any(|c| c.len() != frames) {
            return Err(AudioError::DecodeFailure(
                "All channels must have the same length".to_string(),
            ));
        }

        Ok(Self {
            channels,
            sample_rate,
        })
    }

    /// Create a zero-filled buffer
    pub fn silent(channel_count: u16, frames: usize, sample_rate: u32) -> Result<Self> {
        Self::new(vec![vec![0.0; frames]; channel_count as usize], sample_rate)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> u16 {
        self.channels.len() as u16
    }

    /// Number of frames (one sample per channel)
    pub fn frame_count(&self) -> usize {
        self.channels[0].len()
    }

    /// Total duration in seconds: frame_count / sample_rate
    pub fn duration_seconds(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }
}

/// The retained region of the source and the fades applied to it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CutWindow {
    /// Start of the retained region in seconds
    pub intro_seconds: f64,

    /// End of the retained region in seconds (exclusive)
    pub outro_seconds: f64,

    /// Linear fade-in length in seconds, 0 for none
    pub fade_in_seconds: f64,

    /// Linear fade-out length in seconds, 0 for none
    pub fade_out_seconds: f64,
}

impl CutWindow {
    /// Create a cut window with validation
    ///
    /// Overlapping fades are accepted; see `render::gain_at` for how they combine.
    pub fn new(
        intro_seconds: f64,
        outro_seconds: f64,
        fade_in_seconds: f64,
        fade_out_seconds: f64,
    ) -> Result<Self> {
        if !intro_seconds.is_finite() || !outro_seconds.is_finite() {
            return Err(AudioError::InvalidCutWindow(format!(
                "Cut points must be finite: {} to {}",
                intro_seconds, outro_seconds
            )));
        }

        if intro_seconds < 0.0 {
            return Err(AudioError::InvalidCutWindow(format!(
                "Intro cannot be negative: {}",
                intro_seconds
            )));
        }

        if outro_seconds <= intro_seconds {
            return Err(AudioError::InvalidCutWindow(format!(
                "Outro ({}) must be after intro ({})",
                outro_seconds, intro_seconds
            )));
        }

        for (name, value) in [("Fade-in", fade_in_seconds), ("Fade-out", fade_out_seconds)] {
            if !value.is_finite() || value < 0.0 {
                return Err(AudioError::InvalidCutWindow(format!(
                    "{} duration must be a non-negative number: {}",
                    name, value
                )));
            }
        }

        Ok(Self {
            intro_seconds,
            outro_seconds,
            fade_in_seconds,
            fade_out_seconds,
        })
    }

    /// Length of the retained region in seconds
    pub fn window_seconds(&self) -> f64 {
        self.outro_seconds - self.intro_seconds
    }
}

/// Discrete MP3 bitrates the exporter targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bitrate {
    Kbps128,
    Kbps192,
    Kbps256,
    Kbps320,
}

impl Bitrate {
    pub fn kbps(self) -> u32 {
        match self {
            Bitrate::Kbps128 => 128,
            Bitrate::Kbps192 => 192,
            Bitrate::Kbps256 => 256,
            Bitrate::Kbps320 => 320,
        }
    }
}

impl Default for Bitrate {
    fn default() -> Self {
        Bitrate::Kbps256
    }
}

/// Parameters the MP3 frame encoder is constructed with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingParameters {
    pub channel_count: u16,
    pub sample_rate: u32,
    pub bitrate: Bitrate,
}

impl EncodingParameters {
    /// Copy channel count and sample rate from the buffer being encoded
    pub fn for_buffer(buffer: &SampleBuffer, bitrate: Bitrate) -> Self {
        Self {
            channel_count: buffer.channel_count(),
            sample_rate: buffer.sample_rate(),
            bitrate,
        }
    }
}

/// Output container, inferred from the destination extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Container {
    Mp3,
    Wav,
}

impl Container {
    /// `.mp3` selects MP3; everything else (M4A included) falls back to WAV
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        if has_extension(path, "mp3") {
            Container::Mp3
        } else {
            Container::Wav
        }
    }
}

/// Case-insensitive extension check
pub fn has_extension<P: AsRef<Path>>(path: P, wanted: &str) -> bool {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(wanted))
        .unwrap_or(false)
}

/// Container-level facts about a file, as reported by `info`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioInfo {
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,

    /// Audio format/codec name (e.g., "MP3", "AAC")
    pub format: String,

    /// Bit depth if available (e.g., 16, 24)
    pub bit_depth: Option<u16>,
}

/// Min/max peak pairs for drawing a waveform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveformPeaks {
    pub min_peaks: Vec<f32>,
    pub max_peaks: Vec<f32>,
    pub num_peaks: usize,
    pub duration_seconds: f64,
    pub sample_rate: u32,
}
