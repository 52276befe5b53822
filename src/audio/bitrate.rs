// src/audio/bitrate.rs

use tracing::debug;

use crate::audio::types::Bitrate;

/// Share of the file assumed to be audio payload rather than container/tag overhead
pub const DEFAULT_OVERHEAD_FACTOR: f64 = 0.95;

/// Picks an MP3 export bitrate close to the source's average bitrate
#[derive(Debug, Clone, Copy)]
pub struct BitrateEstimator {
    overhead_factor: f64,
    fallback: Bitrate,
}

impl Default for BitrateEstimator {
    fn default() -> Self {
        Self {
            overhead_factor: DEFAULT_OVERHEAD_FACTOR,
            fallback: Bitrate::default(),
        }
    }
}

impl BitrateEstimator {
    pub fn new(overhead_factor: f64, fallback: Bitrate) -> Self {
        Self {
            overhead_factor,
            fallback,
        }
    }

    /// Estimate the target bitrate from the source file size and decoded duration
    ///
    /// Falls back to the default rate when the duration is unusable or the
    /// source is not an MP3 (its size says nothing about an MP3 bitrate).
    ///
    /// # Example
    /// ```
    /// use audio_cutter_lib::audio::{Bitrate, BitrateEstimator};
    ///
    /// // 60s at ~192 kbps
    /// let estimator = BitrateEstimator::default();
    /// let bitrate = estimator.estimate(Some(1_515_789), 60.0, true);
    /// assert_eq!(bitrate, Bitrate::Kbps192);
    /// ```
    pub fn estimate(&self, file_size_bytes: Option<u64>, duration_seconds: f64, is_mp3: bool) -> Bitrate {
        let Some(size) = file_size_bytes else {
            return self.fallback;
        };

        if !is_mp3 || !duration_seconds.is_finite() || duration_seconds <= 0.0 {
            return self.fallback;
        }

        let estimated_kbps =
            (size as f64 * 8.0 * self.overhead_factor / duration_seconds / 1000.0).round();
        let bitrate = quantize_bitrate(estimated_kbps as u32);

        debug!(
            file_size_bytes = size,
            duration_seconds,
            estimated_kbps,
            chosen_kbps = bitrate.kbps(),
            "estimated source bitrate"
        );

        bitrate
    }
}

/// Snap an estimated kbps value to the nearest supported MP3 bitrate
pub fn quantize_bitrate(kbps: u32) -> Bitrate {
    match kbps {
        0..=160 => Bitrate::Kbps128,
        161..=224 => Bitrate::Kbps192,
        225..=288 => Bitrate::Kbps256,
        _ => Bitrate::Kbps320,
    }
}
