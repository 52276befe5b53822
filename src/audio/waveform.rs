// src/audio/waveform.rs

use crate::audio::types::{SampleBuffer, WaveformPeaks};
use crate::error::{AudioError, Result};

/// Number of peak pairs produced when the caller does not ask for a count
pub const DEFAULT_NUM_PEAKS: usize = 2000;

/// Extract waveform peaks from a decoded buffer for visualization
///
/// The buffer is split into `num_peaks` equal segments and the min/max
/// sample across all channels is recorded for each one. Segments that
/// contain no frames (more peaks than frames) report 0.0.
///
/// # Example
/// ```
/// use audio_cutter_lib::audio::{extract_waveform_peaks, SampleBuffer};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let audio = SampleBuffer::new(vec![vec![0.25; 44100]], 44100)?;
/// let peaks = extract_waveform_peaks(&audio, Some(100))?;
/// assert_eq!(peaks.num_peaks, 100);
/// # Ok(())
/// # }
/// ```
pub fn extract_waveform_peaks(audio: &SampleBuffer, num_peaks: Option<usize>) -> Result<WaveformPeaks> {
    let num_peaks = num_peaks.unwrap_or(DEFAULT_NUM_PEAKS);

    if num_peaks == 0 {
        return Err(AudioError::InvalidParameter(
            "num_peaks must be greater than 0".to_string(),
        ));
    }

    let mut min_peaks = vec![f32::MAX; num_peaks];
    let mut max_peaks = vec![f32::MIN; num_peaks];

    let frames = audio.frame_count();
    let frames_per_peak = frames as f64 / num_peaks as f64;

    for channel in audio.channels() {
        for (frame, &sample) in channel.iter().enumerate() {
            let peak = ((frame as f64 / frames_per_peak) as usize).min(num_peaks - 1);
            min_peaks[peak] = min_peaks[peak].min(sample);
            max_peaks[peak] = max_peaks[peak].max(sample);
        }
    }

    // Segments no frame landed in
    for (min, max) in min_peaks.iter_mut().zip(max_peaks.iter_mut()) {
        if *min == f32::MAX {
            *min = 0.0;
        }
        if *max == f32::MIN {
            *max = 0.0;
        }
    }

    Ok(WaveformPeaks {
        min_peaks,
        max_peaks,
        num_peaks,
        duration_seconds: audio.duration_seconds(),
        sample_rate: audio.sample_rate(),
    })
}
