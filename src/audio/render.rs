// src/audio/render.rs

use tracing::debug;

use crate::audio::types::{CutWindow, SampleBuffer};
use crate::error::{AudioError, Result};

/// Render the cut window of a source buffer with its fades applied
///
/// The output has `round((outro - intro) * sample_rate)` frames. Frame `i`
/// of the output is source frame `round(intro * sample_rate) + i`, scaled by
/// the gain envelope at `i / sample_rate` and clamped to [-1.0, 1.0]. The
/// source buffer is never modified.
///
/// # Example
/// ```
/// use audio_cutter_lib::audio::{render_cut, CutWindow, SampleBuffer};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// // 10 seconds of stereo at 44.1kHz
/// let source = SampleBuffer::new(vec![vec![0.5; 441000]; 2], 44100)?;
///
/// // Keep 5s..10s with a one second fade-out
/// let window = CutWindow::new(5.0, 10.0, 0.0, 1.0)?;
/// let rendered = render_cut(&source, &window)?;
///
/// assert_eq!(rendered.duration_seconds(), 5.0);
/// assert_eq!(rendered.sample_rate(), 44100);
/// assert_eq!(rendered.channel_count(), 2);
/// # Ok(())
/// # }
/// ```
pub fn render_cut(source: &SampleBuffer, window: &CutWindow) -> Result<SampleBuffer> {
    let sample_rate = source.sample_rate() as f64;
    let duration = source.duration_seconds();

    // Allow half a sample of slack for cut points taken from a rounded display
    if window.outro_seconds > duration + 0.5 / sample_rate {
        return Err(AudioError::InvalidCutWindow(format!(
            "Cut range ({}s to {}s) exceeds audio duration ({}s)",
            window.intro_seconds, window.outro_seconds, duration
        )));
    }

    let start_frame = (window.intro_seconds * sample_rate).round() as usize;
    let frames = (window.window_seconds() * sample_rate).round() as usize;

    if frames == 0 {
        return Err(AudioError::InvalidCutWindow(format!(
            "Cut range ({}s to {}s) is shorter than one sample",
            window.intro_seconds, window.outro_seconds
        )));
    }

    let gains: Vec<f32> = (0..frames)
        .map(|i| gain_at(i as f64 / sample_rate, window) as f32)
        .collect();

    let channels = source
        .channels()
        .iter()
        .map(|channel| {
            let available = channel.get(start_frame..).unwrap_or(&[]);
            let mut out = Vec::with_capacity(frames);
            out.extend(
                available
                    .iter()
                    .zip(&gains)
                    .map(|(&sample, &gain)| (sample * gain).clamp(-1.0, 1.0)),
            );
            // Rounding can ask for a frame past the end of the source; that is silence
            out.resize(frames, 0.0);
            out
        })
        .collect();

    debug!(
        start_frame,
        frames,
        fade_in = window.fade_in_seconds,
        fade_out = window.fade_out_seconds,
        "rendered cut window"
    );

    SampleBuffer::new(channels, source.sample_rate())
}

/// Gain at `t` seconds from the start of the cut window
///
/// Fade-in ramps 0 -> 1 over `[0, fade_in]`, fade-out ramps 1 -> 0 over
/// `[window - fade_out, window]`. Where the two ramps overlap the fade-out
/// wins, matching a gain automation where the fade-out is scheduled last.
pub fn gain_at(t: f64, window: &CutWindow) -> f64 {
    let length = window.window_seconds();

    if window.fade_out_seconds > 0.0 {
        let fade_out_start = length - window.fade_out_seconds;
        if t >= fade_out_start {
            return ((length - t) / window.fade_out_seconds).clamp(0.0, 1.0);
        }
    }

    if window.fade_in_seconds > 0.0 && t < window.fade_in_seconds {
        return (t / window.fade_in_seconds).clamp(0.0, 1.0);
    }

    1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    /// Constant-amplitude test audio
    fn create_test_audio(duration_seconds: f64, sample_rate: u32, channels: u16) -> SampleBuffer {
        let frames = (duration_seconds * sample_rate as f64) as usize;
        SampleBuffer::new(vec![vec![0.5f32; frames]; channels as usize], sample_rate).unwrap()
    }

    /// Each sample holds its own frame index scaled into range
    fn create_ramp_audio(frames: usize, sample_rate: u32) -> SampleBuffer {
        let samples = (0..frames).map(|i| i as f32 / frames as f32).collect();
        SampleBuffer::new(vec![samples], sample_rate).unwrap()
    }

    #[test]
    fn test_trim_middle_section() {
        let audio = create_test_audio(10.0, 44100, 2);

        let window = CutWindow::new(3.0, 7.0, 0.0, 0.0).unwrap();
        let trimmed = render_cut(&audio, &window).unwrap();

        assert_eq!(trimmed.duration_seconds(), 4.0);
        assert_eq!(trimmed.channel_count(), 2);
    }

    #[test]
    fn test_trim_frame_alignment() {
        let rate = 1000;
        let audio = create_ramp_audio(5000, rate);

        let window = CutWindow::new(1.2345, 3.4567, 0.0, 0.0).unwrap();
        let trimmed = render_cut(&audio, &window).unwrap();

        let expected_frames = ((3.4567 - 1.2345) * rate as f64).round() as usize;
        let first_frame = (1.2345 * rate as f64).round() as usize;
        assert_eq!(trimmed.frame_count(), expected_frames);
        assert_eq!(trimmed.channel(0)[0], audio.channel(0)[first_frame]);
        assert_eq!(trimmed.channel(0)[10], audio.channel(0)[first_frame + 10]);
    }

    #[test]
    fn test_source_is_not_modified() {
        let audio = create_test_audio(2.0, 8000, 1);
        let before = audio.clone();

        let window = CutWindow::new(0.5, 1.5, 0.25, 0.25).unwrap();
        render_cut(&audio, &window).unwrap();

        assert_eq!(audio, before);
    }

    #[test]
    fn test_trim_out_of_bounds() {
        let audio = create_test_audio(10.0, 44100, 2);

        let window = CutWindow::new(5.0, 15.0, 0.0, 0.0).unwrap();
        let result = render_cut(&audio, &window);

        match result {
            Err(e) => assert_eq!(e.kind(), ErrorKind::InvalidCutWindow),
            Ok(_) => panic!("Expected InvalidCutWindow error"),
        }
    }

    #[test]
    fn test_sub_sample_window_is_rejected() {
        let audio = create_test_audio(1.0, 100, 1);
        let window = CutWindow::new(0.5, 0.501, 0.0, 0.0).unwrap();
        assert!(render_cut(&audio, &window).is_err());
    }

    #[test]
    fn test_fade_in_envelope() {
        let rate = 1000;
        let audio = create_test_audio(4.0, rate, 1);

        let window = CutWindow::new(0.0, 4.0, 1.0, 0.0).unwrap();
        let out = render_cut(&audio, &window).unwrap();
        let samples = out.channel(0);

        assert_eq!(samples[0], 0.0);
        assert!((samples[500] - 0.25).abs() < 1e-6);
        assert!((samples[1000] - 0.5).abs() < 1e-6);
        assert!((samples[3000] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_fade_out_envelope() {
        let rate = 1000;
        let audio = create_test_audio(4.0, rate, 1);

        let window = CutWindow::new(0.0, 4.0, 0.0, 1.0).unwrap();
        let out = render_cut(&audio, &window).unwrap();
        let samples = out.channel(0);

        assert!((samples[2999] - 0.5).abs() < 1e-6);
        assert!((samples[3000] - 0.5).abs() < 1e-6);
        assert!((samples[3500] - 0.25).abs() < 1e-6);
        assert!(samples[3999] < 0.001);
    }

    #[test]
    fn test_overlapping_fades_last_write_wins() {
        let window = CutWindow::new(0.0, 1.0, 0.8, 0.8).unwrap();

        // Before the fade-out starts the fade-in ramp applies
        assert!((gain_at(0.1, &window) - 0.125).abs() < 1e-9);
        // From 0.2s the fade-out ramp replaces the fade-in
        assert!((gain_at(0.2, &window) - 1.0).abs() < 1e-9);
        assert!((gain_at(0.6, &window) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_output_is_clamped() {
        let audio = SampleBuffer::new(vec![vec![1.5, -2.0, 0.25, 0.75]], 4).unwrap();
        let window = CutWindow::new(0.0, 1.0, 0.0, 0.0).unwrap();
        let out = render_cut(&audio, &window).unwrap();

        assert_eq!(out.channel(0), &[1.0, -1.0, 0.25, 0.75]);
    }

    #[test]
    fn test_no_fades_keeps_unity_gain() {
        let window = CutWindow::new(2.0, 5.0, 0.0, 0.0).unwrap();
        assert_eq!(gain_at(0.0, &window), 1.0);
        assert_eq!(gain_at(2.999, &window), 1.0);
    }
}
