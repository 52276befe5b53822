// src/audio/encoder.rs

use crate::audio::types::SampleBuffer;
use crate::error::{AudioError, Result};

/// Size of the canonical RIFF/WAVE header written by `encode_wav`
pub const WAV_HEADER_LEN: usize = 44;

/// Convert a float sample to 16-bit PCM
///
/// The sample is clamped to [-1.0, 1.0]; negative values scale by 32768 and
/// non-negative values by 32767, so both extremes map exactly onto the i16 range.
pub fn sample_to_i16(sample: f32) -> i16 {
    let sample = sample.clamp(-1.0, 1.0);
    let scaled = if sample < 0.0 {
        sample * 32768.0
    } else {
        sample * 32767.0
    };
    scaled.round() as i16
}

/// Encode a sample buffer as a 16-bit PCM WAV file in memory
///
/// Produces a 44-byte header followed by little-endian samples, interleaved
/// one frame at a time in channel order. The output is byte-for-byte
/// deterministic for a given buffer.
///
/// # Example
/// ```
/// use audio_cutter_lib::audio::{encode_wav, SampleBuffer};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let audio = SampleBuffer::new(vec![vec![0.0, 0.5, -0.5, 1.0, -1.0]], 44100)?;
///
/// let bytes = encode_wav(&audio)?;
/// assert_eq!(&bytes[0..4], b"RIFF");
/// assert_eq!(bytes.len(), 44 + 5 * 2);
/// # Ok(())
/// # }
/// ```
pub fn encode_wav(audio: &SampleBuffer) -> Result<Vec<u8>> {
    let channels = audio.channel_count() as u32;
    let frames = audio.frame_count();

    let data_len = u32::try_from(frames as u64 * channels as u64 * 2)
        .ok()
        .filter(|len| *len <= u32::MAX - 36)
        .ok_or_else(|| {
            AudioError::encoding(
                "wav header",
                format!("{} frames do not fit in a WAV data chunk", frames),
            )
        })?;

    let block_align = u16::try_from(channels * 2).map_err(|_| {
        AudioError::encoding("wav header", format!("{} channels do not fit in a WAV header", channels))
    })?;
    let byte_rate = audio
        .sample_rate()
        .checked_mul(u32::from(block_align))
        .ok_or_else(|| {
            AudioError::encoding(
                "wav header",
                format!("{} Hz is too high a rate for a WAV header", audio.sample_rate()),
            )
        })?;

    let mut out = Vec::with_capacity(WAV_HEADER_LEN + data_len as usize);

    // RIFF chunk descriptor
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    // fmt sub-chunk: plain PCM, 16 bits per sample
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&(channels as u16).to_le_bytes());
    out.extend_from_slice(&audio.sample_rate().to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());

    // data sub-chunk
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());

    for frame in 0..frames {
        for channel in audio.channels() {
            out.extend_from_slice(&sample_to_i16(channel[frame]).to_le_bytes());
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::WavReader;
    use std::io::Cursor;

    fn u16_at(bytes: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
    }

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    }

    #[test]
    fn test_header_layout() {
        let audio = SampleBuffer::new(vec![vec![0.0; 10], vec![0.0; 10]], 48000).unwrap();
        let bytes = encode_wav(&audio).unwrap();

        assert_eq!(bytes.len(), 44 + 40);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(u32_at(&bytes, 4), 36 + 40);
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(u32_at(&bytes, 16), 16);
        assert_eq!(u16_at(&bytes, 20), 1);
        assert_eq!(u16_at(&bytes, 22), 2);
        assert_eq!(u32_at(&bytes, 24), 48000);
        assert_eq!(u32_at(&bytes, 28), 48000 * 2 * 2);
        assert_eq!(u16_at(&bytes, 32), 4);
        assert_eq!(u16_at(&bytes, 34), 16);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(u32_at(&bytes, 40), 40);
    }

    #[test]
    fn test_sample_conversion() {
        assert_eq!(sample_to_i16(0.0), 0);
        assert_eq!(sample_to_i16(1.0), 32767);
        assert_eq!(sample_to_i16(-1.0), -32768);
        assert_eq!(sample_to_i16(2.0), 32767);
        assert_eq!(sample_to_i16(-3.0), -32768);
        assert_eq!(sample_to_i16(0.5), 16384);
        assert_eq!(sample_to_i16(-0.5), -16384);
    }

    #[test]
    fn test_interleaving_order() {
        let audio = SampleBuffer::new(vec![vec![1.0, 0.0], vec![-1.0, 0.5]], 8000).unwrap();
        let bytes = encode_wav(&audio).unwrap();

        let data: Vec<i16> = bytes[44..]
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(data, vec![32767, -32768, 0, 16384]);
    }

    #[test]
    fn test_encode_and_decode_wav() {
        let original: Vec<f32> = (0..1000).map(|i| ((i as f32) * 0.01).sin() * 0.9).collect();
        let test_audio = SampleBuffer::new(vec![original.clone()], 44100).unwrap();

        let bytes = encode_wav(&test_audio).unwrap();

        // Read it back
        let mut reader = WavReader::new(Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 44100);
        assert_eq!(spec.bits_per_sample, 16);

        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();

        // Verify within one quantization step
        assert_eq!(samples.len(), original.len());
        for (original, decoded) in original.iter().zip(samples.iter()) {
            let decoded = if *decoded < 0 {
                *decoded as f32 / 32768.0
            } else {
                *decoded as f32 / 32767.0
            };
            assert!((original - decoded).abs() <= 1.0 / 32767.0);
        }
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let audio = SampleBuffer::new(vec![vec![0.1, -0.2, 0.3]], 22050).unwrap();
        assert_eq!(encode_wav(&audio).unwrap(), encode_wav(&audio).unwrap());
    }

    #[test]
    fn test_byte_rate_overflow_is_an_encoding_failure() {
        let audio = SampleBuffer::silent(2, 1, u32::MAX / 2).unwrap();

        let err = encode_wav(&audio).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::EncodingFailure);
        assert!(err.to_string().contains("wav header"));
    }

    #[test]
    fn test_empty_buffer_has_header_only() {
        let audio = SampleBuffer::silent(1, 0, 44100).unwrap();
        let bytes = encode_wav(&audio).unwrap();
        assert_eq!(bytes.len(), 44);
        assert_eq!(u32_at(&bytes, 40), 0);
    }
}
