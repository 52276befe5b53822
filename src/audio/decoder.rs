// src/audio/decoder.rs

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::IntoSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Track};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::{Hint, ProbeResult};
use symphonia::core::sample::Sample;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, warn};

use crate::audio::types::{has_extension, AudioInfo, SampleBuffer};
use crate::error::{AudioError, Result};

/// Extensions accepted when opening or dropping a file
pub const SUPPORTED_INPUT_EXTENSIONS: [&str; 2] = ["mp3", "m4a"];

/// Check that a path names one of the accepted input types
pub fn ensure_supported_input<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if SUPPORTED_INPUT_EXTENSIONS
        .iter()
        .any(|ext| has_extension(path, ext))
    {
        Ok(())
    } else {
        Err(AudioError::UnsupportedFormat(format!(
            "Please choose an audio file (MP3 or M4A): {}",
            path.display()
        )))
    }
}

/// Decode a whole file into a planar [`SampleBuffer`]
///
/// Any format symphonia can probe is accepted here; the MP3/M4A restriction
/// is applied by [`ensure_supported_input`] when a file is opened for editing.
///
/// # Example
/// ```no_run
/// use audio_cutter_lib::audio::decode_audio_file;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let audio = decode_audio_file("episode.mp3")?;
/// println!("Loaded {} seconds of audio", audio.duration_seconds());
/// println!("Sample rate: {} Hz", audio.sample_rate());
/// println!("Channels: {}", audio.channel_count());
/// # Ok(())
/// # }
/// ```
pub fn decode_audio_file<P: AsRef<Path>>(path: P) -> Result<SampleBuffer> {
    let path = path.as_ref();
    decode_source(Box::new(open_file(path)?), extension_of(path))
}

/// Decode an in-memory copy of an audio file
///
/// `extension` is only a hint for format detection and may be `None`.
pub fn decode_audio_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Result<SampleBuffer> {
    decode_source(Box::new(Cursor::new(bytes)), extension)
}

fn extension_of(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}

fn open_file(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| AudioError::FileOpen {
        path: path.to_string_lossy().to_string(),
        source,
    })
}

/// First track with a real codec; cover art and data tracks are skipped
fn audio_track(format: &dyn FormatReader) -> Result<&Track> {
    format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::DecodeFailure("No audio track found in file".to_string()))
}

fn probe(source: Box<dyn MediaSource>, extension: Option<&str>) -> Result<ProbeResult> {
    let mss = MediaSourceStream::new(source, Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = extension {
        hint.with_extension(extension);
    }

    symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| AudioError::DecodeFailure(format!("Failed to probe format: {}", e)))
}

fn decode_source(source: Box<dyn MediaSource>, extension: Option<&str>) -> Result<SampleBuffer> {
    let mut format = probe(source, extension)?.format;

    let track = audio_track(&*format)?;
    let track_id = track.id;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| AudioError::DecodeFailure("Sample rate not found".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AudioError::DecodeFailure(format!("Failed to create decoder: {}", e)))?;

    // Channel count is not always in the container metadata (some MP3s), so
    // the planes are sized from the first decoded packet instead
    let mut channels: Vec<Vec<f32>> = Vec::new();
    let mut skipped_packets = 0usize;

    // Any read error ends the stream; symphonia reports EOF that way too
    while let Ok(packet) = format.next_packet() {
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                // A corrupt frame is dropped, the rest of the stream is still usable
                skipped_packets += 1;
                warn!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(AudioError::DecodeFailure(format!("Decode error: {}", e))),
        };

        if channels.is_empty() {
            channels = vec![Vec::new(); decoded.spec().channels.count()];
        }

        append_planes(&decoded, &mut channels);
    }

    if channels.is_empty() {
        return Err(AudioError::DecodeFailure(
            "No audio could be decoded from the file".to_string(),
        ));
    }

    debug!(
        channels = channels.len(),
        frames = channels[0].len(),
        sample_rate,
        skipped_packets,
        "decoded audio"
    );

    SampleBuffer::new(channels, sample_rate)
}

/// Append one decoded packet to the per-channel sample vectors
///
/// Handles every symphonia sample format and converts to f32 in [-1.0, 1.0]
fn append_planes(buffer: &AudioBufferRef, output: &mut [Vec<f32>]) {
    match buffer {
        AudioBufferRef::U8(buf) => append_typed(buf, output),
        AudioBufferRef::U16(buf) => append_typed(buf, output),
        AudioBufferRef::U24(buf) => append_typed(buf, output),
        AudioBufferRef::U32(buf) => append_typed(buf, output),
        AudioBufferRef::S8(buf) => append_typed(buf, output),
        AudioBufferRef::S16(buf) => append_typed(buf, output),
        AudioBufferRef::S24(buf) => append_typed(buf, output),
        AudioBufferRef::S32(buf) => append_typed(buf, output),
        AudioBufferRef::F32(buf) => append_typed(buf, output),
        AudioBufferRef::F64(buf) => append_typed(buf, output),
    }
}

fn append_typed<S>(buffer: &AudioBuffer<S>, output: &mut [Vec<f32>])
where
    S: Sample + IntoSample<f32>,
{
    for (ch, channel) in output.iter_mut().enumerate() {
        // A stream that changes layout mid-way keeps its original channel count
        if ch >= buffer.spec().channels.count() {
            channel.extend(std::iter::repeat(0.0).take(buffer.frames()));
            continue;
        }
        channel.extend(buffer.chan(ch).iter().map(|&s| IntoSample::<f32>::into_sample(s)));
    }
}

/// Probe a file for duration, rate, channels and codec
///
/// Only the container headers are read; duration is 0.0 when the container
/// does not state a frame count.
///
/// # Example
/// ```no_run
/// use audio_cutter_lib::audio::get_audio_info;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let info = get_audio_info("episode.mp3")?;
/// println!("Duration: {:.2} minutes", info.duration_seconds / 60.0);
/// println!("Format: {}", info.format);
/// # Ok(())
/// # }
/// ```
pub fn get_audio_info<P: AsRef<Path>>(path: P) -> Result<AudioInfo> {
    let path = path.as_ref();
    let format = probe(Box::new(open_file(path)?), extension_of(path))?.format;
    let params = &audio_track(&*format)?.codec_params;

    let duration_seconds = match (params.n_frames, params.sample_rate) {
        (Some(frames), Some(rate)) if rate > 0 => frames as f64 / rate as f64,
        _ => 0.0,
    };

    let codec = symphonia::default::get_codecs()
        .get_codec(params.codec)
        .map(|descriptor| descriptor.short_name.to_uppercase())
        .unwrap_or_else(|| format!("{:?}", params.codec));

    Ok(AudioInfo {
        duration_seconds,
        sample_rate: params.sample_rate.unwrap_or_default(),
        channels: params.channels.map_or(0, |c| c.count() as u16),
        format: codec,
        bit_depth: params.bits_per_sample.map(|bits| bits as u16),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::encoder::encode_wav;
    use crate::error::ErrorKind;

    #[test]
    fn test_decode_wav_bytes() {
        let left: Vec<f32> = (0..4410).map(|i| (i as f32 / 4410.0) - 0.5).collect();
        let right: Vec<f32> = left.iter().map(|s| -s).collect();
        let source = SampleBuffer::new(vec![left.clone(), right], 44100).unwrap();

        let bytes = encode_wav(&source).unwrap();
        let decoded = decode_audio_bytes(bytes, Some("wav")).unwrap();

        assert_eq!(decoded.sample_rate(), 44100);
        assert_eq!(decoded.channel_count(), 2);
        assert_eq!(decoded.frame_count(), 4410);

        // Planar layout survives: left and right are mirror images
        for i in (0..4410).step_by(441) {
            assert!((decoded.channel(0)[i] - left[i]).abs() < 1e-3);
            assert!((decoded.channel(1)[i] + left[i]).abs() < 1e-3);
        }
    }

    #[test]
    fn test_decode_garbage_fails() {
        let result = decode_audio_bytes(vec![0u8; 256], None);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::DecodeFailure);
    }

    #[test]
    fn test_file_not_found() {
        let result = decode_audio_file("/nonexistent/file.mp3");
        assert!(matches!(result, Err(AudioError::FileOpen { .. })));
    }

    #[test]
    fn test_supported_inputs() {
        assert!(ensure_supported_input("song.mp3").is_ok());
        assert!(ensure_supported_input("song.M4A").is_ok());
        assert!(ensure_supported_input("song.flac").is_err());
        assert!(ensure_supported_input("song").is_err());
    }
}
