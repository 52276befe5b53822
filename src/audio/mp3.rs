// src/audio/mp3.rs

use std::mem::MaybeUninit;

use mp3lame_encoder::{Builder, DualPcm, FlushNoGap, MonoPcm};
use tracing::debug;

use crate::audio::encoder::sample_to_i16;
use crate::audio::types::{Bitrate, EncodingParameters, SampleBuffer};
use crate::error::{AudioError, Result};

/// Frames handed to the frame encoder per call
pub const MP3_BLOCK_FRAMES: usize = 1152;

/// Frame-level MP3 encoder consumed as a black box
///
/// Implementations are configured at construction with channel count, sample
/// rate and bitrate (see [`FrameEncoderFactory`]). Each call returns the MP3
/// bytes produced so far, which may be empty.
pub trait FrameEncoder {
    /// Encode one block; `right` is `Some` only for stereo input
    fn encode_block(&mut self, left: &[i16], right: Option<&[i16]>) -> Result<Vec<u8>>;

    /// Emit whatever the encoder still holds
    fn flush(&mut self) -> Result<Vec<u8>>;
}

/// Builds a configured [`FrameEncoder`] for one export
pub trait FrameEncoderFactory: Send + Sync {
    fn create(&self, params: &EncodingParameters) -> Result<Box<dyn FrameEncoder>>;
}

/// Encode a sample buffer to an MP3 byte stream
///
/// Every channel is split into blocks of [`MP3_BLOCK_FRAMES`] frames; the last
/// block is zero-padded to full length. Non-empty chunks returned by the
/// encoder are concatenated in call order, followed by the flush output.
pub fn encode_mp3(
    audio: &SampleBuffer,
    params: &EncodingParameters,
    factory: &dyn FrameEncoderFactory,
) -> Result<Vec<u8>> {
    let stereo = match audio.channel_count() {
        1 => false,
        2 => true,
        n => {
            return Err(AudioError::encoding(
                "setup",
                format!("MP3 export supports mono or stereo, got {} channels", n),
            ))
        }
    };

    let mut encoder = factory.create(params)?;

    let frames = audio.frame_count();
    let mut left = vec![0i16; MP3_BLOCK_FRAMES];
    let mut right = vec![0i16; if stereo { MP3_BLOCK_FRAMES } else { 0 }];
    let mut output = Vec::new();
    let mut blocks = 0usize;

    for start in (0..frames).step_by(MP3_BLOCK_FRAMES) {
        let end = (start + MP3_BLOCK_FRAMES).min(frames);

        fill_block(&mut left, &audio.channel(0)[start..end]);
        let chunk = if stereo {
            fill_block(&mut right, &audio.channel(1)[start..end]);
            encoder.encode_block(&left, Some(&right))?
        } else {
            encoder.encode_block(&left, None)?
        };

        if !chunk.is_empty() {
            output.extend_from_slice(&chunk);
        }
        blocks += 1;
    }

    let tail = encoder.flush()?;
    if !tail.is_empty() {
        output.extend_from_slice(&tail);
    }

    debug!(
        blocks,
        bytes = output.len(),
        bitrate_kbps = params.bitrate.kbps(),
        "encoded MP3 stream"
    );

    Ok(output)
}

/// Copy a slice of float samples into a block, zeroing the unfilled tail
fn fill_block(block: &mut [i16], samples: &[f32]) {
    for (dst, &src) in block.iter_mut().zip(samples) {
        *dst = sample_to_i16(src);
    }
    block[samples.len()..].fill(0);
}

/// Creates LAME-backed frame encoders
#[derive(Debug, Default, Clone, Copy)]
pub struct LameEncoderFactory;

impl FrameEncoderFactory for LameEncoderFactory {
    fn create(&self, params: &EncodingParameters) -> Result<Box<dyn FrameEncoder>> {
        Ok(Box::new(LameFrameEncoder::new(params)?))
    }
}

/// Native MP3 frame encoder using LAME via the mp3lame-encoder crate
pub struct LameFrameEncoder {
    encoder: mp3lame_encoder::Encoder,
}

impl LameFrameEncoder {
    pub fn new(params: &EncodingParameters) -> Result<Self> {
        let mut builder = Builder::new()
            .ok_or_else(|| AudioError::encoding("init", "LAME encoder init failed"))?;

        builder
            .set_num_channels(params.channel_count as u8)
            .map_err(|e| lame_error("set channels", e))?;

        builder
            .set_sample_rate(params.sample_rate)
            .map_err(|e| lame_error("set sample rate", e))?;

        builder
            .set_brate(lame_bitrate(params.bitrate))
            .map_err(|e| lame_error("set bitrate", e))?;

        builder
            .set_quality(mp3lame_encoder::Quality::Best)
            .map_err(|e| lame_error("set quality", e))?;

        let encoder = builder.build().map_err(|e| lame_error("build", e))?;

        Ok(Self { encoder })
    }
}

impl FrameEncoder for LameFrameEncoder {
    fn encode_block(&mut self, left: &[i16], right: Option<&[i16]>) -> Result<Vec<u8>> {
        let mut out: Vec<u8> =
            Vec::with_capacity(mp3lame_encoder::max_required_buffer_size(left.len()));

        let written = match right {
            Some(right) => self
                .encoder
                .encode(DualPcm { left, right }, out.spare_capacity_mut()),
            None => self.encoder.encode(MonoPcm(left), out.spare_capacity_mut()),
        }
        .map_err(|e| lame_error("encode", e))?;

        // SAFETY: the encoder initialised `written` bytes of spare capacity
        unsafe {
            out.set_len(written);
        }

        Ok(out)
    }

    fn flush(&mut self) -> Result<Vec<u8>> {
        // LAME needs at most 7200 bytes to flush its internal buffers
        let mut out: Vec<u8> = Vec::with_capacity(7200);
        let spare: &mut [MaybeUninit<u8>] = out.spare_capacity_mut();

        let written = self
            .encoder
            .flush::<FlushNoGap>(spare)
            .map_err(|e| lame_error("flush", e))?;

        // SAFETY: the encoder initialised `written` bytes of spare capacity
        unsafe {
            out.set_len(written);
        }

        Ok(out)
    }
}

fn lame_bitrate(bitrate: Bitrate) -> mp3lame_encoder::Bitrate {
    match bitrate {
        Bitrate::Kbps128 => mp3lame_encoder::Bitrate::Kbps128,
        Bitrate::Kbps192 => mp3lame_encoder::Bitrate::Kbps192,
        Bitrate::Kbps256 => mp3lame_encoder::Bitrate::Kbps256,
        Bitrate::Kbps320 => mp3lame_encoder::Bitrate::Kbps320,
    }
}

/// Keep the LAME error as the failure's source
fn lame_error<E>(stage: &'static str, err: E) -> AudioError
where
    E: std::error::Error + Send + Sync + 'static,
{
    AudioError::EncodingFailure {
        stage,
        cause: err.to_string(),
        source: Some(Box::new(err)),
    }
}
