// src/audio/mod.rs

pub mod bitrate;
pub mod decoder;
pub mod encoder;
pub mod mp3;
pub mod render;
pub mod types;
pub mod waveform;

// Re-export commonly used items
pub use bitrate::{quantize_bitrate, BitrateEstimator};
pub use decoder::{decode_audio_bytes, decode_audio_file, ensure_supported_input, get_audio_info};
pub use encoder::{encode_wav, sample_to_i16};
pub use mp3::{encode_mp3, FrameEncoder, FrameEncoderFactory, LameEncoderFactory, MP3_BLOCK_FRAMES};
pub use render::render_cut;
pub use types::{
    AudioInfo, Bitrate, Container, CutWindow, EncodingParameters, SampleBuffer, WaveformPeaks,
};
pub use waveform::extract_waveform_peaks;
