use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use audio_cutter_lib::audio::{
    decode_audio_file, EncodingParameters, FrameEncoder, FrameEncoderFactory, LameEncoderFactory,
    SampleBuffer,
};
use audio_cutter_lib::tags::read_tags;
use audio_cutter_lib::{
    AudioError, BitrateEstimator, EditSession, ErrorKind, ExportOutcome, ExportState,
    FsAudioStore, LoftyTagStore, Orchestrator, Result, TagSet, TagStore,
};

const RATE: u32 = 44100;

fn output_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("audio_cutter_it_{}", name))
}

/// 10 seconds of constant 0.5 amplitude, cut to 1s..9s with 0.5s fades
fn ten_second_session(tags: Option<TagSet>) -> EditSession {
    let audio = SampleBuffer::new(vec![vec![0.5; 10 * RATE as usize]], RATE).unwrap();
    let mut session = EditSession::new("/music/source.mp3", audio).with_tags(tags);
    session.intro_field = "0:01.000".to_string();
    session.outro_field = "0:09.000".to_string();
    session.fade_in_field = "0.5".to_string();
    session.fade_out_field = "0.5".to_string();
    session
}

fn orchestrator(tag_store: Arc<dyn TagStore>, encoder: Arc<dyn FrameEncoderFactory>) -> Orchestrator {
    Orchestrator::new(
        Arc::new(FsAudioStore),
        tag_store,
        encoder,
        BitrateEstimator::default(),
    )
}

#[tokio::test]
async fn test_wav_export_with_fades() {
    let path = output_path("fades.wav");
    let orchestrator = orchestrator(Arc::new(LoftyTagStore), Arc::new(LameEncoderFactory));

    let outcome = orchestrator.export(&ten_second_session(None), &path).await;
    assert!(matches!(outcome, ExportOutcome::Saved { .. }), "{:?}", outcome);
    assert_eq!(orchestrator.status().state, ExportState::Idle);

    let mut reader = hound::WavReader::open(&path).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, RATE);
    assert_eq!(spec.bits_per_sample, 16);

    let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();

    // 8.0 seconds exactly
    assert_eq!(samples.len(), 8 * RATE as usize);

    let level = (0.5 * 32767.0f64).round() as i16;

    // Fade-in: silent start, half level at 0.25s, full level from 0.5s
    assert_eq!(samples[0], 0);
    assert!((samples[RATE as usize / 4] - level / 2).abs() <= 2);
    assert!((samples[RATE as usize / 2] - level).abs() <= 1);
    assert!(samples[..RATE as usize / 2].windows(2).all(|w| w[0] <= w[1]));

    // Body untouched
    assert!(samples[RATE as usize..7 * RATE as usize]
        .iter()
        .all(|&s| s == level));

    // Fade-out: falls to silence at the end
    let fade_out_start = samples.len() - RATE as usize / 2;
    assert!((samples[fade_out_start] - level).abs() <= 1);
    assert!(samples[fade_out_start..].windows(2).all(|w| w[0] >= w[1]));
    assert!(samples[samples.len() - 1].abs() <= 2);

    std::fs::remove_file(&path).ok();
}

#[tokio::test]
async fn test_m4a_destination_falls_back_to_wav() {
    let path = output_path("fallback.m4a");
    let orchestrator = orchestrator(Arc::new(LoftyTagStore), Arc::new(LameEncoderFactory));

    let outcome = orchestrator.export(&ten_second_session(None), &path).await;
    assert!(outcome.is_saved());

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[0..4], b"RIFF");
    assert_eq!(&bytes[8..12], b"WAVE");

    std::fs::remove_file(&path).ok();
}

#[tokio::test]
async fn test_mp3_export_is_encoded_and_tagged() {
    let path = output_path("tagged.mp3");
    let orchestrator = orchestrator(Arc::new(LoftyTagStore), Arc::new(LameEncoderFactory));

    let stored = TagSet {
        title: Some("Old Title".to_string()),
        artist: Some("The Band".to_string()),
        ..Default::default()
    };
    let mut session = ten_second_session(Some(stored));
    session.tag_edits.title = Some("New Title".to_string());

    let outcome = orchestrator.export(&session, &path).await;
    assert!(matches!(outcome, ExportOutcome::Saved { .. }), "{:?}", outcome);
    assert_eq!(orchestrator.status().message, "File saved successfully!");

    let tags = read_tags(&path).unwrap();
    assert_eq!(tags.title.as_deref(), Some("New Title"));
    assert_eq!(tags.artist.as_deref(), Some("The Band"));

    // Encoder delay and padding add a few frames at most
    let decoded = decode_audio_file(&path).unwrap();
    assert_eq!(decoded.sample_rate(), RATE);
    assert!((decoded.duration_seconds() - 8.0).abs() < 0.2);

    std::fs::remove_file(&path).ok();
}

struct RejectingTags;

#[async_trait]
impl TagStore for RejectingTags {
    async fn read_tags(&self, _path: &Path) -> Option<TagSet> {
        None
    }

    async fn write_tags(&self, path: &Path, _tags: &TagSet) -> Result<()> {
        Err(AudioError::TagWriteFailure {
            path: path.to_string_lossy().to_string(),
            reason: "file is read-only".to_string(),
        })
    }
}

/// Emits two bytes per block
struct TinyEncoderFactory;

struct TinyEncoder;

impl FrameEncoderFactory for TinyEncoderFactory {
    fn create(&self, _params: &EncodingParameters) -> Result<Box<dyn FrameEncoder>> {
        Ok(Box::new(TinyEncoder))
    }
}

impl FrameEncoder for TinyEncoder {
    fn encode_block(&mut self, _left: &[i16], _right: Option<&[i16]>) -> Result<Vec<u8>> {
        Ok(vec![0xFF, 0xFB])
    }

    fn flush(&mut self) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_tag_failure_keeps_the_file() {
    let path = output_path("untagged.mp3");
    let orchestrator = orchestrator(Arc::new(RejectingTags), Arc::new(TinyEncoderFactory));

    let stored = TagSet {
        title: Some("Title".to_string()),
        ..Default::default()
    };
    let outcome = orchestrator.export(&ten_second_session(Some(stored)), &path).await;

    assert_eq!(outcome.state(), ExportState::PartialSuccess);
    assert_eq!(outcome.error().unwrap().kind(), ErrorKind::TagWriteFailure);

    // 352800 frames: 307 blocks of 1152
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes.len(), 307 * 2);

    std::fs::remove_file(&path).ok();
}

#[tokio::test]
async fn test_failed_export_leaves_existing_file_alone() {
    let path = output_path("existing.wav");
    std::fs::write(&path, b"previous export").unwrap();

    let orchestrator = orchestrator(Arc::new(LoftyTagStore), Arc::new(LameEncoderFactory));
    let mut session = ten_second_session(None);
    session.outro_field = "0:30.000".to_string();

    let outcome = orchestrator.export(&session, &path).await;
    assert_eq!(outcome.error().unwrap().kind(), ErrorKind::InvalidCutWindow);
    assert_eq!(std::fs::read(&path).unwrap(), b"previous export");

    std::fs::remove_file(&path).ok();
}
