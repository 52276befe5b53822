//! The state of one open file: decoded audio, stored tags and the values
//! the user has typed into the cut/fade/tag fields.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::audio::decoder::{decode_audio_bytes, ensure_supported_input};
use crate::audio::types::{has_extension, Bitrate, CutWindow, SampleBuffer};
use crate::audio::BitrateEstimator;
use crate::error::{AudioError, Result};
use crate::pipeline::{AudioFileStore, TagStore};
use crate::tags::{TagOverrides, TagSet};

/// Slack for float error when truncating to whole milliseconds (1.001 s
/// multiplies out to 1000.999...)
const MS_EPSILON: f64 = 1e-6;

/// Format seconds as `M:SS`, or `M:SS.mmm` with milliseconds
///
/// Sub-millisecond remainders are truncated, so formatting a duration never
/// produces a time past its end.
pub fn format_time(seconds: f64, include_milliseconds: bool) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return if include_milliseconds { "0:00.000" } else { "0:00" }.to_string();
    }

    let total_ms = (seconds * 1000.0 + MS_EPSILON).floor() as u64;
    let minutes = total_ms / 60_000;
    let secs = (total_ms / 1000) % 60;

    if include_milliseconds {
        format!("{}:{:02}.{:03}", minutes, secs, total_ms % 1000)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// Parse `M:SS` or `M:SS.mmm` into seconds
///
/// The part after the dot counts whole milliseconds, so `1:02.5` is 62.005 s.
/// Anything else, including bare seconds and values too large to add up,
/// yields `None`.
pub fn parse_time(text: &str) -> Option<f64> {
    let (minutes, rest) = text.trim().split_once(':')?;
    let minutes: u64 = minutes.parse().ok()?;

    let (secs, fraction) = match rest.split_once('.') {
        Some((secs, fraction)) => (secs, Some(fraction)),
        None => (rest, None),
    };
    let secs: u64 = secs.parse().ok()?;

    let millis: u64 = match fraction {
        Some(digits) if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) => {
            digits.parse().ok()?
        }
        Some(_) => return None,
        None => 0,
    };

    let whole_seconds = minutes.checked_mul(60)?.checked_add(secs)?;
    Some(whole_seconds as f64 + millis as f64 / 1000.0)
}

/// Parse a fade length field; blank, unparsable and negative values mean no fade
pub fn parse_fade(text: &str) -> f64 {
    match text.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => value,
        _ => 0.0,
    }
}

/// One loaded file and its edit state
///
/// The decoded audio is shared read-only with a running export and is
/// never modified.
#[derive(Debug, Clone)]
pub struct EditSession {
    source_path: PathBuf,
    audio: Arc<SampleBuffer>,
    source_size_bytes: Option<u64>,
    stored_tags: Option<TagSet>,

    /// Intro cut point as shown in the UI (`M:SS.mmm`)
    pub intro_field: String,
    /// Outro cut point as shown in the UI (`M:SS.mmm`)
    pub outro_field: String,
    /// Fade-in length in seconds
    pub fade_in_field: String,
    /// Fade-out length in seconds
    pub fade_out_field: String,
    /// Tag fields the user edited
    pub tag_edits: TagOverrides,
}

impl EditSession {
    /// Start a session over already-decoded audio, cutting nothing
    pub fn new<P: Into<PathBuf>>(source_path: P, audio: SampleBuffer) -> Self {
        let outro_field = format_time(audio.duration_seconds(), true);

        Self {
            source_path: source_path.into(),
            audio: Arc::new(audio),
            source_size_bytes: None,
            stored_tags: None,
            intro_field: format_time(0.0, true),
            outro_field,
            fade_in_field: String::new(),
            fade_out_field: String::new(),
            tag_edits: TagOverrides::default(),
        }
    }

    pub fn with_source_size(mut self, bytes: u64) -> Self {
        self.source_size_bytes = Some(bytes);
        self
    }

    pub fn with_tags(mut self, tags: Option<TagSet>) -> Self {
        self.stored_tags = tags;
        self
    }

    /// Read, decode and inspect a source file
    ///
    /// Decoding runs on the blocking pool. A missing size or missing tags are
    /// not errors: the bitrate falls back to its default and tagging is skipped.
    pub async fn open(
        path: &Path,
        files: &dyn AudioFileStore,
        tag_store: &dyn TagStore,
    ) -> Result<Self> {
        ensure_supported_input(path)?;

        let bytes = files.read_audio_file(path).await.map_err(|e| {
            AudioError::DecodeFailure(format!("Could not read {}: {}", path.display(), e))
        })?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_string);
        let audio = tokio::task::spawn_blocking(move || {
            decode_audio_bytes(bytes, extension.as_deref())
        })
        .await
        .map_err(|e| AudioError::TaskJoin(e.to_string()))??;

        let size = match files.stat_file(path).await {
            Ok(stats) => Some(stats.size),
            Err(e) => {
                warn!("Error getting file stats: {}", e);
                None
            }
        };

        let tags = tag_store.read_tags(path).await;

        info!(
            path = %path.display(),
            duration_seconds = audio.duration_seconds(),
            channels = audio.channel_count(),
            sample_rate = audio.sample_rate(),
            has_tags = tags.is_some(),
            "File loaded successfully"
        );

        let mut session = Self::new(path, audio).with_tags(tags);
        session.source_size_bytes = size;
        Ok(session)
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn audio(&self) -> &Arc<SampleBuffer> {
        &self.audio
    }

    pub fn stored_tags(&self) -> Option<&TagSet> {
        self.stored_tags.as_ref()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.audio.duration_seconds()
    }

    /// Mark the intro at a playback position
    pub fn set_intro_at(&mut self, seconds: f64) {
        self.intro_field = format_time(seconds, true);
    }

    /// Mark the outro at a playback position
    pub fn set_outro_at(&mut self, seconds: f64) {
        self.outro_field = format_time(seconds, true);
    }

    /// Read the cut window from the UI fields
    ///
    /// An unparsable intro means 0; an unparsable or zero outro means the end
    /// of the file; blank or unparsable fades mean none. An outro less than a
    /// millisecond past the end (display precision) is the end.
    pub fn cut_window(&self) -> Result<CutWindow> {
        let duration = self.duration_seconds();
        let intro = parse_time(&self.intro_field).unwrap_or(0.0);
        let outro = match parse_time(&self.outro_field).filter(|t| *t > 0.0) {
            Some(t) if t > duration && t - duration < 0.001 => duration,
            Some(t) => t,
            None => duration,
        };

        CutWindow::new(
            intro,
            outro,
            parse_fade(&self.fade_in_field),
            parse_fade(&self.fade_out_field),
        )
    }

    /// Tags to write to an MP3 export: stored tags with the user's edits
    /// applied, or `None` when the source had no tags
    pub fn merged_tags(&self) -> Option<TagSet> {
        self.stored_tags
            .as_ref()
            .map(|stored| crate::tags::merge(stored, &self.tag_edits))
    }

    /// Target MP3 bitrate, estimated from the source file
    pub fn export_bitrate(&self, estimator: &BitrateEstimator) -> Bitrate {
        estimator.estimate(
            self.source_size_bytes,
            self.duration_seconds(),
            has_extension(&self.source_path, "mp3"),
        )
    }

    /// Suggested name for the save dialog
    pub fn default_save_name(&self) -> String {
        match self.source_path.file_stem().and_then(|s| s.to_str()) {
            Some(stem) if !stem.is_empty() => format!("{} - edited.mp3", stem),
            _ => "edited.mp3".to_string(),
        }
    }
}
