//! Export pipeline.
//!
//! An export walks `Idle → Preparing → Rendering → Encoding → Writing →
//! (Tagging) → Done/PartialSuccess/Failed → Idle`. Rendering and encoding run
//! on the blocking pool; file and tag I/O go through the [`AudioFileStore`]
//! and [`TagStore`] collaborators. Progress is published on a
//! [`tokio::sync::watch`] channel as an [`ExportStatus`].
//!
//! Only one export runs at a time. A request made while another is in flight
//! is rejected with [`AudioError::ExportInProgress`] and leaves the running
//! export untouched.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::audio::encoder::encode_wav;
use crate::audio::mp3::{encode_mp3, FrameEncoderFactory};
use crate::audio::render::render_cut;
use crate::audio::types::{Container, CutWindow, EncodingParameters, SampleBuffer};
use crate::audio::BitrateEstimator;
use crate::error::{AudioError, Result};
use crate::session::EditSession;
use crate::tags::{self, TagSet};

/// Size information used for bitrate estimation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStats {
    pub size: u64,
}

/// Byte-level file access
#[async_trait]
pub trait AudioFileStore: Send + Sync {
    async fn read_audio_file(&self, path: &Path) -> Result<Vec<u8>>;

    /// Write a complete file; a failure must not leave a corrupt file at `path`
    async fn write_audio_file(&self, path: &Path, bytes: &[u8]) -> Result<()>;

    async fn stat_file(&self, path: &Path) -> Result<FileStats>;
}

/// Metadata access
#[async_trait]
pub trait TagStore: Send + Sync {
    /// `None` when the file has no readable tags
    async fn read_tags(&self, path: &Path) -> Option<TagSet>;

    async fn write_tags(&self, path: &Path, tags: &TagSet) -> Result<()>;
}

/// [`AudioFileStore`] over the local filesystem
///
/// Writes go to a sibling `.part` file which is renamed over the destination
/// once complete, so an existing file is never left half-written.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsAudioStore;

impl FsAudioStore {
    fn partial_path(path: &Path) -> PathBuf {
        let mut name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".part");
        path.with_file_name(name)
    }
}

#[async_trait]
impl AudioFileStore for FsAudioStore {
    async fn read_audio_file(&self, path: &Path) -> Result<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .map_err(|e| AudioError::FileOpen {
                path: path.to_string_lossy().to_string(),
                source: e,
            })
    }

    async fn write_audio_file(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let partial = Self::partial_path(path);
        let write_failure = |e: std::io::Error| AudioError::WriteFailure {
            path: path.to_string_lossy().to_string(),
            reason: e.to_string(),
        };

        if let Err(e) = tokio::fs::write(&partial, bytes).await {
            tokio::fs::remove_file(&partial).await.ok();
            return Err(write_failure(e));
        }

        if let Err(e) = tokio::fs::rename(&partial, path).await {
            tokio::fs::remove_file(&partial).await.ok();
            return Err(write_failure(e));
        }

        debug!(path = %path.display(), bytes = bytes.len(), "wrote file");
        Ok(())
    }

    async fn stat_file(&self, path: &Path) -> Result<FileStats> {
        let metadata = tokio::fs::metadata(path).await?;
        Ok(FileStats {
            size: metadata.len(),
        })
    }
}

/// [`TagStore`] backed by lofty, run on the blocking pool
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyTagStore;

#[async_trait]
impl TagStore for LoftyTagStore {
    async fn read_tags(&self, path: &Path) -> Option<TagSet> {
        let path = path.to_path_buf();
        match tokio::task::spawn_blocking(move || tags::read_tags(&path)).await {
            Ok(tag_set) => tag_set,
            Err(e) => {
                warn!("Task join error while reading tags: {}", e);
                None
            }
        }
    }

    async fn write_tags(&self, path: &Path, tags: &TagSet) -> Result<()> {
        let owned_path = path.to_path_buf();
        let tag_set = tags.clone();

        tokio::task::spawn_blocking(move || tags::write_tags(&owned_path, &tag_set))
            .await
            .map_err(|e| AudioError::TagWriteFailure {
                path: path.to_string_lossy().to_string(),
                reason: format!("Task join error: {}", e),
            })?
    }
}

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExportState {
    Idle,
    Preparing,
    Rendering,
    Encoding,
    Writing,
    Tagging,
    Done,
    PartialSuccess,
    Failed,
}

impl ExportState {
    /// Status line shown while a stage is running
    fn progress_message(self) -> Option<&'static str> {
        match self {
            ExportState::Preparing => Some("Preparing to save..."),
            ExportState::Rendering => Some("Processing audio..."),
            ExportState::Encoding => Some("Encoding audio..."),
            ExportState::Writing => Some("Writing file..."),
            ExportState::Tagging => Some("Writing tags..."),
            _ => None,
        }
    }

    /// Whether the save action should be disabled
    pub fn is_busy(self) -> bool {
        !matches!(
            self,
            ExportState::Idle | ExportState::Done | ExportState::PartialSuccess | ExportState::Failed
        )
    }
}

/// The externally visible pipeline status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportStatus {
    pub state: ExportState,
    pub message: String,
}

impl Default for ExportStatus {
    fn default() -> Self {
        Self {
            state: ExportState::Idle,
            message: String::new(),
        }
    }
}

/// How an export ended
#[derive(Debug)]
pub enum ExportOutcome {
    /// File written (and tagged, when tags applied)
    Saved { bytes: usize },
    /// File written but the tag write failed
    SavedWithoutTags { bytes: usize, error: AudioError },
    Failed(AudioError),
}

impl ExportOutcome {
    pub fn is_saved(&self) -> bool {
        !matches!(self, ExportOutcome::Failed(_))
    }

    pub fn error(&self) -> Option<&AudioError> {
        match self {
            ExportOutcome::Saved { .. } => None,
            ExportOutcome::SavedWithoutTags { error, .. } | ExportOutcome::Failed(error) => {
                Some(error)
            }
        }
    }

    pub fn state(&self) -> ExportState {
        match self {
            ExportOutcome::Saved { .. } => ExportState::Done,
            ExportOutcome::SavedWithoutTags { .. } => ExportState::PartialSuccess,
            ExportOutcome::Failed(_) => ExportState::Failed,
        }
    }

    pub fn status_message(&self) -> String {
        match self {
            ExportOutcome::Saved { .. } => "File saved successfully!".to_string(),
            ExportOutcome::SavedWithoutTags { error, .. } => {
                format!("File saved, but tags could not be written: {}", error)
            }
            ExportOutcome::Failed(AudioError::WriteFailure { reason, .. }) => {
                format!("Error saving file: {}", reason)
            }
            ExportOutcome::Failed(AudioError::ExportInProgress) => {
                AudioError::ExportInProgress.to_string()
            }
            ExportOutcome::Failed(e) => format!("Error processing audio: {}", e),
        }
    }
}

/// One save action, bound to a snapshot of the session
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub destination: PathBuf,
    pub window: CutWindow,
    pub params: EncodingParameters,
    pub container: Container,
    /// Merged tags; only set for MP3 output from a tagged source
    pub tags: Option<TagSet>,
    source: Arc<SampleBuffer>,
}

impl ExportJob {
    /// Read cut points and tags from the session and pick the container
    /// from the destination extension
    pub fn prepare(
        session: &EditSession,
        destination: &Path,
        estimator: &BitrateEstimator,
    ) -> Result<Self> {
        let window = session.cut_window()?;
        let container = Container::from_path(destination);
        let source = Arc::clone(session.audio());
        let params = EncodingParameters::for_buffer(&source, session.export_bitrate(estimator));

        let tags = match container {
            // An empty tag set would only strip the file's tag container
            Container::Mp3 => session.merged_tags().filter(|t| !t.is_empty()),
            Container::Wav => None,
        };

        Ok(Self {
            destination: destination.to_path_buf(),
            window,
            params,
            container,
            tags,
            source,
        })
    }

    /// Render the cut window and encode it into the target container
    ///
    /// Blocking. `on_stage` is told when encoding starts.
    pub fn render_and_encode(
        &self,
        factory: &dyn FrameEncoderFactory,
        on_stage: &dyn Fn(ExportState),
    ) -> Result<Vec<u8>> {
        on_stage(ExportState::Rendering);
        let rendered = render_cut(&self.source, &self.window)?;

        on_stage(ExportState::Encoding);
        match self.container {
            Container::Mp3 => encode_mp3(&rendered, &self.params, factory),
            Container::Wav => encode_wav(&rendered),
        }
    }
}

/// Clears the busy flag when the export that set it ends
struct FlightGuard<'a> {
    busy: &'a AtomicBool,
}

impl<'a> FlightGuard<'a> {
    fn acquire(busy: &'a AtomicBool) -> Option<Self> {
        busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { busy })
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Runs exports one at a time and publishes their progress
pub struct Orchestrator {
    files: Arc<dyn AudioFileStore>,
    tag_store: Arc<dyn TagStore>,
    encoder: Arc<dyn FrameEncoderFactory>,
    estimator: BitrateEstimator,
    status: Arc<watch::Sender<ExportStatus>>,
    busy: AtomicBool,
}

impl Orchestrator {
    pub fn new(
        files: Arc<dyn AudioFileStore>,
        tag_store: Arc<dyn TagStore>,
        encoder: Arc<dyn FrameEncoderFactory>,
        estimator: BitrateEstimator,
    ) -> Self {
        let (status, _) = watch::channel(ExportStatus::default());

        Self {
            files,
            tag_store,
            encoder,
            estimator,
            status: Arc::new(status),
            busy: AtomicBool::new(false),
        }
    }

    /// Receive every status change
    pub fn subscribe(&self) -> watch::Receiver<ExportStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> ExportStatus {
        self.status.borrow().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Export the session's cut window to `destination`
    ///
    /// `.mp3` destinations are MP3-encoded and tagged when the source had
    /// tags; any other extension is written as WAV. Whatever happens, the
    /// pipeline is back in `Idle` with a final status message when this
    /// returns.
    #[instrument(skip(self, session, destination), fields(destination = %destination.display()))]
    pub async fn export(&self, session: &EditSession, destination: &Path) -> ExportOutcome {
        let Some(_guard) = FlightGuard::acquire(&self.busy) else {
            warn!("Export requested while another export is running");
            return ExportOutcome::Failed(AudioError::ExportInProgress);
        };

        let outcome = self.run(session, destination).await;

        match &outcome {
            ExportOutcome::Saved { bytes } => info!(bytes, "Export finished"),
            ExportOutcome::SavedWithoutTags { bytes, error } => {
                warn!(bytes, "Export finished without tags: {}", error)
            }
            ExportOutcome::Failed(e) => error!("Export failed: {}", e),
        }

        let message = outcome.status_message();
        self.publish(outcome.state(), message.clone());
        self.publish(ExportState::Idle, message);

        outcome
    }

    async fn run(&self, session: &EditSession, destination: &Path) -> ExportOutcome {
        self.enter(ExportState::Preparing);
        let job = match ExportJob::prepare(session, destination, &self.estimator) {
            Ok(job) => Arc::new(job),
            Err(e) => return ExportOutcome::Failed(e),
        };
        debug!(
            container = ?job.container,
            bitrate_kbps = job.params.bitrate.kbps(),
            intro = job.window.intro_seconds,
            outro = job.window.outro_seconds,
            "Prepared export job"
        );

        let encoded = {
            let job = Arc::clone(&job);
            let encoder = Arc::clone(&self.encoder);
            let status = Arc::clone(&self.status);

            tokio::task::spawn_blocking(move || {
                job.render_and_encode(encoder.as_ref(), &|state| publish_stage(&status, state))
            })
            .await
        };

        let bytes = match encoded {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => return ExportOutcome::Failed(e),
            Err(e) => return ExportOutcome::Failed(AudioError::TaskJoin(e.to_string())),
        };

        self.enter(ExportState::Writing);
        if let Err(e) = self.files.write_audio_file(&job.destination, &bytes).await {
            let e = match e {
                e @ AudioError::WriteFailure { .. } => e,
                other => AudioError::WriteFailure {
                    path: job.destination.to_string_lossy().to_string(),
                    reason: other.to_string(),
                },
            };
            return ExportOutcome::Failed(e);
        }

        let Some(tags) = &job.tags else {
            return ExportOutcome::Saved { bytes: bytes.len() };
        };

        self.enter(ExportState::Tagging);
        match self.tag_store.write_tags(&job.destination, tags).await {
            Ok(()) => ExportOutcome::Saved { bytes: bytes.len() },
            Err(e) => {
                let error = match e {
                    e @ AudioError::TagWriteFailure { .. } => e,
                    other => AudioError::TagWriteFailure {
                        path: job.destination.to_string_lossy().to_string(),
                        reason: other.to_string(),
                    },
                };
                ExportOutcome::SavedWithoutTags {
                    bytes: bytes.len(),
                    error,
                }
            }
        }
    }

    fn enter(&self, state: ExportState) {
        publish_stage(&self.status, state);
    }

    fn publish(&self, state: ExportState, message: String) {
        self.status.send_replace(ExportStatus { state, message });
    }
}

fn publish_stage(status: &watch::Sender<ExportStatus>, state: ExportState) {
    let message = state.progress_message().unwrap_or_default().to_string();
    debug!(?state, "{}", message);
    status.send_replace(ExportStatus { state, message });
}
