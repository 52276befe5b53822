pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod lookup;
pub mod pipeline;
pub mod session;
pub mod tags;

// Re-export for convenience
pub use audio::*;
pub use config::CutterConfig;
pub use error::{AudioError, ErrorKind, Result};
pub use lookup::{LookupResult, MusicBrainzClient};
pub use pipeline::{
    AudioFileStore, ExportJob, ExportOutcome, ExportState, ExportStatus, FileStats, FsAudioStore,
    LoftyTagStore, Orchestrator, TagStore,
};
pub use session::{format_time, parse_time, EditSession};
pub use tags::{merge, TagOverrides, TagSet};
