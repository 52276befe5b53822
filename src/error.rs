use thiserror::Error;

/// All possible errors that can occur while loading, rendering and exporting audio
#[derive(Debug, Error)]
pub enum AudioError {
    /// Failed to open or read the audio file from disk
    #[error("Failed to open audio file '{path}': {source}")]
    FileOpen {
        path: String,
        source: std::io::Error,
    },

    /// The input is not one of the accepted audio types
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// The source could not be decoded into PCM samples
    #[error("Audio decoding failed: {0}")]
    DecodeFailure(String),

    /// Bad trim bounds or fade durations
    #[error("Invalid cut window: {0}")]
    InvalidCutWindow(String),

    /// The MP3 frame encoder rejected its parameters or a block of samples
    #[error("Encoding failed during {stage}: {cause}")]
    EncodingFailure {
        stage: &'static str,
        cause: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The encoded bytes could not be written to the destination
    #[error("Failed to write '{path}': {reason}")]
    WriteFailure { path: String, reason: String },

    /// Tags could not be applied to an already written file
    #[error("Failed to write tags to '{path}': {reason}")]
    TagWriteFailure { path: String, reason: String },

    /// A caller-supplied parameter is out of range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Remote metadata search failed
    #[error("Metadata lookup failed: {0}")]
    Lookup(String),

    /// The configuration file could not be read or parsed
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A second export was requested while one is still running
    #[error("An export is already in progress")]
    ExportInProgress,

    /// The blocking worker running render/encode did not complete
    #[error("Task join error: {0}")]
    TaskJoin(String),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse error category, used to assert on the cause of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidCutWindow,
    DecodeFailure,
    EncodingFailure,
    WriteFailure,
    TagWriteFailure,
    ExportInProgress,
    Other,
}

impl AudioError {
    /// An encoding failure with no underlying encoder error to attach
    pub fn encoding(stage: &'static str, cause: impl Into<String>) -> Self {
        AudioError::EncodingFailure {
            stage,
            cause: cause.into(),
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AudioError::InvalidCutWindow(_) => ErrorKind::InvalidCutWindow,
            AudioError::DecodeFailure(_)
            | AudioError::UnsupportedFormat(_)
            | AudioError::FileOpen { .. } => ErrorKind::DecodeFailure,
            AudioError::EncodingFailure { .. } => ErrorKind::EncodingFailure,
            AudioError::WriteFailure { .. } => ErrorKind::WriteFailure,
            AudioError::TagWriteFailure { .. } => ErrorKind::TagWriteFailure,
            AudioError::ExportInProgress => ErrorKind::ExportInProgress,
            AudioError::InvalidParameter(_)
            | AudioError::Lookup(_)
            | AudioError::Config(_)
            | AudioError::TaskJoin(_)
            | AudioError::Io(_) => ErrorKind::Other,
        }
    }
}

/// Convenient Result type that uses our AudioError
pub type Result<T> = std::result::Result<T, AudioError>;
