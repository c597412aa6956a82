//! Error types for the Sotto bridge.
//!
//! The command-facing variants form a small, stable vocabulary: clients
//! match on [`BridgeError::code`] rather than parsing messages. For the
//! kinds that ride inside events (`recordingFailed`, `failedToTranscribe`)
//! the `Display` form is part of the wire contract and must not change.

use thiserror::Error;

/// Top-level error type for the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A command argument is missing or has the wrong type. Rejected by the
    /// dispatcher before any engine state is touched.
    #[error("Invalid argument: {field}")]
    InvalidArgument { field: String },

    /// Unknown command name, kept distinct so clients can detect
    /// protocol-version skew.
    #[error("Method not implemented: {method}")]
    NotImplemented { method: String },

    /// A conflicting state-mutating operation is already running.
    #[error("Operation already in progress: {operation}")]
    AlreadyInProgress { operation: &'static str },

    /// Microphone permission is denied or has not been granted yet.
    #[error("Microphone access denied")]
    MicPermissionDenied,

    /// The audio artifact to transcribe does not exist.
    #[error("Missing Recorded File")]
    MissingRecordedFile,

    /// An operation that needs a loaded model was issued without one.
    #[error("Model Not Loaded")]
    ModelNotLoaded,

    /// The speech backend could not load a model.
    #[error("Model load failed: {0}")]
    ModelLoad(String),

    /// Audio capture failed. The device-level reason stays out of the
    /// `Display` form, which the event protocol pins verbatim; use
    /// [`BridgeError::detail`] when logging.
    #[error("Recording Failed")]
    RecordingFailed { reason: String },

    /// Transcription failed after the operation was accepted.
    #[error("Transcription failed: {0}")]
    Transcription(String),

    /// Configuration file could not be parsed or written.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Stable machine-readable code used on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::InvalidArgument { .. } => "invalid_argument",
            BridgeError::NotImplemented { .. } => "not_implemented",
            BridgeError::AlreadyInProgress { .. } => "already_in_progress",
            BridgeError::MicPermissionDenied => "mic_permission_denied",
            BridgeError::MissingRecordedFile => "missing_recorded_file",
            BridgeError::ModelNotLoaded => "model_not_loaded",
            BridgeError::ModelLoad(_) => "model_load_error",
            BridgeError::RecordingFailed { .. } => "recording_failed",
            BridgeError::Transcription(_) => "transcription_failed",
            BridgeError::Config(_) => "config_error",
            BridgeError::Io(_) => "io_error",
        }
    }

    /// Log-friendly form that includes payloads the `Display` form hides.
    pub fn detail(&self) -> String {
        match self {
            BridgeError::RecordingFailed { reason } => format!("{self}: {reason}"),
            _ => self.to_string(),
        }
    }
}

impl From<toml::de::Error> for BridgeError {
    fn from(err: toml::de::Error) -> Self {
        BridgeError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for BridgeError {
    fn from(err: toml::ser::Error) -> Self {
        BridgeError::Config(err.to_string())
    }
}

/// Result type alias using BridgeError.
pub type Result<T> = std::result::Result<T, BridgeError>;
