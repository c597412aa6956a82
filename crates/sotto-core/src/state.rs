//! The engine's state model: permission, model residency, and activity.
//!
//! These are plain values. Locking and transition policy belong to the
//! engine crate; everything here is cheap to copy and inspect.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Microphone permission as last reported by the platform collaborator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    /// No permission result has arrived yet.
    #[default]
    Unknown,
    /// The user denied microphone access.
    Denied,
    /// The user granted microphone access.
    Granted,
}

impl fmt::Display for PermissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionState::Unknown => write!(f, "Unknown"),
            PermissionState::Denied => write!(f, "Denied"),
            PermissionState::Granted => write!(f, "Granted"),
        }
    }
}

/// Opaque identifier for a loaded model.
///
/// Minted by the speech backend on load and quoted back on every inference
/// and unload call. Never exposed on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ModelHandle(Uuid);

impl ModelHandle {
    /// Mint a fresh, unique handle.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ModelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Residency of the transcription model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ModelState {
    /// No model resident.
    #[default]
    NotLoaded,
    /// A load is in flight; competing model commands are rejected.
    Loading,
    /// A model is resident, addressed by its handle.
    Loaded(ModelHandle),
}

impl ModelState {
    pub fn is_loaded(&self) -> bool {
        matches!(self, ModelState::Loaded(_))
    }

    /// Handle of the resident model, if any.
    pub fn handle(&self) -> Option<ModelHandle> {
        match self {
            ModelState::Loaded(handle) => Some(*handle),
            _ => None,
        }
    }
}

/// What the engine is doing right now.
///
/// Recording and transcribing are structurally exclusive: one enum value
/// cannot hold both.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Activity {
    #[default]
    Idle,
    Recording,
    Transcribing,
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activity::Idle => write!(f, "Idle"),
            Activity::Recording => write!(f, "Recording"),
            Activity::Transcribing => write!(f, "Transcribing"),
        }
    }
}

/// The single mutable state record behind the command surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineState {
    pub permission: PermissionState,
    pub model: ModelState,
    pub activity: Activity,
}

impl EngineState {
    /// Pristine initial state: permission unknown, no model, idle.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when a model is resident and the engine is idle.
    pub fn can_transcribe(&self) -> bool {
        self.model.is_loaded() && self.activity == Activity::Idle
    }

    pub fn is_recording(&self) -> bool {
        self.activity == Activity::Recording
    }

    pub fn is_model_loaded(&self) -> bool {
        self.model.is_loaded()
    }
}
