//! Audio capture abstraction: the external recorder the engine drives.
//!
//! [`AudioRecorder`] models the capture collaborator: starting and stopping
//! produce a recorded artifact on disk, and a playback flag is forwarded to
//! the output side. [`MockRecorder`] serves tests and capture-less runs;
//! the real cpal-backed recorder lives behind the `capture` feature.

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use sotto_core::error::BridgeError;

#[cfg(feature = "capture")]
pub mod cpal_recorder;

// ==================== Recorder trait ====================

/// External audio capture and playback collaborator.
pub trait AudioRecorder: Send + Sync {
    /// Start capturing from the input device.
    ///
    /// Failures discovered after a successful start are reported through a
    /// backend-specific failure channel, not through this call.
    fn start(&self) -> impl Future<Output = Result<(), BridgeError>> + Send;

    /// Stop capturing. Returns the recorded artifact, or `None` when
    /// nothing was captured.
    fn stop(&self) -> impl Future<Output = Result<Option<PathBuf>, BridgeError>> + Send;

    /// Forward the playback flag to the output side. Does not affect
    /// capture.
    fn set_playback(&self, enabled: bool);
}

/// Shared recorders can be handed to the engine directly.
impl<T: AudioRecorder> AudioRecorder for Arc<T> {
    fn start(&self) -> impl Future<Output = Result<(), BridgeError>> + Send {
        (**self).start()
    }

    fn stop(&self) -> impl Future<Output = Result<Option<PathBuf>, BridgeError>> + Send {
        (**self).stop()
    }

    fn set_playback(&self, enabled: bool) {
        (**self).set_playback(enabled)
    }
}

// ==================== Mock implementation ====================

/// Mock recorder for tests and capture-less runs.
///
/// Tracks the active and playback flags, hands back a configurable artifact
/// on stop, and can inject start failures.
#[derive(Debug, Default)]
pub struct MockRecorder {
    active: AtomicBool,
    playback: AtomicBool,
    fail_start: AtomicBool,
    start_calls: AtomicUsize,
    next_artifact: Mutex<Option<PathBuf>>,
}

impl MockRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Artifact returned by the next `stop`.
    pub fn set_next_artifact(&self, path: impl Into<PathBuf>) {
        *self
            .next_artifact
            .lock()
            .expect("artifact mutex poisoned") = Some(path.into());
    }

    /// Make subsequent `start` calls fail.
    pub fn set_start_failure(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn playback_enabled(&self) -> bool {
        self.playback.load(Ordering::SeqCst)
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }
}

impl AudioRecorder for MockRecorder {
    async fn start(&self) -> Result<(), BridgeError> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(BridgeError::RecordingFailed {
                reason: "mock start failure".to_string(),
            });
        }
        if self.active.swap(true, Ordering::SeqCst) {
            return Err(BridgeError::RecordingFailed {
                reason: "capture already active".to_string(),
            });
        }
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("Mock capture started");
        Ok(())
    }

    async fn stop(&self) -> Result<Option<PathBuf>, BridgeError> {
        if !self.active.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        tracing::debug!("Mock capture stopped");
        Ok(self
            .next_artifact
            .lock()
            .expect("artifact mutex poisoned")
            .take())
    }

    fn set_playback(&self, enabled: bool) {
        self.playback.store(enabled, Ordering::SeqCst);
    }
}
