//! Speech backend abstraction: model loading and inference.
//!
//! The engine drives a [`SpeechModel`] without knowing what sits behind it.
//! Handles are minted by `load` and quoted back on every `transcribe` and
//! `unload` call, so a backend can hold several models resident at once.
//!
//! [`MockSpeechModel`] serves tests and backend-less runs; the real
//! whisper.cpp backend lives behind the `whisper` feature.

use std::collections::HashSet;
use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use sotto_core::error::BridgeError;
use sotto_core::state::ModelHandle;

#[cfg(feature = "whisper")]
pub mod whisper_model;

// ==================== Speech model trait ====================

/// A speech-to-text backend.
pub trait SpeechModel: Send + Sync {
    /// Load a model from `path`, returning the handle that addresses it.
    fn load(&self, path: &Path)
        -> impl Future<Output = Result<ModelHandle, BridgeError>> + Send;

    /// Run inference over the audio artifact at `audio` with the model
    /// addressed by `handle`.
    fn transcribe(
        &self,
        audio: &Path,
        handle: ModelHandle,
    ) -> impl Future<Output = Result<String, BridgeError>> + Send;

    /// Release the model addressed by `handle`. Unknown handles are ignored.
    fn unload(&self, handle: ModelHandle) -> impl Future<Output = ()> + Send;
}

/// Shared backends can be handed to the engine directly.
impl<T: SpeechModel> SpeechModel for Arc<T> {
    fn load(
        &self,
        path: &Path,
    ) -> impl Future<Output = Result<ModelHandle, BridgeError>> + Send {
        (**self).load(path)
    }

    fn transcribe(
        &self,
        audio: &Path,
        handle: ModelHandle,
    ) -> impl Future<Output = Result<String, BridgeError>> + Send {
        (**self).transcribe(audio, handle)
    }

    fn unload(&self, handle: ModelHandle) -> impl Future<Output = ()> + Send {
        (**self).unload(handle)
    }
}

// ==================== Mock implementation ====================

/// Mock speech backend for tests and backend-less runs.
///
/// Mints real handles and tracks which are resident, so unload behavior is
/// observable. Failure injection and the load/transcription gates let tests
/// drive the engine's error and overlap paths deterministically.
#[derive(Debug)]
pub struct MockSpeechModel {
    loaded: Mutex<HashSet<ModelHandle>>,
    load_calls: AtomicUsize,
    transcribe_calls: AtomicUsize,
    fail_load: AtomicBool,
    fail_transcription: AtomicBool,
    transcript: Mutex<String>,
    load_gate: Mutex<Option<Arc<Notify>>>,
    transcribe_gate: Mutex<Option<Arc<Notify>>>,
}

impl MockSpeechModel {
    pub fn new() -> Self {
        Self {
            loaded: Mutex::new(HashSet::new()),
            load_calls: AtomicUsize::new(0),
            transcribe_calls: AtomicUsize::new(0),
            fail_load: AtomicBool::new(false),
            fail_transcription: AtomicBool::new(false),
            transcript: Mutex::new("[mock transcription]".to_string()),
            load_gate: Mutex::new(None),
            transcribe_gate: Mutex::new(None),
        }
    }

    /// Text returned by subsequent `transcribe` calls.
    pub fn set_transcript(&self, text: impl Into<String>) {
        *self.transcript.lock().expect("transcript mutex poisoned") = text.into();
    }

    /// Make subsequent `load` calls fail.
    pub fn set_load_failure(&self, fail: bool) {
        self.fail_load.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `transcribe` calls fail.
    pub fn set_transcription_failure(&self, fail: bool) {
        self.fail_transcription.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `load` calls wait until the returned gate is
    /// notified. The call counter is bumped before the wait, so callers can
    /// poll it to learn the load is in flight.
    pub fn block_loads(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.load_gate.lock().expect("gate mutex poisoned") = Some(Arc::clone(&gate));
        gate
    }

    /// Same as [`MockSpeechModel::block_loads`] for `transcribe` calls.
    pub fn block_transcriptions(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.transcribe_gate.lock().expect("gate mutex poisoned") = Some(Arc::clone(&gate));
        gate
    }

    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    pub fn transcribe_calls(&self) -> usize {
        self.transcribe_calls.load(Ordering::SeqCst)
    }

    /// Number of models currently resident.
    pub fn loaded_count(&self) -> usize {
        self.loaded.lock().expect("loaded set mutex poisoned").len()
    }

    pub fn is_loaded(&self, handle: ModelHandle) -> bool {
        self.loaded
            .lock()
            .expect("loaded set mutex poisoned")
            .contains(&handle)
    }

    fn take_gate(gate: &Mutex<Option<Arc<Notify>>>) -> Option<Arc<Notify>> {
        gate.lock().expect("gate mutex poisoned").clone()
    }
}

impl Default for MockSpeechModel {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechModel for MockSpeechModel {
    async fn load(&self, path: &Path) -> Result<ModelHandle, BridgeError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = Self::take_gate(&self.load_gate) {
            gate.notified().await;
        }
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(BridgeError::ModelLoad(format!(
                "mock load failure for {}",
                path.display()
            )));
        }
        let handle = ModelHandle::new();
        self.loaded
            .lock()
            .expect("loaded set mutex poisoned")
            .insert(handle);
        tracing::debug!(%handle, path = %path.display(), "Mock model loaded");
        Ok(handle)
    }

    async fn transcribe(
        &self,
        audio: &Path,
        handle: ModelHandle,
    ) -> Result<String, BridgeError> {
        self.transcribe_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = Self::take_gate(&self.transcribe_gate) {
            gate.notified().await;
        }
        if self.fail_transcription.load(Ordering::SeqCst) {
            return Err(BridgeError::Transcription(format!(
                "mock transcription failure for {}",
                audio.display()
            )));
        }
        if !self.is_loaded(handle) {
            return Err(BridgeError::ModelNotLoaded);
        }
        Ok(self
            .transcript
            .lock()
            .expect("transcript mutex poisoned")
            .clone())
    }

    async fn unload(&self, handle: ModelHandle) {
        if self
            .loaded
            .lock()
            .expect("loaded set mutex poisoned")
            .remove(&handle)
        {
            tracing::debug!(%handle, "Mock model unloaded");
        }
    }
}
