//! Engine state ownership, permission gate, queries, and reset.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use sotto_audio::AudioRecorder;
use sotto_core::events::{BridgeEvent, EventBroadcaster};
use sotto_core::log::MessageLog;
use sotto_core::state::{Activity, EngineState, ModelState, PermissionState};
use sotto_speech::SpeechModel;

/// The speech-to-text engine driven by the command dispatcher.
///
/// Cloning is cheap and shares the same engine; long-running backend work
/// is spawned with a clone.
///
/// Locking protocol: `state` is a short-section mutex, never held across an
/// await. `admission` serializes state-mutating commands; it is acquired
/// with `try_lock` (contention means a conflicting command is running) and
/// held only through the admission checks plus the near-instant capture
/// start/stop awaits, never through a model load or an inference. Events
/// are emitted while the state lock is held so delivery order matches
/// transition order.
pub struct Engine<M, R> {
    pub(crate) speech: Arc<M>,
    pub(crate) recorder: Arc<R>,
    pub(crate) state: Arc<Mutex<EngineState>>,
    pub(crate) admission: Arc<tokio::sync::Mutex<()>>,
    /// Bumped by `reset()`. Async completions carry the generation observed
    /// at admission and are discarded when it no longer matches.
    pub(crate) generation: Arc<AtomicU64>,
    pub(crate) last_recording: Arc<Mutex<Option<PathBuf>>>,
    pub(crate) broadcaster: EventBroadcaster,
    pub(crate) log: MessageLog,
    pub(crate) transcribe_on_stop: bool,
}

impl<M, R> Clone for Engine<M, R> {
    fn clone(&self) -> Self {
        Self {
            speech: Arc::clone(&self.speech),
            recorder: Arc::clone(&self.recorder),
            state: Arc::clone(&self.state),
            admission: Arc::clone(&self.admission),
            generation: Arc::clone(&self.generation),
            last_recording: Arc::clone(&self.last_recording),
            broadcaster: self.broadcaster.clone(),
            log: self.log.clone(),
            transcribe_on_stop: self.transcribe_on_stop,
        }
    }
}

impl<M, R> Engine<M, R>
where
    M: SpeechModel + 'static,
    R: AudioRecorder + 'static,
{
    /// Create an engine in the pristine initial state.
    pub fn new(speech: M, recorder: R) -> Self {
        Self {
            speech: Arc::new(speech),
            recorder: Arc::new(recorder),
            state: Arc::new(Mutex::new(EngineState::new())),
            admission: Arc::new(tokio::sync::Mutex::new(())),
            generation: Arc::new(AtomicU64::new(0)),
            last_recording: Arc::new(Mutex::new(None)),
            broadcaster: EventBroadcaster::new(),
            log: MessageLog::new(),
            transcribe_on_stop: false,
        }
    }

    /// Feed each completed recording straight into transcription.
    pub fn with_transcribe_on_stop(mut self, enabled: bool) -> Self {
        self.transcribe_on_stop = enabled;
        self
    }

    /// Event fan-out point; the bridge subscribes its event stream here.
    pub fn broadcaster(&self) -> &EventBroadcaster {
        &self.broadcaster
    }

    /// Client-visible log backing `getMessageLogs`.
    pub fn message_log(&self) -> &MessageLog {
        &self.log
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().expect("state mutex poisoned")
    }

    /// Emit outside a held state lock while preserving emission order.
    pub(crate) fn emit_ordered(&self, event: BridgeEvent) {
        let _state = self.lock_state();
        self.broadcaster.emit(event);
    }

    // ==================== Queries ====================

    /// Copy of the current engine state.
    pub fn snapshot(&self) -> EngineState {
        *self.lock_state()
    }

    pub fn is_recording(&self) -> bool {
        self.snapshot().is_recording()
    }

    pub fn is_model_loaded(&self) -> bool {
        self.snapshot().is_model_loaded()
    }

    pub fn can_transcribe(&self) -> bool {
        self.snapshot().can_transcribe()
    }

    pub fn is_permission_granted(&self) -> bool {
        self.snapshot().permission == PermissionState::Granted
    }

    /// Artifact produced by the most recent completed recording.
    pub fn last_recording(&self) -> Option<PathBuf> {
        self.last_recording
            .lock()
            .expect("recording path mutex poisoned")
            .clone()
    }

    // ==================== Permission gate ====================

    /// Handle `callRequestRecordPermission`.
    ///
    /// From `Unknown` this emits `PermissionRequestNeeded` so the platform
    /// collaborator can show the OS dialog; the outcome arrives later via
    /// [`Engine::on_permission_result`]. A settled permission emits nothing.
    pub fn request_permission(&self) {
        let state = self.lock_state();
        match state.permission {
            PermissionState::Unknown => {
                tracing::info!("Microphone permission unknown, requesting OS prompt");
                self.broadcaster.emit(BridgeEvent::PermissionRequestNeeded);
            }
            PermissionState::Granted | PermissionState::Denied => {
                tracing::debug!(permission = %state.permission, "Permission already settled");
            }
        }
    }

    /// Record the outcome of the OS permission dialog.
    ///
    /// A repeat with the same value is idempotent; a conflicting repeat
    /// wins (the OS is the source of truth) and is noted in the message
    /// log.
    pub fn on_permission_result(&self, granted: bool) {
        let new = if granted {
            PermissionState::Granted
        } else {
            PermissionState::Denied
        };

        let previous = {
            let mut state = self.lock_state();
            let previous = state.permission;
            state.permission = new;
            previous
        };

        match previous {
            PermissionState::Unknown => {
                tracing::info!(granted, "Microphone permission result received");
                if !granted {
                    self.log.append("Microphone permission denied");
                }
            }
            p if p == new => {
                tracing::debug!(granted, "Duplicate permission result");
            }
            p => {
                tracing::warn!(
                    previous = %p,
                    granted,
                    "Conflicting permission result, last value wins"
                );
                self.log
                    .append(format!("Conflicting permission result: {p} then {new}"));
            }
        }
    }

    // ==================== Playback ====================

    /// Handle `enablePlayback`: forward the flag to the capture layer.
    pub fn enable_playback(&self, enabled: bool) {
        tracing::debug!(enabled, "Playback flag forwarded");
        self.recorder.set_playback(enabled);
    }

    // ==================== Reset ====================

    /// Handle `reset`: forcibly return the engine to its initial state.
    ///
    /// The one mutating command that waits for admission instead of
    /// rejecting on contention, since reset is the cancellation path and
    /// must always land. The generation is bumped before teardown so any
    /// in-flight load or inference completion becomes stale. Permission is
    /// kept: it caches an OS fact a reset cannot change. The message log
    /// survives.
    pub async fn reset(&self) {
        let _admission = self.admission.lock().await;
        self.generation.fetch_add(1, Ordering::SeqCst);

        let (old_handle, was_recording) = {
            let mut state = self.lock_state();
            let old_handle = state.model.handle();
            let was_recording = state.activity == Activity::Recording;
            state.model = ModelState::NotLoaded;
            state.activity = Activity::Idle;
            (old_handle, was_recording)
        };

        if was_recording {
            if let Err(e) = self.recorder.stop().await {
                tracing::warn!(error = %e, "Capture stop during reset failed");
            }
        }
        if let Some(handle) = old_handle {
            self.speech.unload(handle).await;
        }
        self.last_recording
            .lock()
            .expect("recording path mutex poisoned")
            .take();

        self.log.append("Engine reset");
        tracing::info!("Engine reset to initial state");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use sotto_audio::MockRecorder;
    use sotto_speech::MockSpeechModel;
    use tempfile::NamedTempFile;

    fn test_engine() -> (
        Engine<Arc<MockSpeechModel>, Arc<MockRecorder>>,
        Arc<MockSpeechModel>,
        Arc<MockRecorder>,
    ) {
        let speech = Arc::new(MockSpeechModel::new());
        let recorder = Arc::new(MockRecorder::new());
        let engine = Engine::new(Arc::clone(&speech), Arc::clone(&recorder));
        (engine, speech, recorder)
    }

    #[test]
    fn test_pristine_queries() {
        let (engine, _speech, _recorder) = test_engine();
        assert!(!engine.is_recording());
        assert!(!engine.is_model_loaded());
        assert!(!engine.can_transcribe());
        assert!(!engine.is_permission_granted());
        assert!(engine.last_recording().is_none());
        assert!(engine.message_log().is_empty());
    }

    #[test]
    fn test_request_permission_emits_only_from_unknown() {
        let (engine, _speech, _recorder) = test_engine();
        let mut rx = engine.broadcaster().subscribe();

        engine.request_permission();
        assert_eq!(
            rx.try_recv().unwrap(),
            BridgeEvent::PermissionRequestNeeded
        );

        engine.on_permission_result(true);
        engine.request_permission();
        assert!(rx.try_recv().is_err());

        engine.on_permission_result(false);
        engine.request_permission();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_permission_result_is_idempotent() {
        let (engine, _speech, _recorder) = test_engine();

        engine.on_permission_result(true);
        assert!(engine.is_permission_granted());

        engine.on_permission_result(true);
        assert!(engine.is_permission_granted());
        assert!(engine.message_log().is_empty());
    }

    #[test]
    fn test_conflicting_permission_result_last_value_wins() {
        let (engine, _speech, _recorder) = test_engine();

        engine.on_permission_result(true);
        engine.on_permission_result(false);
        assert!(!engine.is_permission_granted());

        let entries = engine.message_log().entries();
        assert!(entries
            .iter()
            .any(|e| e.text.contains("Conflicting permission result")));
    }

    #[test]
    fn test_denied_permission_is_logged() {
        let (engine, _speech, _recorder) = test_engine();
        engine.on_permission_result(false);

        assert!(!engine.is_permission_granted());
        assert!(engine
            .message_log()
            .entries()
            .iter()
            .any(|e| e.text.contains("permission denied")));
    }

    #[test]
    fn test_enable_playback_forwards_to_recorder() {
        let (engine, _speech, recorder) = test_engine();
        assert!(!recorder.playback_enabled());

        engine.enable_playback(true);
        assert!(recorder.playback_enabled());

        engine.enable_playback(false);
        assert!(!recorder.playback_enabled());
    }

    #[tokio::test]
    async fn test_reset_restores_pristine_state_and_unloads_model() {
        let (engine, speech, _recorder) = test_engine();
        let model = NamedTempFile::new().unwrap();

        engine.on_permission_result(true);
        engine
            .initialize_model(model.path().to_str().unwrap(), false)
            .await
            .unwrap();
        assert!(engine.is_model_loaded());
        assert_eq!(speech.loaded_count(), 1);

        engine.reset().await;

        assert!(!engine.is_model_loaded());
        assert!(!engine.is_recording());
        assert!(!engine.can_transcribe());
        assert_eq!(speech.loaded_count(), 0);
    }

    #[tokio::test]
    async fn test_reset_keeps_permission_and_message_log() {
        let (engine, _speech, _recorder) = test_engine();

        engine.on_permission_result(true);
        engine.log.append("before reset");

        engine.reset().await;

        assert!(engine.is_permission_granted());
        let entries = engine.message_log().entries();
        assert!(entries.iter().any(|e| e.text == "before reset"));
        assert!(entries.iter().any(|e| e.text == "Engine reset"));
    }

    #[tokio::test]
    async fn test_reset_stops_active_recording() {
        let (engine, _speech, recorder) = test_engine();
        let model = NamedTempFile::new().unwrap();

        engine.on_permission_result(true);
        engine
            .initialize_model(model.path().to_str().unwrap(), false)
            .await
            .unwrap();
        engine.start_recording().await;
        assert!(engine.is_recording());
        assert!(recorder.is_active());

        engine.reset().await;

        assert!(!engine.is_recording());
        assert!(!recorder.is_active());
    }

    #[tokio::test]
    async fn test_reset_clears_last_recording() {
        let (engine, _speech, recorder) = test_engine();
        let model = NamedTempFile::new().unwrap();
        let artifact = NamedTempFile::new().unwrap();

        engine.on_permission_result(true);
        engine
            .initialize_model(model.path().to_str().unwrap(), false)
            .await
            .unwrap();
        recorder.set_next_artifact(artifact.path());
        engine.start_recording().await;
        engine.stop_recording().await;
        assert!(engine.last_recording().is_some());

        engine.reset().await;
        assert!(engine.last_recording().is_none());
    }

    #[tokio::test]
    async fn test_reset_emits_no_events() {
        let (engine, _speech, _recorder) = test_engine();
        let mut rx = engine.broadcaster().subscribe();

        engine.reset().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let (engine, _speech, _recorder) = test_engine();
        let clone = engine.clone();

        engine.on_permission_result(true);
        assert!(clone.is_permission_granted());
    }
}
