//! Recording lifecycle: start, stop, toggle, and capture failure intake.

use sotto_audio::AudioRecorder;
use sotto_core::error::BridgeError;
use sotto_core::events::BridgeEvent;
use sotto_core::state::{Activity, PermissionState};
use sotto_speech::SpeechModel;

use crate::engine::Engine;

impl<M, R> Engine<M, R>
where
    M: SpeechModel + 'static,
    R: AudioRecorder + 'static,
{
    /// Handle `startRecording`.
    ///
    /// Fire-and-forget from the client's perspective: the command result is
    /// always null, and precondition failures surface as `recordingFailed`
    /// events. Starting while already recording is a logged no-op.
    pub async fn start_recording(&self) {
        let _admission = match self.admission.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                let error = BridgeError::AlreadyInProgress {
                    operation: "concurrent command",
                };
                tracing::warn!(error = %error, "Recording rejected");
                self.emit_ordered(BridgeEvent::recording_failed(&error));
                self.log.append(format!("Recording rejected: {error}"));
                return;
            }
        };

        {
            let mut state = self.lock_state();
            if state.activity == Activity::Recording {
                tracing::debug!("Already recording, ignoring start");
                return;
            }
            let rejection = if state.permission != PermissionState::Granted {
                Some(BridgeError::MicPermissionDenied)
            } else if !state.model.is_loaded() {
                Some(BridgeError::ModelNotLoaded)
            } else if state.activity == Activity::Transcribing {
                Some(BridgeError::AlreadyInProgress {
                    operation: "transcription",
                })
            } else {
                None
            };
            if let Some(error) = rejection {
                tracing::warn!(error = %error, "Recording rejected");
                self.broadcaster.emit(BridgeEvent::recording_failed(&error));
                drop(state);
                self.log.append(format!("Recording rejected: {error}"));
                return;
            }
            state.activity = Activity::Recording;
        }

        match self.recorder.start().await {
            Ok(()) => {
                self.emit_ordered(BridgeEvent::did_start_recording());
                tracing::info!("Recording started");
            }
            Err(error) => {
                {
                    let mut state = self.lock_state();
                    state.activity = Activity::Idle;
                    self.broadcaster.emit(BridgeEvent::recording_failed(&error));
                }
                tracing::warn!(error = %error, "Capture failed to start");
                self.log
                    .append(format!("Recording failed to start: {}", error.detail()));
            }
        }
    }

    /// Handle `stopRecording`. A no-op unless something is recording.
    ///
    /// The artifact handed back by the capture layer becomes the engine's
    /// last recording; when configured, it is fed straight into
    /// transcription.
    pub async fn stop_recording(&self) {
        let artifact = {
            let _admission = match self.admission.try_lock() {
                Ok(guard) => guard,
                Err(_) => {
                    tracing::debug!("Concurrent command in flight, ignoring stop");
                    return;
                }
            };

            {
                let mut state = self.lock_state();
                if state.activity != Activity::Recording {
                    tracing::debug!("Not recording, ignoring stop");
                    return;
                }
                state.activity = Activity::Idle;
            }

            let artifact = match self.recorder.stop().await {
                Ok(artifact) => artifact,
                Err(error) => {
                    tracing::warn!(error = %error, "Capture stop failed");
                    self.log
                        .append(format!("Capture stop failed: {}", error.detail()));
                    None
                }
            };

            if let Some(path) = &artifact {
                *self
                    .last_recording
                    .lock()
                    .expect("recording path mutex poisoned") = Some(path.clone());
            }
            self.emit_ordered(BridgeEvent::did_stop_recording());
            tracing::info!(artifact = ?artifact, "Recording stopped");
            artifact
        };

        if self.transcribe_on_stop {
            if let Some(path) = artifact {
                self.transcribe_last_recording(&path).await;
            }
        }
    }

    /// Handle `toggleRecording`.
    pub async fn toggle_recording(&self) {
        if self.is_recording() {
            self.stop_recording().await;
        } else {
            self.start_recording().await;
        }
    }

    /// Entry point for asynchronous capture failures reported by the audio
    /// backend after a successful start. Outside a recording session the
    /// report is stale and only logged.
    pub fn on_capture_failure(&self, message: &str) {
        {
            let mut state = self.lock_state();
            if state.activity != Activity::Recording {
                drop(state);
                tracing::debug!(message, "Capture failure reported while not recording");
                return;
            }
            state.activity = Activity::Idle;
            let error = BridgeError::RecordingFailed {
                reason: message.to_string(),
            };
            self.broadcaster.emit(BridgeEvent::recording_failed(&error));
        }
        tracing::warn!(message, "Recording failed");
        self.log.append(format!("Recording failed: {message}"));
    }
}
