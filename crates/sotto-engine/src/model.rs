//! Model management: the `initializeModel` path.

use std::path::Path;
use std::sync::atomic::Ordering;

use sotto_audio::AudioRecorder;
use sotto_core::error::BridgeError;
use sotto_core::state::{Activity, ModelState};
use sotto_speech::SpeechModel;

use crate::engine::Engine;

impl<M, R> Engine<M, R>
where
    M: SpeechModel + 'static,
    R: AudioRecorder + 'static,
{
    /// Handle `initializeModel`.
    ///
    /// The only command whose result is delivered after an asynchronous
    /// suspension: the call awaits the backend load and resolves exactly
    /// once with `Ok(true)` or a `ModelLoad` error. While the load is in
    /// flight the model state is `Loading`; competing loads, like loads
    /// during an active recording or transcription, are rejected with
    /// `AlreadyInProgress`. A load that completes after a `reset()` is
    /// discarded and its handle unloaded.
    pub async fn initialize_model(
        &self,
        path: &str,
        force_reload: bool,
    ) -> Result<bool, BridgeError> {
        if path.is_empty() {
            return Err(BridgeError::InvalidArgument {
                field: "path".to_string(),
            });
        }

        let (generation, previous) = {
            let _admission = self.admission.try_lock().map_err(|_| {
                BridgeError::AlreadyInProgress {
                    operation: "concurrent command",
                }
            })?;
            let mut state = self.lock_state();
            match state.model {
                ModelState::Loading => {
                    return Err(BridgeError::AlreadyInProgress {
                        operation: "model load",
                    });
                }
                ModelState::Loaded(_) if !force_reload => {
                    tracing::debug!(path, "Model already loaded, skipping reload");
                    return Ok(true);
                }
                _ => {}
            }
            // A resident model may not be swapped out from under an active
            // recording or transcription.
            match state.activity {
                Activity::Recording => {
                    return Err(BridgeError::AlreadyInProgress {
                        operation: "recording",
                    });
                }
                Activity::Transcribing => {
                    return Err(BridgeError::AlreadyInProgress {
                        operation: "transcription",
                    });
                }
                Activity::Idle => {}
            }
            if !Path::new(path).is_file() {
                return Err(BridgeError::ModelLoad(format!(
                    "model file does not exist at {path}"
                )));
            }
            let previous = state.model.handle();
            state.model = ModelState::Loading;
            (self.generation.load(Ordering::SeqCst), previous)
        };

        // A forced reload evicts the resident model before loading the new
        // one; the backend never holds two.
        if let Some(handle) = previous {
            self.speech.unload(handle).await;
        }

        tracing::info!(path, force_reload, "Loading model");
        let loaded = self.speech.load(Path::new(path)).await;

        let mut state = self.lock_state();
        if self.generation.load(Ordering::SeqCst) != generation {
            drop(state);
            tracing::info!(path, "Model load superseded by reset, discarding");
            self.log.append(format!("Discarded stale model load for {path}"));
            if let Ok(handle) = loaded {
                self.speech.unload(handle).await;
            }
            return Err(BridgeError::ModelLoad(
                "model load superseded by reset".to_string(),
            ));
        }

        match loaded {
            Ok(handle) => {
                state.model = ModelState::Loaded(handle);
                drop(state);
                tracing::info!(%handle, path, "Model loaded");
                Ok(true)
            }
            Err(e) => {
                state.model = ModelState::NotLoaded;
                drop(state);
                tracing::warn!(path, error = %e, "Model load failed");
                self.log.append(format!("Model load failed: {e}"));
                Err(e)
            }
        }
    }
}
