//! Transcription: admission, spawned inference, and completion delivery.

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use sotto_audio::AudioRecorder;
use sotto_core::error::BridgeError;
use sotto_core::events::BridgeEvent;
use sotto_core::state::{Activity, ModelHandle};
use sotto_speech::SpeechModel;

use crate::engine::Engine;

impl<M, R> Engine<M, R>
where
    M: SpeechModel + 'static,
    R: AudioRecorder + 'static,
{
    /// Handle `transcribeSample`.
    ///
    /// Admission errors come back to the caller; the transcript itself
    /// arrives later as a `didTranscribe` or `failedToTranscribe` event
    /// once the spawned inference completes.
    pub async fn transcribe_sample(&self, path: &str) -> Result<(), BridgeError> {
        self.begin_transcription(Path::new(path))
    }

    /// Transcribe the artifact a completed recording produced. Rejections
    /// have no caller to return to, so they surface on the event stream.
    pub(crate) async fn transcribe_last_recording(&self, audio: &Path) {
        if let Err(error) = self.begin_transcription(audio) {
            tracing::warn!(error = %error, "Transcription of last recording rejected");
            self.emit_ordered(BridgeEvent::failed_to_transcribe(&error));
            self.log
                .append(format!("Transcription of last recording rejected: {error}"));
        }
    }

    /// Check preconditions, mark the engine transcribing, and spawn the
    /// inference task. The admission guard is released on return; the
    /// `Transcribing` activity is what excludes overlapping work until the
    /// completion lands.
    fn begin_transcription(&self, audio: &Path) -> Result<(), BridgeError> {
        if !audio.is_file() {
            return Err(BridgeError::MissingRecordedFile);
        }

        let _admission = self
            .admission
            .try_lock()
            .map_err(|_| BridgeError::AlreadyInProgress {
                operation: "concurrent command",
            })?;

        let (handle, generation) = {
            let mut state = self.lock_state();
            let handle = state.model.handle().ok_or(BridgeError::ModelNotLoaded)?;
            match state.activity {
                Activity::Recording => {
                    return Err(BridgeError::AlreadyInProgress {
                        operation: "recording",
                    })
                }
                Activity::Transcribing => {
                    return Err(BridgeError::AlreadyInProgress {
                        operation: "transcription",
                    })
                }
                Activity::Idle => {}
            }
            state.activity = Activity::Transcribing;
            (handle, self.generation.load(Ordering::SeqCst))
        };

        tracing::info!(path = %audio.display(), "Transcription started");
        let engine = self.clone();
        let audio = audio.to_path_buf();
        tokio::spawn(async move {
            engine.finish_transcription(audio, handle, generation).await;
        });
        Ok(())
    }

    /// Run inference and deliver the outcome. A completion whose generation
    /// predates the last reset is discarded without touching state.
    async fn finish_transcription(
        &self,
        audio: PathBuf,
        handle: ModelHandle,
        generation: u64,
    ) {
        let result = self.speech.transcribe(&audio, handle).await;

        let failure = {
            let mut state = self.lock_state();
            if self.generation.load(Ordering::SeqCst) != generation {
                drop(state);
                tracing::info!(path = %audio.display(), "Discarding transcription superseded by reset");
                self.log.append(format!(
                    "Discarded stale transcription of {}",
                    audio.display()
                ));
                return;
            }
            state.activity = Activity::Idle;
            match result {
                Ok(text) => {
                    tracing::info!(chars = text.len(), "Transcription completed");
                    self.broadcaster.emit(BridgeEvent::DidTranscribe { text });
                    None
                }
                Err(error) => {
                    self.broadcaster
                        .emit(BridgeEvent::failed_to_transcribe(&error));
                    Some(error)
                }
            }
        };

        if let Some(error) = failure {
            tracing::warn!(error = %error, "Transcription failed");
            self.log.append(format!("Transcription failed: {error}"));
        }
    }
}
