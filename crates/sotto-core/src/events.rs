//! Bridge events and the single-subscriber broadcaster.
//!
//! Events are the one-way notifications pushed from the engine to the UI
//! client. The serde form is the wire form: a tagged object such as
//! `{"event": "didTranscribe", "text": "..."}`.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::error::BridgeError;

/// Lifecycle notifications pushed from the engine to the UI client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BridgeEvent {
    /// Transcription finished; carries the recognized text.
    DidTranscribe { text: String },
    /// Recording could not start or failed mid-capture.
    RecordingFailed { error: String },
    /// Transcription failed after the operation was accepted.
    FailedToTranscribe { error: String },
    /// Permission is unknown and the platform collaborator should show the
    /// OS dialog. The outcome comes back through the permission-result
    /// entry point, not through an event.
    PermissionRequestNeeded,
    /// Capture started.
    DidStartRecording { is_recording: bool },
    /// Capture stopped.
    DidStopRecording { is_recording: bool },
}

impl BridgeEvent {
    /// Wire name of this event, also used as the SSE event name.
    pub fn event_name(&self) -> &'static str {
        match self {
            BridgeEvent::DidTranscribe { .. } => "didTranscribe",
            BridgeEvent::RecordingFailed { .. } => "recordingFailed",
            BridgeEvent::FailedToTranscribe { .. } => "failedToTranscribe",
            BridgeEvent::PermissionRequestNeeded => "permissionRequestNeeded",
            BridgeEvent::DidStartRecording { .. } => "didStartRecording",
            BridgeEvent::DidStopRecording { .. } => "didStopRecording",
        }
    }

    /// Recording failure event carrying the error's wire string.
    pub fn recording_failed(error: &BridgeError) -> Self {
        BridgeEvent::RecordingFailed {
            error: error.to_string(),
        }
    }

    /// Transcription failure event carrying the error's wire string.
    pub fn failed_to_transcribe(error: &BridgeError) -> Self {
        BridgeEvent::FailedToTranscribe {
            error: error.to_string(),
        }
    }

    pub fn did_start_recording() -> Self {
        BridgeEvent::DidStartRecording { is_recording: true }
    }

    pub fn did_stop_recording() -> Self {
        BridgeEvent::DidStopRecording {
            is_recording: false,
        }
    }
}

/// Fan-out point for [`BridgeEvent`]s with at most one subscriber.
///
/// Subscribing replaces the previous subscriber; emitting with no subscriber
/// discards the event. Delivery is a non-blocking channel send, so emitters
/// are never suspended by a slow client, and events arrive in emission
/// order.
#[derive(Clone, Debug, Default)]
pub struct EventBroadcaster {
    sink: Arc<Mutex<Option<UnboundedSender<BridgeEvent>>>>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh subscriber, replacing any existing one.
    ///
    /// The previous subscriber's sender is dropped, which ends its stream.
    pub fn subscribe(&self) -> UnboundedReceiver<BridgeEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut sink = self.sink.lock().expect("subscriber mutex poisoned");
        if sink.replace(tx).is_some() {
            tracing::debug!("Event subscriber replaced");
        }
        rx
    }

    /// Remove the current subscriber. Later events are discarded.
    pub fn unsubscribe(&self) {
        if self
            .sink
            .lock()
            .expect("subscriber mutex poisoned")
            .take()
            .is_some()
        {
            tracing::debug!("Event subscriber removed");
        }
    }

    pub fn has_subscriber(&self) -> bool {
        self.sink
            .lock()
            .expect("subscriber mutex poisoned")
            .is_some()
    }

    /// Deliver an event to the current subscriber.
    ///
    /// A subscriber whose receiver is gone counts as unsubscribed and is
    /// cleared here.
    pub fn emit(&self, event: BridgeEvent) {
        let mut sink = self.sink.lock().expect("subscriber mutex poisoned");
        match sink.as_ref() {
            Some(tx) => {
                let name = event.event_name();
                if tx.send(event).is_err() {
                    tracing::debug!(event = name, "Event subscriber gone, clearing sink");
                    *sink = None;
                } else {
                    tracing::trace!(event = name, "Event delivered");
                }
            }
            None => {
                tracing::trace!(event = event.event_name(), "No subscriber, event discarded");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ==================== Wire form ====================

    #[test]
    fn test_event_wire_form() {
        let event = BridgeEvent::DidTranscribe {
            text: "hello world".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"event": "didTranscribe", "text": "hello world"})
        );

        let event = BridgeEvent::RecordingFailed {
            error: "Microphone access denied".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"event": "recordingFailed", "error": "Microphone access denied"})
        );

        assert_eq!(
            serde_json::to_value(BridgeEvent::PermissionRequestNeeded).unwrap(),
            json!({"event": "permissionRequestNeeded"})
        );
    }

    #[test]
    fn test_recording_flag_field_is_camel_case() {
        assert_eq!(
            serde_json::to_value(BridgeEvent::did_start_recording()).unwrap(),
            json!({"event": "didStartRecording", "isRecording": true})
        );
        assert_eq!(
            serde_json::to_value(BridgeEvent::did_stop_recording()).unwrap(),
            json!({"event": "didStopRecording", "isRecording": false})
        );
    }

    #[test]
    fn test_event_round_trip() {
        let event = BridgeEvent::FailedToTranscribe {
            error: "Transcription failed: decode error".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let parsed: BridgeEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_event_names() {
        let text = BridgeEvent::DidTranscribe {
            text: String::new(),
        };
        assert_eq!(text.event_name(), "didTranscribe");
        assert_eq!(
            BridgeEvent::PermissionRequestNeeded.event_name(),
            "permissionRequestNeeded"
        );
        assert_eq!(
            BridgeEvent::did_start_recording().event_name(),
            "didStartRecording"
        );
        assert_eq!(
            BridgeEvent::did_stop_recording().event_name(),
            "didStopRecording"
        );
    }

    #[test]
    fn test_failure_constructors_use_display_string() {
        let event = BridgeEvent::recording_failed(&BridgeError::MicPermissionDenied);
        assert_eq!(
            event,
            BridgeEvent::RecordingFailed {
                error: "Microphone access denied".to_string()
            }
        );

        let event = BridgeEvent::failed_to_transcribe(&BridgeError::ModelNotLoaded);
        assert_eq!(
            event,
            BridgeEvent::FailedToTranscribe {
                error: "Model Not Loaded".to_string()
            }
        );
    }

    // ==================== Broadcaster ====================

    #[test]
    fn test_emit_without_subscriber_discards() {
        let broadcaster = EventBroadcaster::new();
        assert!(!broadcaster.has_subscriber());
        broadcaster.emit(BridgeEvent::PermissionRequestNeeded);

        // Events emitted before subscribing are not buffered.
        let mut rx = broadcaster.subscribe();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_emit_delivers_in_order() {
        let broadcaster = EventBroadcaster::new();
        let mut rx = broadcaster.subscribe();

        broadcaster.emit(BridgeEvent::did_start_recording());
        broadcaster.emit(BridgeEvent::did_stop_recording());
        broadcaster.emit(BridgeEvent::DidTranscribe {
            text: "done".to_string(),
        });

        assert_eq!(rx.try_recv().unwrap(), BridgeEvent::did_start_recording());
        assert_eq!(rx.try_recv().unwrap(), BridgeEvent::did_stop_recording());
        assert_eq!(
            rx.try_recv().unwrap(),
            BridgeEvent::DidTranscribe {
                text: "done".to_string()
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_subscribe_replaces_previous_subscriber() {
        let broadcaster = EventBroadcaster::new();
        let mut first = broadcaster.subscribe();
        let mut second = broadcaster.subscribe();

        broadcaster.emit(BridgeEvent::PermissionRequestNeeded);

        assert_eq!(second.try_recv().unwrap(), BridgeEvent::PermissionRequestNeeded);
        // The first subscriber's channel was closed by the replacement.
        assert!(matches!(
            first.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_unsubscribe_silences_stream() {
        let broadcaster = EventBroadcaster::new();
        let mut rx = broadcaster.subscribe();
        broadcaster.unsubscribe();
        assert!(!broadcaster.has_subscriber());

        broadcaster.emit(BridgeEvent::PermissionRequestNeeded);
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_dropped_receiver_clears_sink() {
        let broadcaster = EventBroadcaster::new();
        let rx = broadcaster.subscribe();
        drop(rx);

        assert!(broadcaster.has_subscriber());
        broadcaster.emit(BridgeEvent::PermissionRequestNeeded);
        assert!(!broadcaster.has_subscriber());
    }
}
