//! The command table: wire names, request parsing, and dispatch.
//!
//! The dispatcher validates arguments before any engine call; the engine
//! never sees a malformed command. It holds no state of its own.

use serde_json::{Map, Value};

use sotto_audio::AudioRecorder;
use sotto_core::error::BridgeError;
use sotto_engine::Engine;
use sotto_speech::SpeechModel;

// ==================== Command names ====================

/// The bridge's method table. Wire names are camelCase and fixed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandName {
    CallRequestRecordPermission,
    InitializeModel,
    StartRecording,
    StopRecording,
    ToggleRecording,
    TranscribeSample,
    EnablePlayback,
    Reset,
    CanTranscribe,
    IsRecording,
    IsModelLoaded,
    GetMessageLogs,
    IsMicrophonePermissionGranted,
}

impl CommandName {
    pub const ALL: [CommandName; 13] = [
        CommandName::CallRequestRecordPermission,
        CommandName::InitializeModel,
        CommandName::StartRecording,
        CommandName::StopRecording,
        CommandName::ToggleRecording,
        CommandName::TranscribeSample,
        CommandName::EnablePlayback,
        CommandName::Reset,
        CommandName::CanTranscribe,
        CommandName::IsRecording,
        CommandName::IsModelLoaded,
        CommandName::GetMessageLogs,
        CommandName::IsMicrophonePermissionGranted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandName::CallRequestRecordPermission => "callRequestRecordPermission",
            CommandName::InitializeModel => "initializeModel",
            CommandName::StartRecording => "startRecording",
            CommandName::StopRecording => "stopRecording",
            CommandName::ToggleRecording => "toggleRecording",
            CommandName::TranscribeSample => "transcribeSample",
            CommandName::EnablePlayback => "enablePlayback",
            CommandName::Reset => "reset",
            CommandName::CanTranscribe => "canTranscribe",
            CommandName::IsRecording => "isRecording",
            CommandName::IsModelLoaded => "isModelLoaded",
            CommandName::GetMessageLogs => "getMessageLogs",
            CommandName::IsMicrophonePermissionGranted => "isMicrophonePermissionGranted",
        }
    }

    /// Look up a wire method name. `None` means the method is not part of
    /// the protocol, which the dispatcher reports as `NotImplemented` so
    /// clients can detect version skew.
    pub fn parse(method: &str) -> Option<CommandName> {
        CommandName::ALL
            .into_iter()
            .find(|name| name.as_str() == method)
    }
}

// ==================== Request parsing ====================

/// A parsed command body: `{"method": ..., "args": {...}}`.
#[derive(Debug)]
pub struct CommandRequest {
    pub method: String,
    args: Map<String, Value>,
}

impl CommandRequest {
    /// Parse the raw JSON body. `args` may be absent or null; any other
    /// non-object shape is rejected.
    pub fn from_value(value: Value) -> Result<Self, BridgeError> {
        let method = value
            .get("method")
            .and_then(Value::as_str)
            .ok_or_else(|| BridgeError::InvalidArgument {
                field: "method".to_string(),
            })?
            .to_string();

        let args = match value.get("args") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return Err(BridgeError::InvalidArgument {
                    field: "args".to_string(),
                })
            }
        };

        Ok(Self { method, args })
    }

    fn require_str(&self, field: &str) -> Result<&str, BridgeError> {
        self.args
            .get(field)
            .and_then(Value::as_str)
            .ok_or_else(|| BridgeError::InvalidArgument {
                field: field.to_string(),
            })
    }

    fn require_bool(&self, field: &str) -> Result<bool, BridgeError> {
        self.args
            .get(field)
            .and_then(Value::as_bool)
            .ok_or_else(|| BridgeError::InvalidArgument {
                field: field.to_string(),
            })
    }

    /// Absent or null means the default; a present value must be a bool.
    fn optional_bool(&self, field: &str, default: bool) -> Result<bool, BridgeError> {
        match self.args.get(field) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(BridgeError::InvalidArgument {
                field: field.to_string(),
            }),
        }
    }
}

// ==================== Dispatch ====================

/// Forward a parsed command to the engine and shape its result.
pub async fn dispatch<M, R>(
    engine: &Engine<M, R>,
    request: &CommandRequest,
) -> Result<Value, BridgeError>
where
    M: SpeechModel + 'static,
    R: AudioRecorder + 'static,
{
    let name = CommandName::parse(&request.method).ok_or_else(|| {
        BridgeError::NotImplemented {
            method: request.method.clone(),
        }
    })?;
    tracing::debug!(method = name.as_str(), "Dispatching command");

    match name {
        CommandName::CallRequestRecordPermission => {
            engine.request_permission();
            Ok(Value::Null)
        }
        CommandName::InitializeModel => {
            let path = request.require_str("path")?;
            let force_reload = request.optional_bool("forceReload", false)?;
            engine
                .initialize_model(path, force_reload)
                .await
                .map(Value::Bool)
        }
        CommandName::StartRecording => {
            engine.start_recording().await;
            Ok(Value::Null)
        }
        CommandName::StopRecording => {
            engine.stop_recording().await;
            Ok(Value::Null)
        }
        CommandName::ToggleRecording => {
            engine.toggle_recording().await;
            Ok(Value::Null)
        }
        CommandName::TranscribeSample => {
            let path = request.require_str("path")?;
            engine.transcribe_sample(path).await.map(|()| Value::Null)
        }
        CommandName::EnablePlayback => {
            let enabled = request.require_bool("enabled")?;
            engine.enable_playback(enabled);
            Ok(Value::Null)
        }
        CommandName::Reset => {
            engine.reset().await;
            Ok(Value::Null)
        }
        CommandName::CanTranscribe => Ok(Value::Bool(engine.can_transcribe())),
        CommandName::IsRecording => Ok(Value::Bool(engine.is_recording())),
        CommandName::IsModelLoaded => Ok(Value::Bool(engine.is_model_loaded())),
        CommandName::GetMessageLogs => {
            Ok(serde_json::to_value(engine.message_log().entries()).unwrap_or_default())
        }
        CommandName::IsMicrophonePermissionGranted => {
            Ok(Value::Bool(engine.is_permission_granted()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;
    use sotto_audio::MockRecorder;
    use sotto_speech::MockSpeechModel;

    fn mock_engine() -> Engine<Arc<MockSpeechModel>, Arc<MockRecorder>> {
        Engine::new(
            Arc::new(MockSpeechModel::new()),
            Arc::new(MockRecorder::new()),
        )
    }

    #[test]
    fn test_command_names_round_trip() {
        for name in CommandName::ALL {
            assert_eq!(CommandName::parse(name.as_str()), Some(name));
        }
    }

    #[test]
    fn test_unknown_method_does_not_parse() {
        assert_eq!(CommandName::parse("bogusMethod"), None);
        // Names are case-sensitive.
        assert_eq!(CommandName::parse("InitializeModel"), None);
        assert_eq!(CommandName::parse(""), None);
    }

    #[test]
    fn test_from_value_requires_string_method() {
        let err = CommandRequest::from_value(json!({"args": {}})).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArgument { field } if field == "method"));

        let err = CommandRequest::from_value(json!({"method": 42})).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArgument { field } if field == "method"));
    }

    #[test]
    fn test_from_value_args_absent_or_null() {
        let request = CommandRequest::from_value(json!({"method": "reset"})).unwrap();
        assert_eq!(request.method, "reset");
        assert!(request.args.is_empty());

        let request =
            CommandRequest::from_value(json!({"method": "reset", "args": null})).unwrap();
        assert!(request.args.is_empty());
    }

    #[test]
    fn test_from_value_rejects_non_object_args() {
        let err =
            CommandRequest::from_value(json!({"method": "reset", "args": [1, 2]})).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArgument { field } if field == "args"));
    }

    #[test]
    fn test_argument_helpers() {
        let request = CommandRequest::from_value(json!({
            "method": "initializeModel",
            "args": {"path": "/models/tiny.bin", "forceReload": true, "enabled": 1}
        }))
        .unwrap();

        assert_eq!(request.require_str("path").unwrap(), "/models/tiny.bin");
        assert!(request.require_str("missing").is_err());

        assert!(request.optional_bool("forceReload", false).unwrap());
        assert!(!request.optional_bool("absent", false).unwrap());
        // Present but mistyped is an error, not the default.
        assert!(request.optional_bool("enabled", false).is_err());
        assert!(request.require_bool("enabled").is_err());
    }

    #[tokio::test]
    async fn test_dispatch_unknown_method() {
        let engine = mock_engine();
        let request =
            CommandRequest::from_value(json!({"method": "bogusMethod"})).unwrap();

        let err = dispatch(&engine, &request).await.unwrap_err();
        assert!(matches!(err, BridgeError::NotImplemented { method } if method == "bogusMethod"));
    }

    #[tokio::test]
    async fn test_dispatch_query_returns_bool() {
        let engine = mock_engine();
        let request =
            CommandRequest::from_value(json!({"method": "canTranscribe"})).unwrap();

        let result = dispatch(&engine, &request).await.unwrap();
        assert_eq!(result, Value::Bool(false));
    }

    #[tokio::test]
    async fn test_dispatch_missing_argument_touches_no_state() {
        let speech = Arc::new(MockSpeechModel::new());
        let engine = Engine::new(Arc::clone(&speech), Arc::new(MockRecorder::new()));
        let request =
            CommandRequest::from_value(json!({"method": "initializeModel", "args": {}}))
                .unwrap();

        let err = dispatch(&engine, &request).await.unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArgument { field } if field == "path"));
        assert_eq!(speech.load_calls(), 0);
        assert!(!engine.is_model_loaded());
    }

    #[tokio::test]
    async fn test_dispatch_message_logs_as_json_array() {
        let engine = mock_engine();
        engine.message_log().append("hello");
        let request =
            CommandRequest::from_value(json!({"method": "getMessageLogs"})).unwrap();

        let result = dispatch(&engine, &request).await.unwrap();
        let entries = result.as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["text"], "hello");
    }
}
