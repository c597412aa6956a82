//! Route handlers: command dispatch, SSE event stream, health snapshot,
//! and the permission-result entry point.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

use sotto_audio::AudioRecorder;
use sotto_core::state::PermissionState;
use sotto_speech::SpeechModel;

use crate::command::{dispatch, CommandRequest};
use crate::error::ApiError;
use crate::state::AppState;

// ==================== Wire shapes ====================

/// Successful command envelope: `{"result": v}`.
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub result: Value,
}

/// Body of `POST /permission-result`.
#[derive(Debug, Deserialize)]
pub struct PermissionResult {
    pub granted: bool,
}

/// Engine snapshot returned by `GET /health`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub permission: PermissionState,
    pub is_model_loaded: bool,
    pub is_recording: bool,
    pub can_transcribe: bool,
}

// ==================== Handlers ====================

/// POST /command - parse the envelope, dispatch, wrap the result.
pub async fn command<M, R>(
    State(state): State<AppState<M, R>>,
    Json(payload): Json<Value>,
) -> Result<Json<CommandResponse>, ApiError>
where
    M: SpeechModel + 'static,
    R: AudioRecorder + 'static,
{
    let request = CommandRequest::from_value(payload)?;
    let result = dispatch(&state.engine, &request).await?;
    Ok(Json(CommandResponse { result }))
}

/// GET /events - the one-way SSE event stream.
///
/// Each connection registers a fresh subscriber, replacing the previous
/// one; the replaced connection's stream ends.
pub async fn events<M, R>(
    State(state): State<AppState<M, R>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>> + Send>
where
    M: SpeechModel + 'static,
    R: AudioRecorder + 'static,
{
    let rx = state.engine.broadcaster().subscribe();
    tracing::info!("Event stream connected");

    let stream = UnboundedReceiverStream::new(rx).map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok(Event::default().event(event.event_name()).data(data))
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

/// GET /health - current engine state snapshot.
pub async fn health<M, R>(State(state): State<AppState<M, R>>) -> Json<HealthResponse>
where
    M: SpeechModel + 'static,
    R: AudioRecorder + 'static,
{
    let snapshot = state.engine.snapshot();
    Json(HealthResponse {
        status: "healthy".to_string(),
        permission: snapshot.permission,
        is_model_loaded: snapshot.is_model_loaded(),
        is_recording: snapshot.is_recording(),
        can_transcribe: snapshot.can_transcribe(),
    })
}

/// POST /permission-result - outcome of the OS microphone dialog.
///
/// The platform collaborator's entry point, deliberately off the command
/// table.
pub async fn permission_result<M, R>(
    State(state): State<AppState<M, R>>,
    Json(body): Json<PermissionResult>,
) -> Json<CommandResponse>
where
    M: SpeechModel + 'static,
    R: AudioRecorder + 'static,
{
    state.engine.on_permission_result(body.granted);
    Json(CommandResponse {
        result: Value::Null,
    })
}
