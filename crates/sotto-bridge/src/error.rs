//! HTTP mapping for [`BridgeError`]: status codes and the JSON error body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use sotto_core::error::BridgeError;

/// JSON error response body: `{"error": code, "message": text}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable code from [`BridgeError::code`].
    pub error: String,
    /// The error's wire string.
    pub message: String,
}

/// Response wrapper for [`BridgeError`].
#[derive(Debug)]
pub struct ApiError(pub BridgeError);

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            BridgeError::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
            BridgeError::NotImplemented { .. } => StatusCode::NOT_IMPLEMENTED,
            BridgeError::MicPermissionDenied => StatusCode::FORBIDDEN,
            BridgeError::AlreadyInProgress { .. }
            | BridgeError::MissingRecordedFile
            | BridgeError::ModelNotLoaded => StatusCode::CONFLICT,
            BridgeError::ModelLoad(_)
            | BridgeError::RecordingFailed { .. }
            | BridgeError::Transcription(_)
            | BridgeError::Config(_)
            | BridgeError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = ErrorBody {
            error: self.0.code().to_string(),
            message: self.0.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
