use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use parley::errors::ChatError;

/// Everything a relay endpoint can answer with besides a stream. Each
/// variant maps to the JSON error envelope `{error}` with a status
/// reflecting the failure class.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("{0}")]
    BadRequest(String),

    #[error("no API key configured for {provider}: set {var} (export {var}=... and restart the relay)")]
    MissingCredential { provider: String, var: String },

    #[error("{message}")]
    Upstream { status: u16, message: String },

    #[error("{error}")]
    ImageLoading { error: String, estimated_time: f64 },

    #[error("{0}")]
    Internal(String),
}

impl From<ChatError> for RelayError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::InvalidRequest(message) => RelayError::BadRequest(message),
            ChatError::MissingCredential(var) => RelayError::Internal(format!(
                "relay credential resolution failed unexpectedly: {var}"
            )),
            ChatError::Upstream {
                status, message, ..
            } => RelayError::Upstream { status, message },
            ChatError::Network(message) => RelayError::Internal(message),
            other => RelayError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            RelayError::BadRequest(_) => (StatusCode::BAD_REQUEST, json!({"error": self.to_string()})),
            // A missing credential is the operator's problem, not the caller's.
            RelayError::MissingCredential { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, json!({"error": self.to_string()}))
            }
            RelayError::Upstream { status, .. } => (
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                json!({"error": self.to_string()}),
            ),
            RelayError::ImageLoading {
                error,
                estimated_time,
            } => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({"error": error, "estimated_time": estimated_time}),
            ),
            RelayError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": self.to_string()}),
            ),
        };
        (status, Json(body)).into_response()
    }
}
