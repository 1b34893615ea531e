//! Ingestion Errors

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Errors that can occur while turning a request into an event.
///
/// None of these are retried or surfaced to subscribers; the sender gets the
/// response and the event is never broadcast.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Body could not be read or parsed.
    #[error("Malformed body: {0}")]
    MalformedBody(String),

    /// Body exceeded the configured limit.
    #[error("Payload too large")]
    PayloadTooLarge,

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, "Payload too large"),
            Self::MalformedBody(_) | Self::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = Json(serde_json::json!({
            "success": false,
            "error": message,
        }));

        (status, body).into_response()
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedBody(err.to_string())
    }
}
