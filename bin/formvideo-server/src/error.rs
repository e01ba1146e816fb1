//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors become a JSON body
//! `{"error": "..."}` with an appropriate status code.
//!
//! Internal errors (runtime, store, I/O) are logged with full detail but
//! only a generic message is returned, so file paths and SQL never reach clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use formvideo_core::RuntimeError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// All errors that can occur in the formvideo-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Propagated from the job runtime or job store.
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// The caller referenced a resource that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller sent an invalid or malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The upload exceeds the configured size cap.
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match &self {
            // Client-facing errors: expose the message directly.
            ServerError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::PayloadTooLarge(m) => (StatusCode::PAYLOAD_TOO_LARGE, m.clone()),

            ServerError::Runtime(RuntimeError::NotFound { job_id }) => {
                (StatusCode::NOT_FOUND, format!("Video submission {job_id} not found"))
            }
            ServerError::Runtime(RuntimeError::QueueFull { .. }) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "processing queue is full; retry later".to_owned(),
            ),
            ServerError::Runtime(RuntimeError::Shutdown) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "server is shutting down".to_owned(),
            ),
            ServerError::Runtime(e) => {
                error!(error = %e, "job runtime error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
        };
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

impl From<std::io::Error> for ServerError {
    fn from(e: std::io::Error) -> Self {
        ServerError::Internal(format!("I/O error: {e}"))
    }
}
