//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are automatically converted
//! to a JSON-body HTTP response with an appropriate status code.
//!
//! Internal errors (database, generation) are logged with full detail but
//! only a generic message is returned so that file paths, SQL and backend
//! diagnostics never leak to clients.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use textgen_core::{FailureKind, GenerationFailure, InputError};
use thiserror::Error;
use tracing::{debug, error};

pub const GENERATION_FAILED: &str = "Failed to generate response";
pub const INTERNAL_ERROR: &str = "Internal server error";

/// All errors that can occur in the textgen-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The model produced no result. Already logged by the invoker.
    #[error("generation failed: {0}")]
    Generation(#[from] GenerationFailure),

    /// Propagated from the SQLite store.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The caller referenced a resource that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller sent an invalid or malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Generation(f) => match f.kind {
                FailureKind::ModelNotFound => StatusCode::SERVICE_UNAVAILABLE,
                FailureKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
                FailureKind::Backend | FailureKind::Execution | FailureKind::Unknown => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Database(_) | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let client_message = match &self {
            // Client-facing errors: expose the message directly.
            ServerError::NotFound(m) | ServerError::BadRequest(m) => m.clone(),

            ServerError::Generation(f) => {
                debug!(kind = %f.kind, "mapping generation failure to response");
                GENERATION_FAILED.to_owned()
            }
            ServerError::Database(e) => {
                error!(error = %e, "database error");
                INTERNAL_ERROR.to_owned()
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                INTERNAL_ERROR.to_owned()
            }
        };
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

impl From<InputError> for ServerError {
    fn from(e: InputError) -> Self {
        ServerError::BadRequest(e.to_string())
    }
}
