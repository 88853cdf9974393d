//! Error types for mantrify-queuer HTTP handlers

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mantrify_common::{Error, ValidationIssue};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Malformed request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// mantrify-common error, mapped by category
    #[error(transparent)]
    Common(#[from] Error),
}

impl ApiError {
    fn parts(self) -> (StatusCode, &'static str, String, Option<Vec<ValidationIssue>>) {
        match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, None),
            ApiError::Common(err) => {
                let code = err.code();
                match err {
                    Error::Validation { message, details } => {
                        (StatusCode::BAD_REQUEST, code, message, Some(details))
                    }
                    Error::NotFound(msg) => (StatusCode::NOT_FOUND, code, msg, None),
                    other => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        code,
                        other.to_string(),
                        None,
                    ),
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = self.parts();

        if status.is_server_error() {
            tracing::error!(code = error_code, "{}", message);
        }

        let mut error = json!({
            "code": error_code,
            "message": message,
        });
        if let Some(details) = details.filter(|d| !d.is_empty()) {
            error["details"] = json!(details);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
