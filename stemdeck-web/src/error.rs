//! Error types for stemdeck-web
//!
//! Every handler returns [`ApiResult`]. Error kinds travel unchanged through
//! the orchestration code and become a status code plus a JSON body only in
//! [`IntoResponse`]. Bodies are `{"error": ...}` with an optional `details`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::{SeparationError, TranscodeError};

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Invalid request with extra detail (400)
    #[error("{error}: {details}")]
    BadRequestDetails { error: String, details: String },

    /// Resource not found (404)
    #[error("{0}")]
    NotFound(String),

    /// Upload exceeded the body limit (413)
    #[error("{0}")]
    PayloadTooLarge(String),

    /// External tool failed; diagnostic passed through (500)
    #[error("{error}")]
    ToolFailed {
        error: String,
        details: Option<String>,
    },

    /// External tool exceeded its time limit (500)
    #[error("{0}")]
    Timeout(String),

    /// Separation finished without producing any stem (500)
    #[error("No output files created")]
    NoStems {
        command: String,
        output_folder: String,
        content: Vec<String>,
    },

    /// Internal server error (500)
    #[error("{0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::BadRequestDetails { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::ToolFailed { .. }
            | ApiError::Timeout(_)
            | ApiError::NoStems { .. }
            | ApiError::Internal(_)
            | ApiError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(status = %status, error = %self, "Request rejected");
        }

        let body = match self {
            ApiError::BadRequestDetails { error, details } => json!({
                "error": error,
                "details": details,
            }),
            ApiError::ToolFailed {
                error,
                details: Some(details),
            } => json!({
                "error": error,
                "details": details,
            }),
            ApiError::NoStems {
                command,
                output_folder,
                content,
            } => json!({
                "error": "No output files created",
                "command": command,
                "output_folder": output_folder,
                "content": content,
            }),
            other => json!({ "error": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<SeparationError> for ApiError {
    fn from(err: SeparationError) -> Self {
        match err {
            SeparationError::TimedOut(limit) => {
                let secs = limit.as_secs();
                let human = if secs >= 60 && secs % 60 == 0 {
                    plural(secs / 60, "minute")
                } else {
                    plural(secs, "second")
                };
                ApiError::Timeout(format!("Processing timed out ({})", human))
            }
            failed @ SeparationError::Failed { .. } => ApiError::ToolFailed {
                error: failed.to_string(),
                details: None,
            },
            other => ApiError::ToolFailed {
                error: format!("Processing failed: {}", other),
                details: None,
            },
        }
    }
}

fn plural(count: u64, unit: &str) -> String {
    if count == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", count, unit)
    }
}

/// Media preparation failure during `/process`
pub fn video_processing_failed(err: TranscodeError) -> ApiError {
    ApiError::ToolFailed {
        error: format!("Video processing failed: {}", err.diagnostic()),
        details: None,
    }
}

/// Mux failure during `/export`
pub fn export_failed(err: TranscodeError) -> ApiError {
    ApiError::ToolFailed {
        error: "Video export failed".to_string(),
        details: Some(err.first_line()),
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
