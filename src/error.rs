//! # Error Handling
//!
//! Application-level error type and its mapping to HTTP responses.
//!
//! ## Layers:
//! - **ConvertError** (in `audio::error`): What the transcoding pipeline reports
//! - **AppError** (here): What the HTTP surface reports, with a status code
//!
//! ## Key Rust Concepts for Error Handling:
//! - **From trait**: Lets `?` turn a pipeline, JSON or config error into an
//!   `AppError` without explicit mapping at every call site
//! - **ResponseError trait**: Tells actix-web how to render the error
//! - **Display trait**: Defines how errors are formatted as strings

use crate::audio::ConvertError;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Custom error types for the application.
///
/// ## Error Categories:
/// - **Internal**: Server-side problems (500)
/// - **BadRequest**: Client sent invalid data, or the upload could not be read (400)
/// - **NotFound**: Requested resource doesn't exist (404)
/// - **ConfigError**: Configuration problems (500)
/// - **ValidationError**: Data validation failed (400)
/// - **Unprocessable**: Well-formed request whose audio could not be decoded (422)
///
/// ## Usage Example:
/// ```rust
/// # use audio_transcoder::error::AppError;
/// let err = AppError::BadRequest("No audio file provided".to_string());
/// assert_eq!(err.to_string(), "Bad request: No audio file provided");
/// ```
#[derive(Debug)]
pub enum AppError {
    Internal(String),
    BadRequest(String),
    NotFound(String),
    ConfigError(String),
    ValidationError(String),
    Unprocessable(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::Unprocessable(msg) => write!(f, "Unprocessable audio: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// Machine-readable error type and HTTP status for this error.
    fn kind(&self) -> (actix_web::http::StatusCode, &'static str, &str) {
        use actix_web::http::StatusCode;

        match self {
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg.as_str()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.as_str()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.as_str()),
            AppError::ConfigError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error", msg.as_str()),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg.as_str()),
            AppError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "decode_error", msg.as_str()),
        }
    }
}

/// Converts errors into JSON HTTP responses.
///
/// ## JSON Response Format:
/// ```json
/// {
///   "error": {
///     "type": "decode_error",
///     "message": "Audio decoding failed: no supported audio track found",
///     "timestamp": "2025-01-01T12:00:00Z"
///   }
/// }
/// ```
impl ResponseError for AppError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        self.kind().0
    }

    fn error_response(&self) -> HttpResponse {
        let (status, error_type, message) = self.kind();

        HttpResponse::build(status).json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

/// Pipeline failures keep their full message; only the status differs.
///
/// ## Mapping:
/// - Decode / InvalidWav → 422: the upload arrived, but is not usable audio
/// - Read → 400: the upload itself was broken
/// - InvalidSampleRate → 400: the caller asked for something impossible
impl From<ConvertError> for AppError {
    fn from(err: ConvertError) -> Self {
        match err {
            ConvertError::Decode(_) | ConvertError::InvalidWav(_) => {
                AppError::Unprocessable(err.to_string())
            }
            ConvertError::Read(_) => AppError::BadRequest(err.to_string()),
            ConvertError::InvalidSampleRate(_) => AppError::ValidationError(err.to_string()),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// JSON parsing errors are almost always the client's fault, so they become 400s.
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

/// Shorthand for `Result<T, AppError>`.
pub type AppResult<T> = Result<T, AppError>;
