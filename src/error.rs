//! Error types for media-dl
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types (job lookups and state transitions)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use crate::types::{JobId, JobStatus};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for media-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "credential_order")
        key: Option<String>,
    },

    /// Job lookup or state transition error
    #[error("job error: {0}")]
    Job(#[from] JobError),

    /// The submitted source locator is not a fetchable URL
    #[error("invalid source: {0}")]
    InvalidSource(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// External tool execution failed (spawn error, unusable output)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Operation not supported (missing binary, etc.)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// A time-bounded operation did not finish in time
    #[error("timed out: {0}")]
    Timeout(String),

    /// Shutdown in progress - not accepting new jobs
    #[error("shutdown in progress: not accepting new jobs")]
    ShuttingDown,

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),
}

/// Job-related errors
#[derive(Debug, Error)]
pub enum JobError {
    /// Job is unknown or has already been evicted
    #[error("job {id} not found")]
    NotFound {
        /// The job ID that was not found
        id: JobId,
    },

    /// A status change that would break the job lifecycle
    #[error("job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// The job ID
        id: JobId,
        /// Current status
        from: JobStatus,
        /// Rejected target status
        to: JobStatus,
    },
}

impl Error {
    /// Shorthand for a not-found job error
    pub fn job_not_found(id: JobId) -> Self {
        Error::Job(JobError::NotFound { id })
    }

    /// Whether this error means the job id does not resolve
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Job(JobError::NotFound { .. }))
    }
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "job_not_found",
///     "message": "job error: job 6f1c... not found",
///     "details": { "job_id": "6f1c..." }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "job_not_found", "validation_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::Config { .. } => 400,
            Error::InvalidSource(_) => 400,

            // 404 Not Found
            Error::Job(JobError::NotFound { .. }) => 404,

            // 409 Conflict
            Error::Job(JobError::InvalidTransition { .. }) => 409,

            // 500 Internal Server Error
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,

            // 502 Bad Gateway - the external tool misbehaved
            Error::ExternalTool(_) => 502,

            // 501 Not Implemented
            Error::NotSupported(_) => 501,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,

            // 504 Gateway Timeout
            Error::Timeout(_) => 504,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Job(e) => match e {
                JobError::NotFound { .. } => "job_not_found",
                JobError::InvalidTransition { .. } => "invalid_transition",
            },
            Error::InvalidSource(_) => "invalid_source",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ExternalTool(_) => "external_tool_error",
            Error::NotSupported(_) => "not_supported",
            Error::Timeout(_) => "timeout",
            Error::ShuttingDown => "shutting_down",
            Error::ApiServerError(_) => "api_server_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Job(JobError::NotFound { id }) => Some(serde_json::json!({
                "job_id": id,
            })),
            Error::Job(JobError::InvalidTransition { id, from, to }) => Some(serde_json::json!({
                "job_id": id,
                "from": from,
                "to": to,
            })),
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    /// Returns (Error, expected_status_code, expected_error_code) for every match arm
    fn all_error_variants() -> Vec<(Error, u16, &'static str)> {
        let id = JobId::new();
        vec![
            (
                Error::Config {
                    message: "empty".into(),
                    key: Some("credential_order".into()),
                },
                400,
                "config_error",
            ),
            (Error::InvalidSource("ftp://x".into()), 400, "invalid_source"),
            (Error::job_not_found(id), 404, "job_not_found"),
            (
                Error::Job(JobError::InvalidTransition {
                    id,
                    from: JobStatus::Failed,
                    to: JobStatus::Running,
                }),
                409,
                "invalid_transition",
            ),
            (
                Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone")),
                500,
                "io_error",
            ),
            (Error::ApiServerError("bind".into()), 500, "api_server_error"),
            (Error::ExternalTool("bad json".into()), 502, "external_tool_error"),
            (Error::NotSupported("yt-dlp missing".into()), 501, "not_supported"),
            (Error::ShuttingDown, 503, "shutting_down"),
            (Error::Timeout("info probe".into()), 504, "timeout"),
        ]
    }

    #[test]
    fn test_status_and_error_codes() {
        for (error, status, code) in all_error_variants() {
            assert_eq!(error.status_code(), status, "status for {error:?}");
            assert_eq!(error.error_code(), code, "code for {error:?}");
        }
    }

    #[test]
    fn test_not_found_is_distinct_from_failed() {
        let id = JobId::new();
        assert!(Error::job_not_found(id).is_not_found());
        assert!(
            !Error::Job(JobError::InvalidTransition {
                id,
                from: JobStatus::Failed,
                to: JobStatus::Running,
            })
            .is_not_found()
        );
    }

    #[test]
    fn test_api_error_carries_job_id() {
        let id = JobId::new();
        let api: ApiError = Error::job_not_found(id).into();
        assert_eq!(api.error.code, "job_not_found");
        let details = api.error.details.unwrap();
        assert_eq!(details["job_id"], id.to_string());
    }

    #[test]
    fn test_serialization_error_has_no_details() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        let api: ApiError = err.into();
        assert_eq!(api.error.code, "serialization_error");
        assert!(api.error.details.is_none());
    }
}
