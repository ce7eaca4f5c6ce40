//! Error types for the classifier service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::aggregation::AggregationError;

/// Classification failure
///
/// Never carries partial results.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// Request validation failed; not retryable
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Deadline expired before every strategy ran
    #[error("Deadline exceeded after {completed_strategies} strategies")]
    DeadlineExceeded { completed_strategies: usize },

    #[error("Classification cancelled")]
    Cancelled,

    #[error("Store error: {0}")]
    Store(#[from] indclass_common::Error),
}

impl ClassifyError {
    /// Map a context error after `completed` strategies ran
    pub fn interrupted(err: indclass_common::Error, completed: usize) -> Self {
        match err {
            indclass_common::Error::DeadlineExceeded => Self::DeadlineExceeded {
                completed_strategies: completed,
            },
            indclass_common::Error::Cancelled => Self::Cancelled,
            other => Self::Store(other),
        }
    }

    /// Map an aggregation failure after `completed` strategies ran
    pub fn from_aggregation(err: AggregationError, completed: usize) -> Self {
        match err {
            AggregationError::InvalidRequest(msg) => Self::InvalidRequest(msg),
            AggregationError::Cancelled => Self::Cancelled,
            AggregationError::DeadlineExceeded => Self::DeadlineExceeded {
                completed_strategies: completed,
            },
        }
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Request deadline expired (504)
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// indclass-common error
    #[error("Common error: {0}")]
    Common(#[from] indclass_common::Error),
}

impl From<ClassifyError> for ApiError {
    fn from(err: ClassifyError) -> Self {
        match err {
            ClassifyError::InvalidRequest(msg) => ApiError::BadRequest(msg),
            ClassifyError::DeadlineExceeded { .. } => ApiError::DeadlineExceeded(err.to_string()),
            ClassifyError::Cancelled => ApiError::Internal(err.to_string()),
            ClassifyError::Store(e) => ApiError::Common(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::DeadlineExceeded(msg) => {
                (StatusCode::GATEWAY_TIMEOUT, "DEADLINE_EXCEEDED", msg)
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Common(ref err) => match err {
                indclass_common::Error::NotFound(_) => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string())
                }
                indclass_common::Error::InvalidInput(_) => {
                    (StatusCode::BAD_REQUEST, "BAD_REQUEST", err.to_string())
                }
                indclass_common::Error::DeadlineExceeded => {
                    (StatusCode::GATEWAY_TIMEOUT, "DEADLINE_EXCEEDED", err.to_string())
                }
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "COMMON_ERROR",
                    err.to_string(),
                ),
            },
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
