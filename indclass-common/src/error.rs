//! Common error types for the industry classifier

use thiserror::Error;

/// Common result type for classifier operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the store, configuration and service layers
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested code not found (point lookups only)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Request was cancelled by the caller
    #[error("Operation cancelled")]
    Cancelled,

    /// Request deadline expired before the operation completed
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the error reports absence rather than an infrastructure failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// True for cancellation or deadline expiry
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::Cancelled | Error::DeadlineExceeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_distinguishable() {
        assert!(Error::NotFound("code 5812".to_string()).is_not_found());
        assert!(!Error::Internal("boom".to_string()).is_not_found());
        assert!(!Error::Io(std::io::Error::other("disk")).is_not_found());
    }

    #[test]
    fn test_interrupted_kinds() {
        assert!(Error::Cancelled.is_interrupted());
        assert!(Error::DeadlineExceeded.is_interrupted());
        assert!(!Error::Config("bad".to_string()).is_interrupted());
    }
}
