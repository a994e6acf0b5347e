//! # Store Errors
//!
//! Failures of the durable store. None of them is attributable to the
//! caller. A failed commit may still have landed, but commits are keyed
//! on lease version, so a retry with the same version is safe.

use std::io;

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable store failures
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Store is not reachable
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Store did not answer in time
    #[error("Store operation timed out: {0}")]
    Timeout(String),

    /// Persisted state could not be decoded
    #[error("Store state corrupted: {0}")]
    Corrupted(String),

    /// Underlying I/O failure
    #[error("Store I/O error: {0}")]
    Io(String),

    /// Duplicate ingestion of a record id
    #[error("Record already pending: {0}")]
    DuplicateRecord(String),
}

impl StoreError {
    pub(crate) fn poisoned() -> Self {
        StoreError::Unavailable("Lock poisoned".to_string())
    }

    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            StoreError::DuplicateRecord(_) => 409,
            StoreError::Unavailable(_) | StoreError::Timeout(_) => 503,
            StoreError::Corrupted(_) | StoreError::Io(_) => 500,
        }
    }

    /// Transient failures the caller may retry with the same version
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable(_) | StoreError::Timeout(_) | StoreError::Io(_)
        )
    }
}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Corrupted(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(StoreError::Unavailable("x".into()).status_code(), 503);
        assert_eq!(StoreError::Timeout("x".into()).status_code(), 503);
        assert_eq!(StoreError::Corrupted("x".into()).status_code(), 500);
    }

    #[test]
    fn test_retryable() {
        assert!(StoreError::Timeout("x".into()).is_retryable());
        assert!(!StoreError::Corrupted("x".into()).is_retryable());
        assert!(!StoreError::DuplicateRecord("R1".into()).is_retryable());
    }
}
