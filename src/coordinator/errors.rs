//! # Coordinator Errors
//!
//! The four failure classes a reviewer can observe, plus an empty queue.

use thiserror::Error;

use crate::auth::AuthError;
use crate::lease::{ConflictReason, LeaseError};
use crate::review::ValidationError;
use crate::store::StoreError;

/// Result type for coordinator operations
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

/// Outcome classes surfaced to the presentation layer
#[derive(Debug, Clone, Error)]
pub enum CoordinatorError {
    /// Lease absent, foreign or stale. Fetch a new record; never retry
    /// with the same version.
    #[error("Lease conflict: {}", .0.description())]
    Conflict(ConflictReason),

    /// Submission rejected before any write
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Session no longer valid; log in again
    #[error("Session expired: {0}")]
    AuthExpired(String),

    /// Durable store failure; safe to retry with the same version
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Nothing left to review
    #[error("No pending records available")]
    Empty,

    /// Server-side misconfiguration; not the caller's fault
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoordinatorError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            CoordinatorError::Conflict(_) => 409,
            CoordinatorError::Validation(e) => e.status_code(),
            CoordinatorError::AuthExpired(_) => 401,
            CoordinatorError::Store(StoreError::DuplicateRecord(_)) => 409,
            CoordinatorError::Store(_) => 503,
            CoordinatorError::Empty => 404,
            CoordinatorError::Internal(_) => 500,
        }
    }

    /// Failure class name
    pub fn kind(&self) -> &'static str {
        match self {
            CoordinatorError::Conflict(_) => "conflict",
            CoordinatorError::Validation(_) => "validation",
            CoordinatorError::AuthExpired(_) => "auth_expired",
            CoordinatorError::Store(_) => "store_failure",
            CoordinatorError::Empty => "empty",
            CoordinatorError::Internal(_) => "internal",
        }
    }

    /// Machine-readable detail code
    pub fn code(&self) -> &'static str {
        match self {
            CoordinatorError::Conflict(reason) => reason.code(),
            CoordinatorError::Validation(e) => e.code(),
            CoordinatorError::AuthExpired(_) => "auth_expired",
            CoordinatorError::Store(_) => "store_unavailable",
            CoordinatorError::Empty => "queue_empty",
            CoordinatorError::Internal(_) => "internal_error",
        }
    }

    /// Form field a validation error belongs to
    pub fn field(&self) -> Option<&'static str> {
        match self {
            CoordinatorError::Validation(e) => Some(e.field()),
            _ => None,
        }
    }

    /// Whether repeating the same request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            CoordinatorError::Store(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Whether the caller's custody of the record is gone for good
    pub fn is_session_lost(&self) -> bool {
        matches!(
            self,
            CoordinatorError::Conflict(_) | CoordinatorError::AuthExpired(_)
        )
    }
}

impl From<LeaseError> for CoordinatorError {
    fn from(err: LeaseError) -> Self {
        match err {
            LeaseError::Conflict(reason) => CoordinatorError::Conflict(reason),
            LeaseError::Store(e) => CoordinatorError::Store(e),
            LeaseError::DeadlineOutOfRange => CoordinatorError::Internal(err.to_string()),
        }
    }
}

impl From<AuthError> for CoordinatorError {
    fn from(err: AuthError) -> Self {
        CoordinatorError::AuthExpired(err.to_string())
    }
}
