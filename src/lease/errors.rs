//! # Lease Errors

use thiserror::Error;

use crate::store::StoreError;

/// Result type for lease operations
pub type LeaseResult<T> = Result<T, LeaseError>;

/// Why the caller does not (or no longer) hold custody
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    /// Another reviewer holds an unexpired lease
    HeldByOther,

    /// The presented version was superseded (reclaimed or renewed elsewhere)
    StaleVersion,

    /// The lease belongs to someone else, or the identity is empty
    NotOwner,

    /// No lease exists on the record
    NoLease,

    /// The lease passed its deadline
    Expired,

    /// The record left the pending pool
    RecordGone,
}

impl ConflictReason {
    /// Machine-readable code, also used as the audit detail
    pub fn code(&self) -> &'static str {
        match self {
            ConflictReason::HeldByOther => "held_by_other",
            ConflictReason::StaleVersion => "stale_version",
            ConflictReason::NotOwner => "not_owner",
            ConflictReason::NoLease => "no_lease",
            ConflictReason::Expired => "expired",
            ConflictReason::RecordGone => "record_gone",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ConflictReason::HeldByOther => "record is being reviewed by another user",
            ConflictReason::StaleVersion => "lease was reclaimed or renewed elsewhere",
            ConflictReason::NotOwner => "lease belongs to another user",
            ConflictReason::NoLease => "record is not locked",
            ConflictReason::Expired => "lease expired",
            ConflictReason::RecordGone => "record was already processed",
        }
    }
}

/// Lease manager errors
#[derive(Debug, Clone, Error)]
pub enum LeaseError {
    /// Custody is absent, foreign, or stale
    #[error("Lease conflict: {}", .0.description())]
    Conflict(ConflictReason),

    /// The store could not be reached
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The lease deadline does not fit in a timestamp
    #[error("Lease deadline out of range")]
    DeadlineOutOfRange,
}

impl LeaseError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            LeaseError::Conflict(_) => 409,
            LeaseError::Store(e) => e.status_code(),
            LeaseError::DeadlineOutOfRange => 500,
        }
    }

    pub fn conflict_reason(&self) -> Option<ConflictReason> {
        match self {
            LeaseError::Conflict(reason) => Some(*reason),
            LeaseError::Store(_) | LeaseError::DeadlineOutOfRange => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(LeaseError::Conflict(ConflictReason::StaleVersion).status_code(), 409);
        assert_eq!(
            LeaseError::Store(StoreError::Unavailable("down".into())).status_code(),
            503
        );
    }

    #[test]
    fn test_conflict_message() {
        let err = LeaseError::Conflict(ConflictReason::HeldByOther);
        assert!(err.to_string().contains("another user"));
        assert_eq!(err.conflict_reason(), Some(ConflictReason::HeldByOther));
    }
}
