//! # Validation Errors
//!
//! Field-level rejections of a review submission.

use thiserror::Error;

use super::status::ReviewStatus;

/// Result type for review validation
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Reasons a submission is rejected before touching storage
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// `Pending` is never a valid save target
    #[error("Select a final status to continue")]
    PendingNotAllowed,

    /// Status string did not match any known value
    #[error("Unknown review status: {0}")]
    UnknownStatus(String),

    /// A reviewer note is mandatory for this status
    #[error("A review comment is required for status {0}")]
    MissingNote(ReviewStatus),

    /// A sub-reason is mandatory for this status
    #[error("A KO detail reason is required for status {0}")]
    MissingKoReason(ReviewStatus),

    /// The record already left the pending queue
    #[error("Record is already {0}; only pending records accept a decision")]
    AlreadyTerminal(ReviewStatus),

    /// The submission names a different record than the request
    #[error("Submission is for record {0}, not the one being saved")]
    RecordMismatch(String),
}

impl ValidationError {
    /// Form field the error should be attached to
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::PendingNotAllowed => "status",
            ValidationError::UnknownStatus(_) => "status",
            ValidationError::MissingNote(_) => "reviewer_note",
            ValidationError::MissingKoReason(_) => "ko_reason",
            ValidationError::AlreadyTerminal(_) => "status",
            ValidationError::RecordMismatch(_) => "record_id",
        }
    }

    /// Machine-readable code, also used as the audit detail
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::PendingNotAllowed => "blocked:pending",
            ValidationError::UnknownStatus(_) => "blocked:unknown_status",
            ValidationError::MissingNote(_) => "blocked:missing_comment",
            ValidationError::MissingKoReason(_) => "blocked:missing_ko_reason",
            ValidationError::AlreadyTerminal(_) => "blocked:already_terminal",
            ValidationError::RecordMismatch(_) => "blocked:record_mismatch",
        }
    }

    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        422
    }
}
