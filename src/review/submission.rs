//! Reviewer submissions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::ReviewStatus;
use crate::RecordId;

/// The reviewer's proposed outcome for a record.
///
/// Created per request and never persisted on its own; it only survives
/// as part of the resulting result and audit entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewSubmission {
    pub record_id: RecordId,
    pub status: ReviewStatus,

    #[serde(default)]
    pub reviewer_note: String,

    /// Free-form note visible only to the review team
    #[serde(default)]
    pub internal_note: String,

    #[serde(default)]
    pub ko_reason: String,

    /// Record touches several topics
    #[serde(default)]
    pub multitematica: bool,

    /// Client-reported dwell time, advisory only
    #[serde(default)]
    pub elapsed_seconds: Option<u64>,

    pub submitted_by: String,
    pub submitted_at: DateTime<Utc>,
}

impl ReviewSubmission {
    pub fn new(
        record_id: impl Into<RecordId>,
        status: ReviewStatus,
        submitted_by: impl Into<String>,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            record_id: record_id.into(),
            status,
            reviewer_note: String::new(),
            internal_note: String::new(),
            ko_reason: String::new(),
            multitematica: false,
            elapsed_seconds: None,
            submitted_by: submitted_by.into(),
            submitted_at,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.reviewer_note = note.into();
        self
    }

    pub fn with_internal_note(mut self, note: impl Into<String>) -> Self {
        self.internal_note = note.into();
        self
    }

    pub fn with_ko_reason(mut self, reason: impl Into<String>) -> Self {
        self.ko_reason = reason.into();
        self
    }

    pub fn with_multitematica(mut self, multitematica: bool) -> Self {
        self.multitematica = multitematica;
        self
    }

    pub fn with_elapsed_seconds(mut self, secs: u64) -> Self {
        self.elapsed_seconds = Some(secs);
        self
    }
}
