//! # Review Store
//!
//! The durable collaborator behind the coordinator. Logical layout:
//!
//! - `pending`: one document per record id, with the lease co-located
//!   in the same document so acquire/renew/release are a single
//!   conditional update
//! - `results`: decisions, keyed by record id + lease version
//! - `discards`: skipped records
//! - `audit_log`: append-only action trail
//!
//! ## Invariants
//! - Every lease mutation is a compare-and-set on the document's lease
//!   version counter; exactly one of two racing writers wins.
//! - A decision commit writes the result, the audit entry, and removes
//!   the pending document in one step, or does nothing at all.
//! - Commits are idempotent on `(record_id, lease_version)`.

pub mod errors;
mod file;
mod memory;
mod state;

pub use errors::{StoreError, StoreResult};
pub use file::{FileReviewStore, JOURNAL_FILE_NAME, STORE_FILE_NAME};
pub use memory::{FaultPoint, MemoryReviewStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::AuditLogEntry;
use crate::lease::Lease;
use crate::record::{RecordId, ReviewRecord};
use crate::review::ReviewStatus;

/// A pending record together with its lease sub-record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingDocument {
    pub record: ReviewRecord,

    /// Current lease, possibly soft-expired
    #[serde(default)]
    pub lease: Option<Lease>,

    /// Highest lease version ever issued for this record.
    ///
    /// Survives release so versions never repeat.
    #[serde(default)]
    pub lease_version: u64,
}

impl PendingDocument {
    pub fn new(record: ReviewRecord) -> Self {
        Self {
            record,
            lease: None,
            lease_version: 0,
        }
    }
}

/// Outcome of a conditional lease update
#[derive(Debug, Clone, PartialEq)]
pub enum CasOutcome {
    /// The update was applied
    Applied,

    /// Someone else changed the lease first
    VersionMismatch {
        current_version: u64,
        current: Option<Lease>,
    },

    /// The record is no longer pending
    RecordMissing,
}

/// One field change in a result's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub from: serde_json::Value,
    pub to: serde_json::Value,
}

/// History entry attached to a result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub user: String,
    pub action: String,
    pub changes: Vec<FieldChange>,
}

/// A persisted review decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub id: Uuid,
    pub record_id: RecordId,
    pub lease_version: u64,
    pub user: String,
    pub status: ReviewStatus,
    pub reviewer_note: String,
    pub internal_note: String,
    pub ko_reason: String,
    pub multitematica: bool,
    #[serde(default)]
    pub elapsed_seconds: Option<u64>,
    pub timestamp: DateTime<Utc>,
    pub record: ReviewRecord,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// A discarded (skipped) record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscardEntry {
    pub id: Uuid,
    pub record_id: RecordId,
    pub lease_version: u64,
    pub user: String,
    pub discarded_at: DateTime<Utc>,
    pub record: ReviewRecord,
}

/// Atomic decision write
#[derive(Debug, Clone)]
pub struct DecisionCommit {
    pub owner: String,
    pub lease_version: u64,
    pub result: ResultEntry,
    pub audit: AuditLogEntry,
}

/// Atomic discard write
#[derive(Debug, Clone)]
pub struct DiscardCommit {
    pub owner: String,
    pub lease_version: u64,
    pub discard: DiscardEntry,
    pub audit: AuditLogEntry,
}

/// Outcome of a decision or discard commit
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// Result/discard written, audit appended, record removed, lease released
    Applied,

    /// An earlier attempt with the same record id and lease version
    /// already committed; nothing was written
    AlreadyApplied,

    /// The lease is no longer held by the committer at that version
    LeaseMismatch { current_version: u64 },

    /// The record is no longer pending
    RecordGone,
}

/// Durable store for pending records, leases, results and audit entries
pub trait ReviewStore: Send + Sync {
    /// Add a record to the pending pool (ingestion)
    fn insert_pending(&self, record: ReviewRecord) -> StoreResult<()>;

    /// All pending documents, in id order
    fn list_pending(&self) -> StoreResult<Vec<PendingDocument>>;

    /// One pending document
    fn get_pending(&self, id: &RecordId) -> StoreResult<Option<PendingDocument>>;

    /// Replace the lease if the document's version counter equals
    /// `expected_version`.
    ///
    /// Passing `Some(lease)` stores it and sets the counter to
    /// `lease.version`; passing `None` clears the lease and keeps the
    /// counter.
    fn compare_and_set_lease(
        &self,
        id: &RecordId,
        expected_version: u64,
        lease: Option<Lease>,
    ) -> StoreResult<CasOutcome>;

    /// Atomically persist a decision
    fn commit_decision(&self, commit: DecisionCommit) -> StoreResult<CommitOutcome>;

    /// Atomically persist a discard
    fn commit_discard(&self, commit: DiscardCommit) -> StoreResult<CommitOutcome>;

    /// Result previously committed under this record id and lease version
    fn find_result(&self, id: &RecordId, lease_version: u64) -> StoreResult<Option<ResultEntry>>;

    /// Discard previously committed under this record id and lease version
    fn find_discard(&self, id: &RecordId, lease_version: u64)
        -> StoreResult<Option<DiscardEntry>>;

    /// Append one audit entry
    fn append_audit(&self, entry: AuditLogEntry) -> StoreResult<()>;

    fn results(&self) -> StoreResult<Vec<ResultEntry>>;

    fn discards(&self) -> StoreResult<Vec<DiscardEntry>>;

    fn audit_log(&self) -> StoreResult<Vec<AuditLogEntry>>;
}

impl<S: ReviewStore + ?Sized> ReviewStore for std::sync::Arc<S> {
    fn insert_pending(&self, record: ReviewRecord) -> StoreResult<()> {
        (**self).insert_pending(record)
    }

    fn list_pending(&self) -> StoreResult<Vec<PendingDocument>> {
        (**self).list_pending()
    }

    fn get_pending(&self, id: &RecordId) -> StoreResult<Option<PendingDocument>> {
        (**self).get_pending(id)
    }

    fn compare_and_set_lease(
        &self,
        id: &RecordId,
        expected_version: u64,
        lease: Option<Lease>,
    ) -> StoreResult<CasOutcome> {
        (**self).compare_and_set_lease(id, expected_version, lease)
    }

    fn commit_decision(&self, commit: DecisionCommit) -> StoreResult<CommitOutcome> {
        (**self).commit_decision(commit)
    }

    fn commit_discard(&self, commit: DiscardCommit) -> StoreResult<CommitOutcome> {
        (**self).commit_discard(commit)
    }

    fn find_result(&self, id: &RecordId, lease_version: u64) -> StoreResult<Option<ResultEntry>> {
        (**self).find_result(id, lease_version)
    }

    fn find_discard(
        &self,
        id: &RecordId,
        lease_version: u64,
    ) -> StoreResult<Option<DiscardEntry>> {
        (**self).find_discard(id, lease_version)
    }

    fn append_audit(&self, entry: AuditLogEntry) -> StoreResult<()> {
        (**self).append_audit(entry)
    }

    fn results(&self) -> StoreResult<Vec<ResultEntry>> {
        (**self).results()
    }

    fn discards(&self) -> StoreResult<Vec<DiscardEntry>> {
        (**self).discards()
    }

    fn audit_log(&self) -> StoreResult<Vec<AuditLogEntry>> {
        (**self).audit_log()
    }
}
