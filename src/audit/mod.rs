//! # Audit Log
//!
//! Append-only trail of every reviewer action against a record:
//! lock acquisition, heartbeats, saves, skips, expiries and the
//! conflicts that blocked them.
//!
//! Entries are written through [`crate::store::ReviewStore`] so that a
//! decision and its audit entry land in the same atomic commit. Nothing
//! in the crate mutates or deletes an entry once appended.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::RecordId;

/// Audit action type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    /// A lease was requested for a record.
    LockAcquire,

    /// A lease renewal was requested.
    Heartbeat,

    /// A lease was released without a decision.
    Release,

    /// A review decision was submitted.
    Save,

    /// A record was discarded.
    Skip,

    /// A soft-expired lease was cleared.
    Expire,

    /// A lease conflict blocked an action.
    Conflict,

    /// Expired leases were swept from the pending pool.
    LockSweep,
}

impl AuditAction {
    /// Returns the action name string.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::LockAcquire => "LOCK_ACQUIRE",
            AuditAction::Heartbeat => "HEARTBEAT",
            AuditAction::Release => "RELEASE",
            AuditAction::Save => "SAVE",
            AuditAction::Skip => "SKIP",
            AuditAction::Expire => "EXPIRE",
            AuditAction::Conflict => "CONFLICT",
            AuditAction::LockSweep => "LOCK_SWEEP",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Audit record outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditOutcome {
    /// Action succeeded.
    Success,

    /// Action was rejected (conflict or validation).
    Rejected,

    /// Action failed because the store was unavailable.
    Failed,
}

impl AuditOutcome {
    /// Returns the outcome string.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOutcome::Success => "SUCCESS",
            AuditOutcome::Rejected => "REJECTED",
            AuditOutcome::Failed => "FAILED",
        }
    }
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Unique entry ID.
    pub id: Uuid,

    /// Record the action targeted. Empty for pool-wide actions such as sweeps.
    pub record_id: RecordId,

    /// Reviewer identity (or `system` for sweeps).
    pub actor: String,

    /// The action that occurred.
    pub action: AuditAction,

    /// Server time of the action.
    pub timestamp: DateTime<Utc>,

    /// Outcome of the action.
    pub outcome: AuditOutcome,

    /// Lease version the actor presented or obtained.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_version: Option<u64>,

    /// Machine-readable result, e.g. `ok` or `blocked:missing_comment`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Extra context (status, elapsed seconds, ko reason).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl AuditLogEntry {
    /// Create a new audit entry.
    pub fn new(
        record_id: impl Into<RecordId>,
        actor: impl Into<String>,
        action: AuditAction,
        outcome: AuditOutcome,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            record_id: record_id.into(),
            actor: actor.into(),
            action,
            timestamp,
            outcome,
            lease_version: None,
            detail: None,
            extra: Map::new(),
        }
    }

    /// Set the lease version.
    pub fn with_version(mut self, version: u64) -> Self {
        self.lease_version = Some(version);
        self
    }

    /// Set the detail string.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Attach an extra context field.
    pub fn with_extra(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }
}
