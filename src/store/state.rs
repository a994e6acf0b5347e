//! Store state and the conditional-write rules shared by every backend

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::errors::{StoreError, StoreResult};
use super::{
    CasOutcome, CommitOutcome, DecisionCommit, DiscardCommit, DiscardEntry, PendingDocument,
    ResultEntry,
};
use crate::audit::AuditLogEntry;
use crate::lease::Lease;
use crate::record::{RecordId, ReviewRecord};

/// Whole-store state. Backends wrap this in a lock and apply each
/// operation inside one critical section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct StoreState {
    #[serde(default)]
    pub pending: BTreeMap<RecordId, PendingDocument>,
    #[serde(default)]
    pub results: Vec<ResultEntry>,
    #[serde(default)]
    pub discards: Vec<DiscardEntry>,
    #[serde(default)]
    pub audit_log: Vec<AuditLogEntry>,
}

impl StoreState {
    pub fn insert_pending(&mut self, record: ReviewRecord) -> StoreResult<()> {
        if self.pending.contains_key(&record.id) {
            return Err(StoreError::DuplicateRecord(record.id.to_string()));
        }
        self.pending
            .insert(record.id.clone(), PendingDocument::new(record));
        Ok(())
    }

    pub fn compare_and_set_lease(
        &mut self,
        id: &RecordId,
        expected_version: u64,
        lease: Option<Lease>,
    ) -> CasOutcome {
        let Some(doc) = self.pending.get_mut(id) else {
            return CasOutcome::RecordMissing;
        };

        if doc.lease_version != expected_version {
            return CasOutcome::VersionMismatch {
                current_version: doc.lease_version,
                current: doc.lease.clone(),
            };
        }

        if let Some(ref new_lease) = lease {
            doc.lease_version = new_lease.version;
        }
        doc.lease = lease;
        CasOutcome::Applied
    }

    pub fn find_result(&self, id: &RecordId, lease_version: u64) -> Option<&ResultEntry> {
        self.results
            .iter()
            .find(|r| &r.record_id == id && r.lease_version == lease_version)
    }

    pub fn find_discard(&self, id: &RecordId, lease_version: u64) -> Option<&DiscardEntry> {
        self.discards
            .iter()
            .find(|d| &d.record_id == id && d.lease_version == lease_version)
    }

    /// Check that `owner` holds the lease on `id` at `lease_version`
    fn check_holder(&self, id: &RecordId, owner: &str, lease_version: u64) -> Option<CommitOutcome> {
        let Some(doc) = self.pending.get(id) else {
            return Some(CommitOutcome::RecordGone);
        };
        match doc.lease {
            Some(ref lease) if lease.owner == owner && lease.version == lease_version => None,
            _ => Some(CommitOutcome::LeaseMismatch {
                current_version: doc.lease_version,
            }),
        }
    }

    pub fn commit_decision(&mut self, commit: DecisionCommit) -> CommitOutcome {
        let id = commit.result.record_id.clone();

        if self.find_result(&id, commit.lease_version).is_some() {
            return CommitOutcome::AlreadyApplied;
        }
        if let Some(blocked) = self.check_holder(&id, &commit.owner, commit.lease_version) {
            return blocked;
        }

        self.pending.remove(&id);
        self.results.push(commit.result);
        self.audit_log.push(commit.audit);
        CommitOutcome::Applied
    }

    pub fn commit_discard(&mut self, commit: DiscardCommit) -> CommitOutcome {
        let id = commit.discard.record_id.clone();

        if self.find_discard(&id, commit.lease_version).is_some() {
            return CommitOutcome::AlreadyApplied;
        }
        if let Some(blocked) = self.check_holder(&id, &commit.owner, commit.lease_version) {
            return blocked;
        }

        self.pending.remove(&id);
        self.discards.push(commit.discard);
        self.audit_log.push(commit.audit);
        CommitOutcome::Applied
    }
}
