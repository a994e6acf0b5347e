//! In-memory review store

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use super::errors::{StoreError, StoreResult};
use super::state::StoreState;
use super::{
    CasOutcome, CommitOutcome, DecisionCommit, DiscardCommit, DiscardEntry, PendingDocument,
    ResultEntry, ReviewStore,
};
use crate::audit::AuditLogEntry;
use crate::lease::Lease;
use crate::record::{RecordId, ReviewRecord};

/// Where an injected commit fault strikes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    /// Fail before anything is written
    BeforeApply,

    /// Apply the commit, then report a timeout (lost acknowledgement)
    AfterApply,
}

/// In-memory store.
///
/// Every operation runs inside a single write-lock critical section,
/// which gives the same conditional-write guarantees as a real store.
/// Faults can be injected to exercise the failure paths.
#[derive(Debug, Default)]
pub struct MemoryReviewStore {
    state: RwLock<StoreState>,
    commit_faults: Mutex<VecDeque<FaultPoint>>,
    unavailable: AtomicBool,
}

impl MemoryReviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with pending records
    pub fn with_records(records: impl IntoIterator<Item = ReviewRecord>) -> StoreResult<Self> {
        let store = Self::new();
        for record in records {
            store.insert_pending(record)?;
        }
        Ok(store)
    }

    /// Queue a one-shot fault for the next decision or discard commit
    pub fn inject_commit_fault(&self, point: FaultPoint) {
        self.commit_faults
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(point);
    }

    /// Make every operation fail with `Unavailable` until cleared
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store offline".to_string()));
        }
        Ok(())
    }

    fn next_fault(&self) -> Option<FaultPoint> {
        self.commit_faults
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
    }

    fn with_commit_fault(
        &self,
        apply: impl FnOnce(&mut StoreState) -> CommitOutcome,
    ) -> StoreResult<CommitOutcome> {
        self.check_available()?;
        let fault = self.next_fault();
        if fault == Some(FaultPoint::BeforeApply) {
            return Err(StoreError::Unavailable("injected fault before commit".to_string()));
        }

        let outcome = {
            let mut state = self.state.write().map_err(|_| StoreError::poisoned())?;
            apply(&mut state)
        };

        if fault == Some(FaultPoint::AfterApply) {
            return Err(StoreError::Timeout("injected fault after commit".to_string()));
        }
        Ok(outcome)
    }
}

impl ReviewStore for MemoryReviewStore {
    fn insert_pending(&self, record: ReviewRecord) -> StoreResult<()> {
        self.check_available()?;
        let mut state = self.state.write().map_err(|_| StoreError::poisoned())?;
        state.insert_pending(record)
    }

    fn list_pending(&self) -> StoreResult<Vec<PendingDocument>> {
        self.check_available()?;
        let state = self.state.read().map_err(|_| StoreError::poisoned())?;
        Ok(state.pending.values().cloned().collect())
    }

    fn get_pending(&self, id: &RecordId) -> StoreResult<Option<PendingDocument>> {
        self.check_available()?;
        let state = self.state.read().map_err(|_| StoreError::poisoned())?;
        Ok(state.pending.get(id).cloned())
    }

    fn compare_and_set_lease(
        &self,
        id: &RecordId,
        expected_version: u64,
        lease: Option<Lease>,
    ) -> StoreResult<CasOutcome> {
        self.check_available()?;
        let mut state = self.state.write().map_err(|_| StoreError::poisoned())?;
        Ok(state.compare_and_set_lease(id, expected_version, lease))
    }

    fn commit_decision(&self, commit: DecisionCommit) -> StoreResult<CommitOutcome> {
        self.with_commit_fault(|state| state.commit_decision(commit))
    }

    fn commit_discard(&self, commit: DiscardCommit) -> StoreResult<CommitOutcome> {
        self.with_commit_fault(|state| state.commit_discard(commit))
    }

    fn find_result(&self, id: &RecordId, lease_version: u64) -> StoreResult<Option<ResultEntry>> {
        self.check_available()?;
        let state = self.state.read().map_err(|_| StoreError::poisoned())?;
        Ok(state.find_result(id, lease_version).cloned())
    }

    fn find_discard(
        &self,
        id: &RecordId,
        lease_version: u64,
    ) -> StoreResult<Option<DiscardEntry>> {
        self.check_available()?;
        let state = self.state.read().map_err(|_| StoreError::poisoned())?;
        Ok(state.find_discard(id, lease_version).cloned())
    }

    fn append_audit(&self, entry: AuditLogEntry) -> StoreResult<()> {
        self.check_available()?;
        let mut state = self.state.write().map_err(|_| StoreError::poisoned())?;
        state.audit_log.push(entry);
        Ok(())
    }

    fn results(&self) -> StoreResult<Vec<ResultEntry>> {
        self.check_available()?;
        let state = self.state.read().map_err(|_| StoreError::poisoned())?;
        Ok(state.results.clone())
    }

    fn discards(&self) -> StoreResult<Vec<DiscardEntry>> {
        self.check_available()?;
        let state = self.state.read().map_err(|_| StoreError::poisoned())?;
        Ok(state.discards.clone())
    }

    fn audit_log(&self) -> StoreResult<Vec<AuditLogEntry>> {
        self.check_available()?;
        let state = self.state.read().map_err(|_| StoreError::poisoned())?;
        Ok(state.audit_log.clone())
    }
}
