//! Request orchestration

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::errors::{CoordinatorError, CoordinatorResult};
use super::stats::{ResultFilter, Stats};
use crate::audit::{AuditAction, AuditLogEntry, AuditOutcome};
use crate::clock::{Clock, LeasePolicy};
use crate::lease::{ConflictReason, Lease, LeaseError, LeaseManager, ReleaseOutcome};
use crate::queue::QueueSelector;
use crate::record::{RecordId, ReviewRecord};
use crate::review::{validate_transition, ReviewStatus, ReviewSubmission, ValidationError};
use crate::store::{
    CommitOutcome, DecisionCommit, DiscardCommit, DiscardEntry, FieldChange, HistoryEntry,
    ResultEntry, ReviewStore, StoreError,
};

/// Upper bound on select/acquire rounds in one `acquire_next` call
pub const DEFAULT_MAX_ACQUIRE_ATTEMPTS: usize = 250;

/// Coordinator tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub max_acquire_attempts: usize,

    /// Fixed seed for queue selection; entropy when `None`
    pub selection_seed: Option<u64>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_acquire_attempts: DEFAULT_MAX_ACQUIRE_ATTEMPTS,
            selection_seed: None,
        }
    }
}

/// A record handed to a reviewer together with its lease
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub record: ReviewRecord,
    pub lease: Lease,
}

impl Assignment {
    pub fn expires_at_ms(&self) -> i64 {
        self.lease.expires_at_ms()
    }
}

/// Acknowledgement of a save
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveReceipt {
    pub record_id: RecordId,
    pub lease_version: u64,
    pub status: ReviewStatus,
    pub result_id: Uuid,

    /// The decision had already been committed by an earlier attempt
    pub replayed: bool,
}

/// Acknowledgement of a skip
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkipReceipt {
    pub record_id: RecordId,
    pub lease_version: u64,
    pub discard_id: Uuid,
    pub replayed: bool,
}

/// Serves reviewer requests against a shared store
pub struct WorkflowCoordinator<S: ReviewStore, C: Clock + Clone> {
    store: Arc<S>,
    clock: C,
    leases: LeaseManager<S, C>,
    selector: QueueSelector<S, C>,
    config: CoordinatorConfig,
}

impl<S: ReviewStore, C: Clock + Clone> WorkflowCoordinator<S, C> {
    pub fn new(store: Arc<S>, clock: C, policy: LeasePolicy, config: CoordinatorConfig) -> Self {
        let leases = LeaseManager::new(store.clone(), clock.clone(), policy);
        let selector = match config.selection_seed {
            Some(seed) => QueueSelector::seeded(store.clone(), clock.clone(), seed),
            None => QueueSelector::new(store.clone(), clock.clone()),
        };
        Self {
            store,
            clock,
            leases,
            selector,
            config,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn leases(&self) -> &LeaseManager<S, C> {
        &self.leases
    }

    pub fn policy(&self) -> &LeasePolicy {
        self.leases.policy()
    }

    /// Authoritative server time
    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    /// Hand `owner` a record to review.
    ///
    /// A record the owner already holds is resumed. Records lost to a
    /// concurrent acquirer are excluded and selection retried; when the
    /// pool looks exhausted, expired leases are swept once before giving
    /// up with [`CoordinatorError::Empty`].
    pub fn acquire_next(&self, owner: &str) -> CoordinatorResult<Assignment> {
        let owner = owner.trim();
        if owner.is_empty() {
            return Err(CoordinatorError::Conflict(ConflictReason::NotOwner));
        }

        let mut lost: Vec<RecordId> = Vec::new();
        let mut swept = false;

        for attempt in 0..self.config.max_acquire_attempts {
            let record = match self.selector.next_pending(Some(owner), &lost)? {
                Some(record) => record,
                None if !swept => {
                    swept = true;
                    let cleared = self.leases.sweep_expired()?;
                    debug!(owner, cleared, "queue exhausted, swept expired leases");
                    continue;
                }
                None => break,
            };

            match self.leases.acquire(&record.id, owner) {
                Ok(lease) => {
                    info!(
                        record_id = %record.id,
                        owner,
                        version = lease.version,
                        attempt,
                        "record assigned"
                    );
                    return Ok(Assignment { record, lease });
                }
                Err(LeaseError::Conflict(reason)) => {
                    debug!(record_id = %record.id, owner, reason = reason.code(), "lost acquire race");
                    lost.push(record.id);
                }
                Err(e) => return Err(e.into()),
            }
        }

        debug!(owner, lost = lost.len(), "no record available");
        Err(CoordinatorError::Empty)
    }

    /// Renew the caller's lease; returns the renewed lease
    pub fn heartbeat(
        &self,
        record_id: &RecordId,
        owner: &str,
        version: u64,
    ) -> CoordinatorResult<Lease> {
        self.leases
            .renew(record_id, owner, version)
            .map_err(|e| self.rejected(record_id, owner, version, AuditAction::Heartbeat, e))
    }

    /// Persist a review decision.
    ///
    /// Retrying after a store failure with the same version either
    /// commits or finds the earlier commit and reports it as replayed;
    /// a decision is never written twice.
    pub fn submit(
        &self,
        record_id: &RecordId,
        owner: &str,
        version: u64,
        submission: ReviewSubmission,
    ) -> CoordinatorResult<SaveReceipt> {
        let owner = owner.trim();
        if submission.record_id != *record_id {
            return Err(ValidationError::RecordMismatch(submission.record_id.to_string()).into());
        }

        if let Some(existing) = self.store.find_result(record_id, version)? {
            return self.replayed_save(existing, owner);
        }

        let lease = self
            .leases
            .validate(record_id, owner, version)
            .map_err(|e| self.rejected(record_id, owner, version, AuditAction::Save, e))?;

        let doc = self
            .store
            .get_pending(record_id)?
            .ok_or(CoordinatorError::Conflict(ConflictReason::RecordGone))?;

        if let Err(e) = validate_transition(doc.record.status, &submission) {
            debug!(
                record_id = %record_id,
                owner,
                status = %submission.status,
                reason = e.code(),
                "submission rejected"
            );
            return Err(e.into());
        }

        let now = self.clock.now();
        let result = build_result(doc.record, &submission, owner, lease.version, now);
        let result_id = result.id;
        let status = result.status;

        let mut audit =
            AuditLogEntry::new(record_id, owner, AuditAction::Save, AuditOutcome::Success, now)
                .with_version(lease.version)
                .with_detail("ok")
                .with_extra("status", status.as_str());
        if let Some(secs) = submission.elapsed_seconds {
            audit = audit.with_extra("elapsed_seconds", secs);
        }
        if !submission.ko_reason.trim().is_empty() {
            audit = audit.with_extra("ko_reason", submission.ko_reason.trim());
        }

        let commit = DecisionCommit {
            owner: owner.to_string(),
            lease_version: lease.version,
            result,
            audit,
        };

        match self.store.commit_decision(commit) {
            Ok(CommitOutcome::Applied) => {
                info!(record_id = %record_id, owner, version, status = %status, "decision saved");
                Ok(SaveReceipt {
                    record_id: record_id.clone(),
                    lease_version: version,
                    status,
                    result_id,
                    replayed: false,
                })
            }
            Ok(CommitOutcome::AlreadyApplied) => match self.store.find_result(record_id, version)? {
                Some(existing) => self.replayed_save(existing, owner),
                None => Err(CoordinatorError::Conflict(ConflictReason::RecordGone)),
            },
            Ok(CommitOutcome::LeaseMismatch { current_version }) => {
                debug!(record_id = %record_id, owner, version, current_version, "lease lost at commit");
                Err(self.rejected(
                    record_id,
                    owner,
                    version,
                    AuditAction::Save,
                    LeaseError::Conflict(ConflictReason::StaleVersion),
                ))
            }
            Ok(CommitOutcome::RecordGone) => {
                Err(CoordinatorError::Conflict(ConflictReason::RecordGone))
            }
            Err(e) => {
                warn!(record_id = %record_id, owner, version, error = %e, "decision commit failed");
                self.commit_failed(record_id, owner, version, AuditAction::Save, &e);
                Err(e.into())
            }
        }
    }

    /// Move the caller's record to the discard set
    pub fn skip(
        &self,
        record_id: &RecordId,
        owner: &str,
        version: u64,
    ) -> CoordinatorResult<SkipReceipt> {
        let owner = owner.trim();

        if let Some(existing) = self.store.find_discard(record_id, version)? {
            return replayed_skip(existing, owner);
        }

        let lease = self
            .leases
            .validate(record_id, owner, version)
            .map_err(|e| self.rejected(record_id, owner, version, AuditAction::Skip, e))?;

        let doc = self
            .store
            .get_pending(record_id)?
            .ok_or(CoordinatorError::Conflict(ConflictReason::RecordGone))?;

        let now = self.clock.now();
        let discard = DiscardEntry {
            id: Uuid::new_v4(),
            record_id: record_id.clone(),
            lease_version: lease.version,
            user: owner.to_string(),
            discarded_at: now,
            record: doc.record,
        };
        let discard_id = discard.id;
        let commit = DiscardCommit {
            owner: owner.to_string(),
            lease_version: lease.version,
            discard,
            audit: AuditLogEntry::new(record_id, owner, AuditAction::Skip, AuditOutcome::Success, now)
                .with_version(lease.version)
                .with_detail("ok"),
        };

        match self.store.commit_discard(commit) {
            Ok(CommitOutcome::Applied) => {
                info!(record_id = %record_id, owner, version, "record discarded");
                Ok(SkipReceipt {
                    record_id: record_id.clone(),
                    lease_version: version,
                    discard_id,
                    replayed: false,
                })
            }
            Ok(CommitOutcome::AlreadyApplied) => match self.store.find_discard(record_id, version)? {
                Some(existing) => replayed_skip(existing, owner),
                None => Err(CoordinatorError::Conflict(ConflictReason::RecordGone)),
            },
            Ok(CommitOutcome::LeaseMismatch { .. }) => Err(self.rejected(
                record_id,
                owner,
                version,
                AuditAction::Skip,
                LeaseError::Conflict(ConflictReason::StaleVersion),
            )),
            Ok(CommitOutcome::RecordGone) => {
                Err(CoordinatorError::Conflict(ConflictReason::RecordGone))
            }
            Err(e) => {
                warn!(record_id = %record_id, owner, version, error = %e, "discard commit failed");
                self.commit_failed(record_id, owner, version, AuditAction::Skip, &e);
                Err(e.into())
            }
        }
    }

    /// Give the record back to the queue without a decision
    pub fn abandon(
        &self,
        record_id: &RecordId,
        owner: &str,
        version: u64,
    ) -> CoordinatorResult<ReleaseOutcome> {
        Ok(self.leases.release(record_id, owner, version)?)
    }

    /// Clear soft-expired leases; returns how many were cleared
    pub fn sweep_expired(&self) -> CoordinatorResult<usize> {
        Ok(self.leases.sweep_expired()?)
    }

    /// Pool counts plus decision aggregates over the stats window
    pub fn stats(&self) -> CoordinatorResult<Stats> {
        let pending = self.selector.pending_count()?;
        let available = self.selector.available_count()?;

        let mut stats = Stats {
            pending,
            available,
            leased: pending.saturating_sub(available),
            ..Default::default()
        };
        stats.aggregate(
            &self.store.results()?,
            &self.store.discards()?,
            self.clock.now(),
        );
        Ok(stats)
    }

    /// Committed decisions matching `filter`, newest first
    pub fn list_results(&self, filter: &ResultFilter) -> CoordinatorResult<Vec<ResultEntry>> {
        Ok(filter.apply(self.store.results()?))
    }

    fn replayed_save(&self, existing: ResultEntry, owner: &str) -> CoordinatorResult<SaveReceipt> {
        if existing.user != owner {
            return Err(CoordinatorError::Conflict(ConflictReason::NotOwner));
        }
        debug!(record_id = %existing.record_id, owner, version = existing.lease_version, "save replayed");
        Ok(SaveReceipt {
            record_id: existing.record_id,
            lease_version: existing.lease_version,
            status: existing.status,
            result_id: existing.id,
            replayed: true,
        })
    }

    /// Best-effort audit of a commit the store did not acknowledge.
    ///
    /// The commit may still have landed; a retry with the same version
    /// settles it.
    fn commit_failed(
        &self,
        record_id: &RecordId,
        owner: &str,
        version: u64,
        attempted: AuditAction,
        err: &StoreError,
    ) {
        let entry = AuditLogEntry::new(
            record_id,
            owner,
            attempted,
            AuditOutcome::Failed,
            self.clock.now(),
        )
        .with_version(version)
        .with_detail(format!("store:{}", err));
        if let Err(e) = self.store.append_audit(entry) {
            warn!(error = %e, "failed to append commit failure audit entry");
        }
    }

    /// Audit a lease rejection and convert it for the caller
    fn rejected(
        &self,
        record_id: &RecordId,
        owner: &str,
        version: u64,
        attempted: AuditAction,
        err: LeaseError,
    ) -> CoordinatorError {
        if let LeaseError::Conflict(reason) = err {
            debug!(
                record_id = %record_id,
                owner,
                version,
                action = %attempted,
                reason = reason.code(),
                "lease conflict"
            );
            let entry = AuditLogEntry::new(
                record_id,
                owner,
                AuditAction::Conflict,
                AuditOutcome::Rejected,
                self.clock.now(),
            )
            .with_version(version)
            .with_detail(format!("blocked:{}", reason.code()))
            .with_extra("attempted", attempted.as_str());
            if let Err(e) = self.store.append_audit(entry) {
                warn!(error = %e, "failed to append conflict audit entry");
            }
        }
        err.into()
    }
}

fn replayed_skip(existing: DiscardEntry, owner: &str) -> CoordinatorResult<SkipReceipt> {
    if existing.user != owner {
        return Err(CoordinatorError::Conflict(ConflictReason::NotOwner));
    }
    Ok(SkipReceipt {
        record_id: existing.record_id,
        lease_version: existing.lease_version,
        discard_id: existing.id,
        replayed: true,
    })
}

fn change(field: &str, from: Value, to: Value) -> FieldChange {
    FieldChange {
        field: field.to_string(),
        from,
        to,
    }
}

fn build_result(
    mut record: ReviewRecord,
    submission: &ReviewSubmission,
    owner: &str,
    lease_version: u64,
    now: chrono::DateTime<chrono::Utc>,
) -> ResultEntry {
    let reviewer_note = submission.reviewer_note.trim().to_string();
    let internal_note = submission.internal_note.trim().to_string();
    let ko_reason = submission.ko_reason.trim().to_string();

    let history = vec![HistoryEntry {
        timestamp: now,
        user: owner.to_string(),
        action: "created".to_string(),
        changes: vec![
            change("status", json!(record.status.as_str()), json!(submission.status.as_str())),
            change("ko_reason", json!(""), json!(ko_reason)),
            change("multitematica", json!(false), json!(submission.multitematica)),
            change("reviewer_note", json!(record.reviewer_note), json!(reviewer_note)),
            change("internal_note", json!(""), json!(internal_note)),
        ],
    }];

    record.status = submission.status;
    record.reviewer_note = reviewer_note.clone();
    record.ko_reason = Some(ko_reason.clone()).filter(|r| !r.is_empty());

    ResultEntry {
        id: Uuid::new_v4(),
        record_id: record.id.clone(),
        lease_version,
        user: owner.to_string(),
        status: submission.status,
        reviewer_note,
        internal_note,
        ko_reason,
        multitematica: submission.multitematica,
        elapsed_seconds: submission.elapsed_seconds,
        timestamp: now,
        record,
        history,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::{FaultPoint, MemoryReviewStore};
    use chrono::Duration;
    use serde_json::Map;

    type TestCoordinator = WorkflowCoordinator<MemoryReviewStore, ManualClock>;

    fn setup(ids: &[&str]) -> (TestCoordinator, Arc<MemoryReviewStore>, ManualClock) {
        let store = Arc::new(
            MemoryReviewStore::with_records(ids.iter().map(|id| ReviewRecord::new(*id, Map::new())))
                .unwrap(),
        );
        let clock = ManualClock::at_epoch_secs(0);
        let coordinator = WorkflowCoordinator::new(
            store.clone(),
            clock.clone(),
            LeasePolicy::default(),
            CoordinatorConfig {
                selection_seed: Some(11),
                ..Default::default()
            },
        );
        (coordinator, store, clock)
    }

    fn submission(coordinator: &TestCoordinator, a: &Assignment, status: ReviewStatus) -> ReviewSubmission {
        ReviewSubmission::new(
            a.record.id.clone(),
            status,
            a.lease.owner.clone(),
            coordinator.clock.now(),
        )
    }

    fn count(store: &MemoryReviewStore, action: AuditAction) -> usize {
        store
            .audit_log()
            .unwrap()
            .iter()
            .filter(|e| e.action == action)
            .count()
    }

    #[test]
    fn test_acquire_next_and_save() {
        let (coordinator, store, _) = setup(&["R1"]);
        let a = coordinator.acquire_next("alice").unwrap();
        assert_eq!(a.record.id.as_str(), "R1");
        assert_eq!(a.expires_at_ms(), 600_000);

        let receipt = coordinator
            .submit(&a.record.id, "alice", a.lease.version, submission(&coordinator, &a, ReviewStatus::Ok))
            .unwrap();
        assert!(!receipt.replayed);
        assert_eq!(receipt.status, ReviewStatus::Ok);

        assert!(store.list_pending().unwrap().is_empty());
        let results = store.results().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.status, ReviewStatus::Ok);
        assert_eq!(results[0].history[0].action, "created");
        assert_eq!(results[0].history[0].changes[0].to, json!("OK"));
        assert_eq!(count(&store, AuditAction::Save), 1);
    }

    #[test]
    fn test_acquire_next_on_empty_queue() {
        let (coordinator, _, _) = setup(&[]);
        assert!(matches!(
            coordinator.acquire_next("alice"),
            Err(CoordinatorError::Empty)
        ));
    }

    #[test]
    fn test_acquire_next_skips_held_records() {
        let (coordinator, _, _) = setup(&["R1", "R2"]);
        let a = coordinator.acquire_next("alice").unwrap();
        let b = coordinator.acquire_next("bob").unwrap();
        assert_ne!(a.record.id, b.record.id);
        assert!(matches!(
            coordinator.acquire_next("carol"),
            Err(CoordinatorError::Empty)
        ));
    }

    #[test]
    fn test_acquire_next_resumes_own_record() {
        let (coordinator, _, _) = setup(&["R1", "R2", "R3"]);
        let first = coordinator.acquire_next("alice").unwrap();
        let again = coordinator.acquire_next("alice").unwrap();
        assert_eq!(first.record.id, again.record.id);
        assert_eq!(again.lease.version, first.lease.version + 1);
    }

    #[test]
    fn test_validation_failure_writes_nothing_and_keeps_lease() {
        let (coordinator, store, _) = setup(&["R1"]);
        let a = coordinator.acquire_next("alice").unwrap();
        let audit_before = store.audit_log().unwrap().len();

        let err = coordinator
            .submit(
                &a.record.id,
                "alice",
                a.lease.version,
                submission(&coordinator, &a, ReviewStatus::KoMym).with_note("detalle"),
            )
            .unwrap_err();

        assert!(matches!(
            err,
            CoordinatorError::Validation(ValidationError::MissingKoReason(ReviewStatus::KoMym))
        ));
        assert_eq!(err.status_code(), 422);
        assert!(store.results().unwrap().is_empty());
        assert_eq!(store.audit_log().unwrap().len(), audit_before);
        assert_eq!(
            coordinator.leases().inspect(&a.record.id).unwrap(),
            Some(a.lease.clone())
        );
    }

    #[test]
    fn test_save_with_stale_version_conflicts_and_audits() {
        let (coordinator, store, _) = setup(&["R1"]);
        let a = coordinator.acquire_next("alice").unwrap();
        coordinator.heartbeat(&a.record.id, "alice", a.lease.version).unwrap();

        let err = coordinator
            .submit(&a.record.id, "alice", a.lease.version, submission(&coordinator, &a, ReviewStatus::Ok))
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::Conflict(ConflictReason::StaleVersion)));
        assert_eq!(count(&store, AuditAction::Conflict), 1);
        assert!(store.results().unwrap().is_empty());
    }

    #[test]
    fn test_save_after_expiry_conflicts() {
        let (coordinator, _, clock) = setup(&["R1"]);
        let a = coordinator.acquire_next("alice").unwrap();
        clock.advance(Duration::seconds(601));

        let err = coordinator
            .submit(&a.record.id, "alice", a.lease.version, submission(&coordinator, &a, ReviewStatus::Ok))
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::Conflict(ConflictReason::Expired)));
    }

    #[test]
    fn test_save_retry_after_lost_ack_is_replayed() {
        let (coordinator, store, _) = setup(&["R1"]);
        let a = coordinator.acquire_next("alice").unwrap();
        let sub = submission(&coordinator, &a, ReviewStatus::Duda).with_note("revisar adjunto");

        store.inject_commit_fault(FaultPoint::AfterApply);
        let err = coordinator
            .submit(&a.record.id, "alice", a.lease.version, sub.clone())
            .unwrap_err();
        assert!(err.is_retryable());

        let receipt = coordinator
            .submit(&a.record.id, "alice", a.lease.version, sub)
            .unwrap();
        assert!(receipt.replayed);
        assert_eq!(store.results().unwrap().len(), 1);

        let saves: Vec<_> = store
            .audit_log()
            .unwrap()
            .into_iter()
            .filter(|e| e.action == AuditAction::Save)
            .map(|e| e.outcome)
            .collect();
        assert_eq!(saves, vec![AuditOutcome::Success, AuditOutcome::Failed]);
    }

    #[test]
    fn test_save_retry_after_failed_commit_applies() {
        let (coordinator, store, _) = setup(&["R1"]);
        let a = coordinator.acquire_next("alice").unwrap();
        let sub = submission(&coordinator, &a, ReviewStatus::Ok);

        store.inject_commit_fault(FaultPoint::BeforeApply);
        assert!(coordinator
            .submit(&a.record.id, "alice", a.lease.version, sub.clone())
            .is_err());
        assert!(coordinator.leases().inspect(&a.record.id).unwrap().is_some());

        let receipt = coordinator
            .submit(&a.record.id, "alice", a.lease.version, sub)
            .unwrap();
        assert!(!receipt.replayed);
        assert_eq!(store.results().unwrap().len(), 1);

        let saves: Vec<_> = store
            .audit_log()
            .unwrap()
            .into_iter()
            .filter(|e| e.action == AuditAction::Save)
            .map(|e| e.outcome)
            .collect();
        assert_eq!(saves, vec![AuditOutcome::Failed, AuditOutcome::Success]);
    }

    #[test]
    fn test_failed_discard_commit_is_audited() {
        let (coordinator, store, _) = setup(&["R1"]);
        let a = coordinator.acquire_next("alice").unwrap();

        store.inject_commit_fault(FaultPoint::BeforeApply);
        let err = coordinator
            .skip(&a.record.id, "alice", a.lease.version)
            .unwrap_err();
        assert!(err.is_retryable());

        let failed: Vec<_> = store
            .audit_log()
            .unwrap()
            .into_iter()
            .filter(|e| e.outcome == AuditOutcome::Failed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].action, AuditAction::Skip);
        assert_eq!(failed[0].lease_version, Some(a.lease.version));
        assert!(failed[0].detail.as_deref().unwrap().starts_with("store:"));
        assert!(store.discards().unwrap().is_empty());
    }

    #[test]
    fn test_submission_for_other_record_rejected() {
        let (coordinator, _, _) = setup(&["R1"]);
        let a = coordinator.acquire_next("alice").unwrap();
        let sub = ReviewSubmission::new("R9", ReviewStatus::Ok, "alice", coordinator.clock.now());
        let err = coordinator
            .submit(&a.record.id, "alice", a.lease.version, sub)
            .unwrap_err();
        assert_eq!(err.field(), Some("record_id"));
    }

    #[test]
    fn test_skip_moves_record_to_discards() {
        let (coordinator, store, _) = setup(&["R1"]);
        let a = coordinator.acquire_next("alice").unwrap();
        let receipt = coordinator.skip(&a.record.id, "alice", a.lease.version).unwrap();
        assert!(!receipt.replayed);

        assert!(store.list_pending().unwrap().is_empty());
        assert_eq!(store.discards().unwrap().len(), 1);
        assert_eq!(count(&store, AuditAction::Skip), 1);

        let again = coordinator.skip(&a.record.id, "alice", a.lease.version).unwrap();
        assert!(again.replayed);
        assert_eq!(store.discards().unwrap().len(), 1);
    }

    #[test]
    fn test_skip_by_non_holder_conflicts() {
        let (coordinator, _, _) = setup(&["R1"]);
        let a = coordinator.acquire_next("alice").unwrap();
        assert!(matches!(
            coordinator.skip(&a.record.id, "bob", a.lease.version),
            Err(CoordinatorError::Conflict(ConflictReason::NotOwner))
        ));
    }

    #[test]
    fn test_abandon_returns_record_to_queue() {
        let (coordinator, _, _) = setup(&["R1"]);
        let a = coordinator.acquire_next("alice").unwrap();
        assert_eq!(
            coordinator.abandon(&a.record.id, "alice", a.lease.version).unwrap(),
            ReleaseOutcome::Released
        );
        let b = coordinator.acquire_next("bob").unwrap();
        assert_eq!(b.record.id, a.record.id);
        assert_eq!(b.lease.version, a.lease.version + 1);
    }

    #[test]
    fn test_heartbeat_conflict_is_audited() {
        let (coordinator, store, clock) = setup(&["R1"]);
        let a = coordinator.acquire_next("alice").unwrap();
        clock.advance(Duration::seconds(700));
        coordinator.acquire_next("bob").unwrap();

        let err = coordinator
            .heartbeat(&a.record.id, "alice", a.lease.version)
            .unwrap_err();
        assert!(err.is_session_lost());
        let conflicts: Vec<_> = store
            .audit_log()
            .unwrap()
            .into_iter()
            .filter(|e| e.action == AuditAction::Conflict)
            .collect();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].extra["attempted"], "HEARTBEAT");
    }

    #[test]
    fn test_stats() {
        let (coordinator, _, _) = setup(&["R1", "R2", "R3"]);
        let a = coordinator.acquire_next("alice").unwrap();
        coordinator
            .submit(
                &a.record.id,
                "alice",
                a.lease.version,
                submission(&coordinator, &a, ReviewStatus::Ko).with_note("no aplica"),
            )
            .unwrap();
        let b = coordinator.acquire_next("bob").unwrap();
        coordinator.skip(&b.record.id, "bob", b.lease.version).unwrap();
        coordinator.acquire_next("carol").unwrap();

        let stats = coordinator.stats().unwrap();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.available, 0);
        assert_eq!(stats.leased, 1);
        assert_eq!(stats.results_by_status.get("KO"), Some(&1));
        assert_eq!(stats.discards, 1);
        assert_eq!(stats.total_results(), 1);
        assert_eq!(stats.by_user.get("alice"), Some(&1));
        assert_eq!(stats.by_day.get("19700101"), Some(&1));
        assert_eq!(stats.ko_rate, 1.0);
        assert_eq!(stats.duda_count, 0);
    }

    #[test]
    fn test_stats_window_drops_old_decisions() {
        let (coordinator, _, clock) = setup(&["R1", "R2"]);
        let a = coordinator.acquire_next("alice").unwrap();
        coordinator
            .submit(&a.record.id, "alice", a.lease.version, submission(&coordinator, &a, ReviewStatus::Ok))
            .unwrap();

        clock.advance(Duration::days(14));
        let stats = coordinator.stats().unwrap();
        assert_eq!(stats.total_results(), 0);
        assert!(stats.by_user.is_empty());
        assert_eq!(stats.pending, 1);
    }

    #[test]
    fn test_list_results_filters() {
        let (coordinator, _, clock) = setup(&["R1", "R2"]);
        for status in [ReviewStatus::Ok, ReviewStatus::Duda] {
            let a = coordinator.acquire_next("alice").unwrap();
            let sub = submission(&coordinator, &a, status).with_note("revisado");
            coordinator.submit(&a.record.id, "alice", a.lease.version, sub).unwrap();
            clock.advance(Duration::seconds(30));
        }

        let all = coordinator.list_results(&ResultFilter::default()).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].status, ReviewStatus::Duda);

        let dudas = coordinator
            .list_results(&ResultFilter {
                status: Some(ReviewStatus::Duda),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(dudas.len(), 1);

        let nobody = coordinator
            .list_results(&ResultFilter {
                user: Some("bob".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert!(nobody.is_empty());
    }

    #[test]
    fn test_store_outage_surfaces_as_retryable() {
        let (coordinator, store, _) = setup(&["R1"]);
        store.set_unavailable(true);
        let err = coordinator.acquire_next("alice").unwrap_err();
        assert_eq!(err.status_code(), 503);
        assert!(err.is_retryable());
    }
}
