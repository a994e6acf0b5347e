//! Review Workflow Tests
//!
//! End-to-end scenarios through the coordinator on a manual clock:
//! - Heartbeat, reclaim and stale save across two reviewers
//! - Validation rejections leave no trace in the store
//! - Saves retried after a lost acknowledgement commit exactly once

use std::sync::Arc;

use chrono::Duration;
use reviewdesk::audit::AuditAction;
use reviewdesk::clock::{Clock, LeasePolicy, ManualClock};
use reviewdesk::coordinator::{CoordinatorConfig, CoordinatorError, WorkflowCoordinator};
use reviewdesk::lease::{ConflictReason, LeaseError, ReleaseOutcome};
use reviewdesk::review::{ReviewStatus, ReviewSubmission, ValidationError};
use reviewdesk::store::{FaultPoint, MemoryReviewStore, ReviewStore};
use reviewdesk::{RecordId, ReviewRecord};
use serde_json::{json, Map};

type Coordinator = WorkflowCoordinator<MemoryReviewStore, ManualClock>;

fn setup(ids: &[&str]) -> (Coordinator, Arc<MemoryReviewStore>, ManualClock) {
    let records = ids.iter().map(|id| {
        let mut payload = Map::new();
        payload.insert("subject".to_string(), json!(format!("consulta {}", id)));
        ReviewRecord::new(*id, payload)
    });
    let store = Arc::new(MemoryReviewStore::with_records(records).unwrap());
    let clock = ManualClock::at_epoch_secs(0);
    let coordinator = WorkflowCoordinator::new(
        store.clone(),
        clock.clone(),
        LeasePolicy::with_ttl_secs(600),
        CoordinatorConfig {
            selection_seed: Some(7),
            ..CoordinatorConfig::default()
        },
    );
    (coordinator, store, clock)
}

fn submission(clock: &ManualClock, id: &str, status: ReviewStatus, user: &str) -> ReviewSubmission {
    ReviewSubmission::new(id, status, user, clock.now())
}

fn count(store: &MemoryReviewStore, action: AuditAction) -> usize {
    store
        .audit_log()
        .unwrap()
        .iter()
        .filter(|e| e.action == action)
        .count()
}

// =============================================================================
// Two-Reviewer Timeline
// =============================================================================

/// A holds R1, heartbeats, goes idle; B reclaims after expiry and A's
/// late save is rejected.
#[test]
fn test_reclaim_after_idle_rejects_stale_save() {
    let (coordinator, store, clock) = setup(&["R1"]);
    let r1 = RecordId::from("R1");

    // t=0
    let assignment = coordinator.acquire_next("alice").unwrap();
    assert_eq!(assignment.record.id, r1);
    assert_eq!(assignment.expires_at_ms(), 600_000);

    // t=550
    clock.advance(Duration::seconds(550));
    let renewed = coordinator
        .heartbeat(&r1, "alice", assignment.lease.version)
        .unwrap();
    assert_eq!(renewed.expires_at_ms(), 1_150_000);

    // t=560
    clock.advance(Duration::seconds(10));
    assert!(matches!(
        coordinator.leases().acquire(&r1, "bob"),
        Err(LeaseError::Conflict(ConflictReason::HeldByOther))
    ));
    assert!(matches!(
        coordinator.acquire_next("bob"),
        Err(CoordinatorError::Empty)
    ));

    // t=1200
    clock.advance(Duration::seconds(640));
    let bob = coordinator.acquire_next("bob").unwrap();
    assert_eq!(bob.record.id, r1);
    assert!(bob.lease.version > renewed.version);

    let late = submission(&clock, "R1", ReviewStatus::Ok, "alice");
    let err = coordinator
        .submit(&r1, "alice", renewed.version, late)
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::Conflict(_)));
    assert_eq!(err.status_code(), 409);

    assert!(store.results().unwrap().is_empty());
    assert_eq!(count(&store, AuditAction::Expire), 1);
    assert_eq!(count(&store, AuditAction::Conflict), 1);

    let saved = coordinator
        .submit(
            &r1,
            "bob",
            bob.lease.version,
            submission(&clock, "R1", ReviewStatus::Ok, "bob"),
        )
        .unwrap();
    assert!(!saved.replayed);
    assert_eq!(store.results().unwrap()[0].user, "bob");
}

/// A reviewer working through the queue drains it.
#[test]
fn test_single_reviewer_drains_queue() {
    let (coordinator, store, clock) = setup(&["R1", "R2", "R3"]);

    let mut seen = Vec::new();
    while let Ok(assignment) = coordinator.acquire_next("alice") {
        let id = assignment.record.id.clone();
        let s = submission(&clock, id.as_str(), ReviewStatus::Ko, "alice").with_note("sin datos");
        coordinator
            .submit(&id, "alice", assignment.lease.version, s)
            .unwrap();
        seen.push(id);
        clock.advance(Duration::seconds(30));
    }

    seen.sort();
    assert_eq!(seen, vec![RecordId::from("R1"), RecordId::from("R2"), RecordId::from("R3")]);
    assert!(store.list_pending().unwrap().is_empty());

    let stats = coordinator.stats().unwrap();
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.results_by_status.get("KO"), Some(&3));
}

// =============================================================================
// Validation Rejections
// =============================================================================

/// KO MYM without a sub-reason is rejected with no writes and the lease
/// stays with the reviewer.
#[test]
fn test_ko_mym_without_reason_writes_nothing() {
    let (coordinator, store, clock) = setup(&["R1"]);
    let assignment = coordinator.acquire_next("alice").unwrap();
    let r1 = assignment.record.id.clone();
    let audit_before = store.audit_log().unwrap().len();

    let s = submission(&clock, "R1", ReviewStatus::KoMym, "alice").with_note("mal clasificado");
    let err = coordinator
        .submit(&r1, "alice", assignment.lease.version, s)
        .unwrap_err();

    assert!(matches!(
        err,
        CoordinatorError::Validation(ValidationError::MissingKoReason(ReviewStatus::KoMym))
    ));
    assert_eq!(err.status_code(), 422);
    assert_eq!(err.field(), Some("ko_reason"));
    assert!(store.results().unwrap().is_empty());
    assert_eq!(store.audit_log().unwrap().len(), audit_before);

    let lease = coordinator.leases().inspect(&r1).unwrap().unwrap();
    assert_eq!(lease.owner, "alice");
    assert_eq!(lease.version, assignment.lease.version);
}

/// Every negative status needs a note; OK does not.
#[test]
fn test_note_requirements_per_status() {
    for status in ReviewStatus::TERMINAL {
        let (coordinator, store, clock) = setup(&["R1"]);
        let assignment = coordinator.acquire_next("alice").unwrap();
        let r1 = assignment.record.id.clone();

        let bare = submission(&clock, "R1", status, "alice");
        let result = coordinator.submit(&r1, "alice", assignment.lease.version, bare);

        if status == ReviewStatus::Ok {
            assert!(result.is_ok());
            assert_eq!(store.results().unwrap().len(), 1);
        } else {
            assert!(matches!(result, Err(CoordinatorError::Validation(_))), "{}", status);
            assert!(store.results().unwrap().is_empty());
        }
    }
}

/// A decision carrying everything is stored with its history.
#[test]
fn test_saved_result_carries_decision_fields() {
    let (coordinator, store, clock) = setup(&["R1"]);
    let assignment = coordinator.acquire_next("alice").unwrap();
    let r1 = assignment.record.id.clone();

    let s = submission(&clock, "R1", ReviewStatus::KoMym, "alice")
        .with_note("respuesta incompleta")
        .with_ko_reason("documentacion")
        .with_internal_note("revisar plantilla")
        .with_multitematica(true)
        .with_elapsed_seconds(42);
    coordinator
        .submit(&r1, "alice", assignment.lease.version, s)
        .unwrap();

    let results = store.results().unwrap();
    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert_eq!(result.status, ReviewStatus::KoMym);
    assert_eq!(result.ko_reason, "documentacion");
    assert!(result.multitematica);
    assert_eq!(result.elapsed_seconds, Some(42));
    assert_eq!(result.record.field("subject"), "consulta R1");
    assert_eq!(result.history.len(), 1);
    assert!(result.history[0].changes.iter().any(|c| c.field == "status"));
}

// =============================================================================
// Idempotent Commits
// =============================================================================

/// A save whose acknowledgement was lost is committed exactly once.
#[test]
fn test_retry_after_lost_ack_commits_once() {
    let (coordinator, store, clock) = setup(&["R1"]);
    let assignment = coordinator.acquire_next("alice").unwrap();
    let r1 = assignment.record.id.clone();
    let version = assignment.lease.version;
    let s = submission(&clock, "R1", ReviewStatus::Ok, "alice");

    store.inject_commit_fault(FaultPoint::AfterApply);
    let err = coordinator.submit(&r1, "alice", version, s.clone()).unwrap_err();
    assert!(err.is_retryable());

    let receipt = coordinator.submit(&r1, "alice", version, s.clone()).unwrap();
    assert!(receipt.replayed);
    let again = coordinator.submit(&r1, "alice", version, s).unwrap();
    assert_eq!(again.result_id, receipt.result_id);

    assert_eq!(store.results().unwrap().len(), 1);
    assert_eq!(count(&store, AuditAction::Save), 1);
}

/// A save that failed before writing commits normally on retry.
#[test]
fn test_retry_after_failed_write_commits() {
    let (coordinator, store, clock) = setup(&["R1"]);
    let assignment = coordinator.acquire_next("alice").unwrap();
    let r1 = assignment.record.id.clone();
    let version = assignment.lease.version;
    let s = submission(&clock, "R1", ReviewStatus::Ok, "alice");

    store.inject_commit_fault(FaultPoint::BeforeApply);
    assert!(coordinator.submit(&r1, "alice", version, s.clone()).is_err());
    assert!(store.results().unwrap().is_empty());

    let receipt = coordinator.submit(&r1, "alice", version, s).unwrap();
    assert!(!receipt.replayed);
    assert_eq!(store.results().unwrap().len(), 1);
}

/// Skips are idempotent too, and a replay by another user is refused.
#[test]
fn test_skip_replay() {
    let (coordinator, store, _) = setup(&["R1"]);
    let assignment = coordinator.acquire_next("alice").unwrap();
    let r1 = assignment.record.id.clone();
    let version = assignment.lease.version;

    store.inject_commit_fault(FaultPoint::AfterApply);
    assert!(coordinator.skip(&r1, "alice", version).is_err());

    let receipt = coordinator.skip(&r1, "alice", version).unwrap();
    assert!(receipt.replayed);
    assert!(matches!(
        coordinator.skip(&r1, "bob", version),
        Err(CoordinatorError::Conflict(ConflictReason::NotOwner))
    ));
    assert_eq!(store.discards().unwrap().len(), 1);
    assert_eq!(count(&store, AuditAction::Skip), 1);
}

// =============================================================================
// Release
// =============================================================================

/// A released record goes straight back to the pool.
#[test]
fn test_abandon_returns_record_to_pool() {
    let (coordinator, _, _) = setup(&["R1"]);
    let assignment = coordinator.acquire_next("alice").unwrap();
    let r1 = assignment.record.id.clone();

    assert_eq!(
        coordinator.abandon(&r1, "alice", assignment.lease.version).unwrap(),
        ReleaseOutcome::Released
    );
    assert_eq!(
        coordinator.abandon(&r1, "alice", assignment.lease.version).unwrap(),
        ReleaseOutcome::NotHeld
    );

    let bob = coordinator.acquire_next("bob").unwrap();
    assert_eq!(bob.record.id, r1);
}
