//! Lease acquisition, renewal, release and validation

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, trace, warn};

use super::errors::{ConflictReason, LeaseError, LeaseResult};
use super::types::Lease;
use crate::audit::{AuditAction, AuditLogEntry, AuditOutcome};
use crate::clock::{Clock, LeasePolicy};
use crate::store::{CasOutcome, PendingDocument, ReviewStore};
use crate::RecordId;

/// Actor recorded for housekeeping audit entries
const SYSTEM_ACTOR: &str = "system";

/// Result of a release request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The caller's lease was removed
    Released,

    /// The caller no longer held the lease; nothing changed
    NotHeld,
}

/// Authoritative owner of every lease
pub struct LeaseManager<S: ReviewStore, C: Clock> {
    store: Arc<S>,
    clock: C,
    policy: LeasePolicy,
}

impl<S: ReviewStore, C: Clock> LeaseManager<S, C> {
    pub fn new(store: Arc<S>, clock: C, policy: LeasePolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> &LeasePolicy {
        &self.policy
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn load(&self, record_id: &RecordId) -> LeaseResult<PendingDocument> {
        self.store
            .get_pending(record_id)?
            .ok_or(LeaseError::Conflict(ConflictReason::RecordGone))
    }

    /// Audit writes outside a commit are best effort; a lost entry must
    /// not undo a granted lease.
    fn audit(&self, entry: AuditLogEntry) {
        if let Err(e) = self.store.append_audit(entry) {
            warn!(error = %e, "failed to append audit entry");
        }
    }

    fn deadline(&self, now: DateTime<Utc>) -> LeaseResult<DateTime<Utc>> {
        self.policy
            .expires_at(now)
            .ok_or(LeaseError::DeadlineOutOfRange)
    }

    /// Acquire custody of `record_id` for `owner`.
    ///
    /// Succeeds when the record has no lease, when the lease is
    /// soft-expired, or when `owner` already holds it (the lease is then
    /// re-issued with a fresh deadline and a new version).
    pub fn acquire(&self, record_id: &RecordId, owner: &str) -> LeaseResult<Lease> {
        let owner = owner.trim();
        if owner.is_empty() {
            return Err(LeaseError::Conflict(ConflictReason::NotOwner));
        }

        let doc = self.load(record_id)?;
        let now = self.clock.now();

        let previous = doc.lease.clone();
        if let Some(ref current) = previous {
            if !current.is_expired_at(now) && !current.is_held_by(owner) {
                trace!(record_id = %record_id, owner, holder = %current.owner, "record already leased");
                return Err(LeaseError::Conflict(ConflictReason::HeldByOther));
            }
        }

        let acquired_at = match previous {
            Some(ref current) if current.is_held_by(owner) && !current.is_expired_at(now) => {
                current.acquired_at
            }
            _ => now,
        };

        let lease = Lease {
            record_id: record_id.clone(),
            owner: owner.to_string(),
            acquired_at,
            renewed_at: now,
            expires_at: self.deadline(now)?,
            version: doc.lease_version + 1,
        };

        match self
            .store
            .compare_and_set_lease(record_id, doc.lease_version, Some(lease.clone()))?
        {
            CasOutcome::Applied => {}
            CasOutcome::VersionMismatch { current_version, .. } => {
                debug!(record_id = %record_id, owner, current_version, "lost acquire race");
                return Err(LeaseError::Conflict(ConflictReason::HeldByOther));
            }
            CasOutcome::RecordMissing => {
                return Err(LeaseError::Conflict(ConflictReason::RecordGone));
            }
        }

        if let Some(expired) = previous.filter(|p| !p.is_held_by(owner)) {
            info!(
                record_id = %record_id,
                previous_owner = %expired.owner,
                owner,
                "reclaimed expired lease"
            );
            self.audit(
                AuditLogEntry::new(
                    record_id,
                    expired.owner.as_str(),
                    AuditAction::Expire,
                    AuditOutcome::Success,
                    now,
                )
                .with_version(expired.version)
                .with_detail(format!("reclaimed_by:{}", owner)),
            );
        }

        debug!(record_id = %record_id, owner, version = lease.version, "lease acquired");
        self.audit(
            AuditLogEntry::new(
                record_id,
                owner,
                AuditAction::LockAcquire,
                AuditOutcome::Success,
                now,
            )
            .with_version(lease.version)
            .with_detail("ok"),
        );

        Ok(lease)
    }

    /// Extend a held lease by one TTL from now.
    ///
    /// Accepted even if the deadline has just passed, as long as nobody
    /// reclaimed the record in between (the version still matches). The
    /// renewed lease carries `version + 1`.
    pub fn renew(&self, record_id: &RecordId, owner: &str, version: u64) -> LeaseResult<Lease> {
        let owner = owner.trim();
        let doc = self.load(record_id)?;
        let current = Self::held(&doc, owner, version)?;

        let now = self.clock.now();
        let renewed = Lease {
            renewed_at: now,
            expires_at: self.deadline(now)?,
            version: version + 1,
            ..current.clone()
        };

        match self
            .store
            .compare_and_set_lease(record_id, version, Some(renewed.clone()))?
        {
            CasOutcome::Applied => {}
            CasOutcome::VersionMismatch { .. } => {
                return Err(LeaseError::Conflict(ConflictReason::StaleVersion));
            }
            CasOutcome::RecordMissing => {
                return Err(LeaseError::Conflict(ConflictReason::RecordGone));
            }
        }

        if current.is_expired_at(now) {
            debug!(record_id = %record_id, owner, "renewed lease past its deadline");
        } else if self.policy.heartbeat_too_soon(current.renewed_at, now) {
            trace!(record_id = %record_id, owner, "heartbeat inside minimum interval");
        }
        debug!(record_id = %record_id, owner, version = renewed.version, "lease renewed");
        self.audit(
            AuditLogEntry::new(
                record_id,
                owner,
                AuditAction::Heartbeat,
                AuditOutcome::Success,
                now,
            )
            .with_version(renewed.version)
            .with_detail("ok"),
        );

        Ok(renewed)
    }

    /// Drop the caller's lease.
    ///
    /// A lease already reclaimed by someone else is not an error for the
    /// releasing party; the call is then a no-op.
    pub fn release(
        &self,
        record_id: &RecordId,
        owner: &str,
        version: u64,
    ) -> LeaseResult<ReleaseOutcome> {
        let owner = owner.trim();
        let doc = match self.store.get_pending(record_id)? {
            Some(doc) => doc,
            None => return Ok(ReleaseOutcome::NotHeld),
        };
        if Self::held(&doc, owner, version).is_err() {
            debug!(record_id = %record_id, owner, version, "release of lease not held");
            return Ok(ReleaseOutcome::NotHeld);
        }

        match self.store.compare_and_set_lease(record_id, version, None)? {
            CasOutcome::Applied => {
                debug!(record_id = %record_id, owner, version, "lease released");
                self.audit(
                    AuditLogEntry::new(
                        record_id,
                        owner,
                        AuditAction::Release,
                        AuditOutcome::Success,
                        self.clock.now(),
                    )
                    .with_version(version),
                );
                Ok(ReleaseOutcome::Released)
            }
            CasOutcome::VersionMismatch { .. } | CasOutcome::RecordMissing => {
                Ok(ReleaseOutcome::NotHeld)
            }
        }
    }

    /// Read-only check that `owner` holds an unexpired lease at `version`.
    ///
    /// Run immediately before a decision write.
    pub fn validate(&self, record_id: &RecordId, owner: &str, version: u64) -> LeaseResult<Lease> {
        let owner = owner.trim();
        let doc = self.load(record_id)?;
        let lease = Self::held(&doc, owner, version)?;
        if lease.is_expired_at(self.clock.now()) {
            return Err(LeaseError::Conflict(ConflictReason::Expired));
        }
        Ok(lease.clone())
    }

    /// Current unexpired lease on a record, if any
    pub fn inspect(&self, record_id: &RecordId) -> LeaseResult<Option<Lease>> {
        let now = self.clock.now();
        Ok(self
            .store
            .get_pending(record_id)?
            .and_then(|doc| doc.lease)
            .filter(|lease| !lease.is_expired_at(now)))
    }

    /// Clear every soft-expired lease from the pending pool.
    ///
    /// Expired leases are already void, so this only tidies storage and
    /// leaves an audit trail. Returns the number of leases cleared.
    pub fn sweep_expired(&self) -> LeaseResult<usize> {
        let now = self.clock.now();
        let mut cleared = 0;

        for doc in self.store.list_pending()? {
            let Some(lease) = doc.lease else { continue };
            if !lease.is_expired_at(now) {
                continue;
            }
            if let CasOutcome::Applied =
                self.store
                    .compare_and_set_lease(&doc.record.id, lease.version, None)?
            {
                cleared += 1;
                self.audit(
                    AuditLogEntry::new(
                        doc.record.id.clone(),
                        lease.owner.as_str(),
                        AuditAction::Expire,
                        AuditOutcome::Success,
                        now,
                    )
                    .with_version(lease.version)
                    .with_detail("swept"),
                );
            }
        }

        if cleared > 0 {
            info!(cleared, "swept expired leases");
            self.audit(
                AuditLogEntry::new(
                    RecordId::default(),
                    SYSTEM_ACTOR,
                    AuditAction::LockSweep,
                    AuditOutcome::Success,
                    now,
                )
                .with_extra("cleared", cleared as u64),
            );
        }
        Ok(cleared)
    }

    /// The document's lease, if `owner` holds it at `version`
    fn held<'a>(doc: &'a PendingDocument, owner: &str, version: u64) -> LeaseResult<&'a Lease> {
        if owner.is_empty() {
            return Err(LeaseError::Conflict(ConflictReason::NotOwner));
        }
        match doc.lease {
            None if doc.lease_version == version => {
                Err(LeaseError::Conflict(ConflictReason::NoLease))
            }
            None => Err(LeaseError::Conflict(ConflictReason::StaleVersion)),
            Some(ref lease) if lease.version != version => {
                Err(LeaseError::Conflict(ConflictReason::StaleVersion))
            }
            Some(ref lease) if !lease.is_held_by(owner) => {
                Err(LeaseError::Conflict(ConflictReason::NotOwner))
            }
            Some(ref lease) => Ok(lease),
        }
    }
}
