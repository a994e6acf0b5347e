//! Random selection among free pending records

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use crate::clock::Clock;
use crate::record::{RecordId, ReviewRecord};
use crate::review::ReviewStatus;
use crate::store::{PendingDocument, ReviewStore, StoreResult};

/// Chooses pending records uniformly at random.
///
/// Candidates are ordered by id before drawing, so a seeded selector is
/// deterministic for a given pool.
pub struct QueueSelector<S: ReviewStore, C: Clock> {
    store: Arc<S>,
    clock: C,
    rng: Mutex<StdRng>,
}

impl<S: ReviewStore, C: Clock> QueueSelector<S, C> {
    /// Selector seeded from OS entropy
    pub fn new(store: Arc<S>, clock: C) -> Self {
        Self::with_rng(store, clock, StdRng::from_entropy())
    }

    /// Selector with a fixed seed
    pub fn seeded(store: Arc<S>, clock: C, seed: u64) -> Self {
        Self::with_rng(store, clock, StdRng::seed_from_u64(seed))
    }

    fn with_rng(store: Arc<S>, clock: C, rng: StdRng) -> Self {
        Self {
            store,
            clock,
            rng: Mutex::new(rng),
        }
    }

    /// Next record for `owner`.
    ///
    /// A record `owner` already holds an unexpired lease on is returned
    /// first, so a reload resumes the same item. Otherwise one record is
    /// drawn from those that are `Pending`, unleased (or soft-expired) and
    /// not in `exclude`. Returns `None` when nothing is eligible.
    pub fn next_pending(
        &self,
        owner: Option<&str>,
        exclude: &[RecordId],
    ) -> StoreResult<Option<ReviewRecord>> {
        let now = self.clock.now();
        let pending = self.store.list_pending()?;

        if let Some(owner) = owner.map(str::trim).filter(|o| !o.is_empty()) {
            let resumed = pending.iter().find(|doc| {
                !exclude.contains(&doc.record.id)
                    && doc
                        .lease
                        .as_ref()
                        .is_some_and(|l| l.is_held_by(owner) && !l.is_expired_at(now))
            });
            if let Some(doc) = resumed {
                trace!(record_id = %doc.record.id, owner, "resuming held record");
                return Ok(Some(doc.record.clone()));
            }
        }

        let mut candidates: Vec<PendingDocument> = pending
            .into_iter()
            .filter(|doc| is_free(doc, now) && !exclude.contains(&doc.record.id))
            .collect();
        if candidates.is_empty() {
            return Ok(None);
        }
        candidates.sort_by(|a, b| a.record.id.cmp(&b.record.id));

        let index = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            rng.gen_range(0..candidates.len())
        };
        trace!(
            candidates = candidates.len(),
            record_id = %candidates[index].record.id,
            "selected pending record"
        );
        Ok(Some(candidates.swap_remove(index).record))
    }

    /// Records still in the pending pool
    pub fn pending_count(&self) -> StoreResult<usize> {
        Ok(self.store.list_pending()?.len())
    }

    /// Pending records nobody currently holds
    pub fn available_count(&self) -> StoreResult<usize> {
        let now = self.clock.now();
        Ok(self
            .store
            .list_pending()?
            .iter()
            .filter(|doc| is_free(doc, now))
            .count())
    }
}

fn is_free(doc: &PendingDocument, now: chrono::DateTime<chrono::Utc>) -> bool {
    doc.record.status == ReviewStatus::Pending
        && doc.lease.as_ref().map_or(true, |l| l.is_expired_at(now))
}
