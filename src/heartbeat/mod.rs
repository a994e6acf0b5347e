//! # Heartbeat
//!
//! Client-side lease renewal. While the reviewer is active the task
//! renews the lease at most once per interval; when activity stops, so
//! do renewals, and the lease lapses on its own. Stopping the task is
//! the same as walking away from the record.

mod task;

pub use task::{HeartbeatConfig, HeartbeatHandle, SessionEnd};

use std::future::Future;

use crate::clock::Clock;
use crate::coordinator::{CoordinatorResult, WorkflowCoordinator};
use crate::lease::Lease;
use crate::store::ReviewStore;
use crate::RecordId;

/// Anything that can renew a lease: the coordinator in-process, or a
/// remote client speaking to the HTTP surface.
pub trait LeaseRenewer: Send + Sync + 'static {
    fn renew(
        &self,
        record_id: &RecordId,
        owner: &str,
        version: u64,
    ) -> impl Future<Output = CoordinatorResult<Lease>> + Send;
}

impl<S, C> LeaseRenewer for WorkflowCoordinator<S, C>
where
    S: ReviewStore + 'static,
    C: Clock + Clone + 'static,
{
    fn renew(
        &self,
        record_id: &RecordId,
        owner: &str,
        version: u64,
    ) -> impl Future<Output = CoordinatorResult<Lease>> + Send {
        std::future::ready(self.heartbeat(record_id, owner, version))
    }
}
