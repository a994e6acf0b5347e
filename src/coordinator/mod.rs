//! # Workflow Coordinator
//!
//! Orchestrates one reviewer request at a time over the lease manager,
//! the queue selector and the review state machine:
//!
//! - acquire next: select, acquire, retry past lost races
//! - heartbeat: renew the caller's lease
//! - save: validate lease, validate transition, commit decision
//! - skip: validate lease, commit discard
//!
//! The coordinator holds no coordination state of its own. Everything
//! lives in the [`crate::store::ReviewStore`], so any number of
//! coordinators may serve the same store.

pub mod errors;
mod stats;
mod workflow;

pub use errors::{CoordinatorError, CoordinatorResult};
pub use stats::{ResultFilter, Stats, AUTOMATISMO_FIELD, LISTING_LIMIT, STATS_WINDOW_DAYS};
pub use workflow::{
    Assignment, CoordinatorConfig, SaveReceipt, SkipReceipt, WorkflowCoordinator,
    DEFAULT_MAX_ACQUIRE_ATTEMPTS,
};
