//! # Lease Manager
//!
//! Grants one reviewer exclusive, time-bounded custody of one record.
//!
//! ## Invariants
//! - At most one unexpired lease exists per record.
//! - Every lease change bumps the record's lease version; the store's
//!   compare-and-set on that version decides every race.
//! - A lease past its deadline is void for everyone else (soft expiry),
//!   but its holder may still renew it while the version is unchanged.

pub mod errors;
mod manager;
mod types;

pub use errors::{ConflictReason, LeaseError, LeaseResult};
pub use manager::{LeaseManager, ReleaseOutcome};
pub use types::Lease;
