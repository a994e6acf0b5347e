//! reviewdesk - record lease and review-workflow coordinator
//!
//! Reviewers pull records from a shared queue, hold each under a
//! time-bounded lease while they classify it, and commit a validated
//! decision. All coordination state lives in the review store; the
//! server clock is the only clock that gates a write.

pub mod audit;
pub mod auth;
pub mod cli;
pub mod clock;
pub mod coordinator;
pub mod heartbeat;
pub mod http_server;
pub mod lease;
pub mod queue;
pub mod record;
pub mod review;
pub mod store;

pub use record::{RecordId, ReviewRecord};
