//! # Review State Machine
//!
//! A record starts `Pending` and a successful save moves it to exactly one
//! terminal status. Which fields a save must carry is driven by the
//! requirement table in [`rules`], shared by every caller so client and
//! server checks cannot drift apart.
//!
//! Validation always runs server-side. Client-side checks are a
//! convenience only.

pub mod errors;
mod rules;
mod status;
mod submission;

pub use errors::{ValidationError, ValidationResult};
pub use rules::{requirement_for, validate_transition, FieldRequirement};
pub use status::ReviewStatus;
pub use submission::ReviewSubmission;
