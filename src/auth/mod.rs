//! # Auth Module
//!
//! Session tokens for reviewers. Every review request carries a bearer
//! token checked here before the coordinator sees it.
//!
//! ## Invariants
//! - Validation is stateless (no store lookup)
//! - An expired token is reported distinctly from a bad one, so the
//!   client can send the user to log in instead of to the next record

pub mod errors;
mod jwt;
mod role;

pub use errors::{AuthError, AuthResult};
pub use jwt::{Authenticator, JwtConfig, Reviewer, ReviewerClaims};
pub use role::{normalize_role, Role};
