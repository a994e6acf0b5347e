//! # HTTP Server Module
//!
//! JSON surface consumed by the review front end.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check
//! - `POST /review/next` - Acquire the next record
//! - `POST /review/heartbeat` - Renew the caller's lease
//! - `POST /review/save` - Submit a decision
//! - `POST /review/skip` - Discard the record
//! - `POST /review/release` - Give the record back without a decision
//! - `GET /review/stats` - Queue statistics (admin)
//!
//! Every `/review` route requires `Authorization: Bearer <token>`.

pub mod config;
mod errors;
mod health_routes;
pub mod review_routes;
pub mod server;

pub use config::HttpServerConfig;
pub use errors::{ApiError, ErrorResponse};
pub use review_routes::ReviewState;
pub use server::HttpServer;
