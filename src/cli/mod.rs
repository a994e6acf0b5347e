//! CLI module for reviewdesk
//!
//! Provides command-line interface for:
//! - init: Create the data directory and an empty store
//! - serve: Run the HTTP review server
//! - load: Ingest pending records from a JSON-lines file
//! - sweep: Clear expired leases
//! - stats: Print queue statistics
//! - token: Issue a session token

mod args;
mod commands;
mod config;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{
    init, load, load_records, run, run_command, serve, stats, sweep, token, LoadSummary,
};
pub use config::ServiceConfig;
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{init_logging, write_error, write_response};
