//! CLI argument definitions using clap
//!
//! Commands:
//! - reviewdesk init --config <path>
//! - reviewdesk serve --config <path> [--port <port>]
//! - reviewdesk load --config <path> --file <records.jsonl>
//! - reviewdesk sweep --config <path>
//! - reviewdesk stats --config <path>
//! - reviewdesk token --config <path> --user <name> [--role <role>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// reviewdesk - lease-based review queue coordinator
#[derive(Parser, Debug)]
#[command(name = "reviewdesk")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize a new data directory
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./reviewdesk.json")]
        config: PathBuf,
    },

    /// Start the HTTP review server
    Serve {
        /// Path to configuration file
        #[arg(long, default_value = "./reviewdesk.json")]
        config: PathBuf,

        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Ingest pending records, one JSON object per line
    Load {
        /// Path to configuration file
        #[arg(long, default_value = "./reviewdesk.json")]
        config: PathBuf,

        /// JSON-lines file of records
        #[arg(long)]
        file: PathBuf,
    },

    /// Clear soft-expired leases
    Sweep {
        /// Path to configuration file
        #[arg(long, default_value = "./reviewdesk.json")]
        config: PathBuf,
    },

    /// Print queue statistics
    Stats {
        /// Path to configuration file
        #[arg(long, default_value = "./reviewdesk.json")]
        config: PathBuf,
    },

    /// Issue a session token for a reviewer
    Token {
        /// Path to configuration file
        #[arg(long, default_value = "./reviewdesk.json")]
        config: PathBuf,

        /// Reviewer username
        #[arg(long)]
        user: String,

        /// Role name (reviewer or admin)
        #[arg(long, default_value = "reviewer")]
        role: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
