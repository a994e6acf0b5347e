//! CLI command implementations
//!
//! Every command loads the configuration first and refuses to touch a
//! data directory that was not created by `init`.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::args::Command;
use super::config::ServiceConfig;
use super::errors::{CliError, CliResult};
use super::io::{init_logging, write_response};
use crate::auth::Authenticator;
use crate::clock::SystemClock;
use crate::coordinator::WorkflowCoordinator;
use crate::http_server::{HttpServer, ReviewState};
use crate::record::{RecordId, ReviewRecord};
use crate::store::{FileReviewStore, ReviewStore, StoreError, STORE_FILE_NAME};

type Coordinator = WorkflowCoordinator<FileReviewStore, SystemClock>;

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    init_logging();
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Init { config } => init(&config),
        Command::Serve { config, port } => serve(&config, port),
        Command::Load { config, file } => load(&config, &file),
        Command::Sweep { config } => sweep(&config),
        Command::Stats { config } => stats(&config),
        Command::Token { config, user, role } => token(&config, &user, &role),
    }
}

/// Create the data directory and an empty store
pub fn init(config_path: &Path) -> CliResult<()> {
    let config = ServiceConfig::load(config_path)?;
    let data_dir = config.data_path();

    if is_initialized(data_dir) {
        return Err(CliError::already_initialized());
    }

    let store = FileReviewStore::open(data_dir)?;
    store.sync()?;
    info!(
        snapshot = %store.path().display(),
        journal = %store.journal_path().display(),
        "initialized data directory"
    );

    write_response(json!({"initialized": true}))
}

/// Run the HTTP review server until Ctrl-C
pub fn serve(config_path: &Path, port: Option<u16>) -> CliResult<()> {
    let config = ServiceConfig::load(config_path)?;
    let coordinator = Arc::new(open_coordinator(&config)?);

    let cleared = coordinator.sweep_expired()?;
    if cleared > 0 {
        info!(cleared, "cleared expired leases at startup");
    }

    let mut http = config.http.clone();
    if let Some(port) = port {
        http.port = port;
    }

    let state = Arc::new(ReviewState::new(
        coordinator,
        Authenticator::new(config.jwt_config()),
    ));
    let server = HttpServer::new(http, state);

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(async {
        server
            .start()
            .await
            .map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e)))
    })
}

/// Ingest records from a JSON-lines file
pub fn load(config_path: &Path, file: &Path) -> CliResult<()> {
    let config = ServiceConfig::load(config_path)?;
    let store = open_store(&config)?;
    let summary = load_records(&store, file)?;
    write_response(serde_json::to_value(summary)?)
}

/// Clear soft-expired leases
pub fn sweep(config_path: &Path) -> CliResult<()> {
    let config = ServiceConfig::load(config_path)?;
    let cleared = open_coordinator(&config)?.sweep_expired()?;
    write_response(json!({"cleared": cleared}))
}

/// Print queue statistics
pub fn stats(config_path: &Path) -> CliResult<()> {
    let config = ServiceConfig::load(config_path)?;
    let stats = open_coordinator(&config)?.stats()?;
    write_response(serde_json::to_value(stats)?)
}

/// Issue a session token
pub fn token(config_path: &Path, user: &str, role: &str) -> CliResult<()> {
    let config = ServiceConfig::load(config_path)?;
    let auth = Authenticator::new(config.jwt_config());
    let token = auth.issue(user, role)?;
    let reviewer = auth.check(&token)?;
    write_response(json!({
        "token": token,
        "user": reviewer.username,
        "role": reviewer.role,
        "expires_in": auth.token_ttl().num_seconds(),
    }))
}

/// Outcome of a `load` run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub loaded: usize,
    pub duplicates: usize,
}

/// Insert every record in `file` into the pending pool.
///
/// Blank lines are ignored. Records already pending are counted and
/// skipped; any other failure aborts the load.
pub fn load_records<S: ReviewStore>(store: &S, file: &Path) -> CliResult<LoadSummary> {
    let reader = BufReader::new(File::open(file)?);
    let mut summary = LoadSummary::default();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&line)
            .map_err(|e| CliError::invalid_record(index + 1, e))?;
        let record = parse_record(value).map_err(|msg| CliError::invalid_record(index + 1, msg))?;

        match store.insert_pending(record) {
            Ok(()) => summary.loaded += 1,
            Err(StoreError::DuplicateRecord(id)) => {
                warn!(record_id = %id, "record already pending, skipped");
                summary.duplicates += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!(loaded = summary.loaded, duplicates = summary.duplicates, "records loaded");
    Ok(summary)
}

/// Accept either a full record (`{"id", "payload", ...}`) or a flat
/// spreadsheet row whose `id` or `IdCorreo` column names the record.
fn parse_record(value: Value) -> Result<ReviewRecord, String> {
    let Value::Object(mut row) = value else {
        return Err("expected a JSON object".to_string());
    };

    let record = if row.contains_key("payload") {
        serde_json::from_value::<ReviewRecord>(Value::Object(row)).map_err(|e| e.to_string())?
    } else {
        let id = ["id", "IdCorreo"]
            .iter()
            .find_map(|key| row.remove(*key))
            .map(|v| match v {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .unwrap_or_default();
        ReviewRecord::new(RecordId::new(id), row)
    };

    if record.id.is_empty() {
        return Err("record id is empty".to_string());
    }
    Ok(record)
}

fn is_initialized(data_dir: &Path) -> bool {
    data_dir.join(STORE_FILE_NAME).exists()
}

fn open_store(config: &ServiceConfig) -> CliResult<FileReviewStore> {
    let data_dir = config.data_path();
    if !is_initialized(data_dir) {
        return Err(CliError::not_initialized());
    }
    Ok(FileReviewStore::open(data_dir)?)
}

fn open_coordinator(config: &ServiceConfig) -> CliResult<Coordinator> {
    let store = Arc::new(open_store(config)?);
    Ok(WorkflowCoordinator::new(
        store,
        SystemClock,
        config.lease_policy(),
        config.coordinator_config(),
    ))
}
