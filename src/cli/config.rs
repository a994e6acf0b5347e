//! Service configuration file
//!
//! A single JSON object. Only `data_dir` and `jwt_secret` are required;
//! everything else has a default.

use std::fs;
use std::path::Path;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::errors::{CliError, CliResult};
use crate::auth::JwtConfig;
use crate::clock::{
    LeasePolicy, DEFAULT_HEARTBEAT_MIN_INTERVAL_SECS, DEFAULT_LEASE_TTL_SECS, MAX_LEASE_TTL_SECS,
};
use crate::coordinator::{CoordinatorConfig, DEFAULT_MAX_ACQUIRE_ATTEMPTS};
use crate::http_server::HttpServerConfig;

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Data directory (required)
    pub data_dir: String,

    /// Lease lifetime in seconds (default 600)
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: i64,

    /// Minimum spacing between heartbeats in seconds (default 60)
    #[serde(default = "default_heartbeat_min_interval_secs")]
    pub heartbeat_min_interval_secs: i64,

    /// Select/acquire rounds per request (default 250)
    #[serde(default = "default_max_acquire_attempts")]
    pub max_acquire_attempts: usize,

    /// Fixed queue selection seed (default: entropy)
    #[serde(default)]
    pub selection_seed: Option<u64>,

    /// HS256 signing secret (required)
    pub jwt_secret: String,

    #[serde(default = "default_jwt_issuer")]
    pub jwt_issuer: String,

    /// Session token lifetime in seconds (default 8 hours)
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: i64,

    #[serde(default)]
    pub http: HttpServerConfig,
}

/// Longest accepted session token lifetime (one week)
const MAX_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

fn default_lease_ttl_secs() -> i64 {
    DEFAULT_LEASE_TTL_SECS
}
fn default_heartbeat_min_interval_secs() -> i64 {
    DEFAULT_HEARTBEAT_MIN_INTERVAL_SECS
}
fn default_max_acquire_attempts() -> usize {
    DEFAULT_MAX_ACQUIRE_ATTEMPTS
}
fn default_jwt_issuer() -> String {
    "reviewdesk".to_string()
}
fn default_token_ttl_secs() -> i64 {
    8 * 60 * 60
}

impl ServiceConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;
        Self::parse(&content)
    }

    /// Parse and validate a configuration document
    pub fn parse(content: &str) -> CliResult<Self> {
        let config: ServiceConfig = serde_json::from_str(content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.data_dir.trim().is_empty() {
            return Err(CliError::config_error("data_dir must not be empty"));
        }

        if !(1..=MAX_LEASE_TTL_SECS).contains(&self.lease_ttl_secs) {
            return Err(CliError::config_error(format!(
                "lease_ttl_secs must be between 1 and {}",
                MAX_LEASE_TTL_SECS
            )));
        }

        if self.heartbeat_min_interval_secs < 1 {
            return Err(CliError::config_error(
                "heartbeat_min_interval_secs must be >= 1",
            ));
        }

        if self.heartbeat_min_interval_secs >= self.lease_ttl_secs {
            return Err(CliError::config_error(format!(
                "heartbeat_min_interval_secs ({}) must be shorter than lease_ttl_secs ({})",
                self.heartbeat_min_interval_secs, self.lease_ttl_secs
            )));
        }

        if self.max_acquire_attempts == 0 {
            return Err(CliError::config_error("max_acquire_attempts must be > 0"));
        }

        if self.jwt_secret.trim().is_empty() {
            return Err(CliError::config_error("jwt_secret must not be empty"));
        }

        if !(1..=MAX_TOKEN_TTL_SECS).contains(&self.token_ttl_secs) {
            return Err(CliError::config_error(format!(
                "token_ttl_secs must be between 1 and {}",
                MAX_TOKEN_TTL_SECS
            )));
        }

        Ok(())
    }

    /// Get data directory path
    pub fn data_path(&self) -> &Path {
        Path::new(&self.data_dir)
    }

    pub fn lease_policy(&self) -> LeasePolicy {
        LeasePolicy {
            ttl: Duration::seconds(self.lease_ttl_secs),
            heartbeat_min_interval: Duration::seconds(self.heartbeat_min_interval_secs),
        }
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            max_acquire_attempts: self.max_acquire_attempts,
            selection_seed: self.selection_seed,
        }
    }

    pub fn jwt_config(&self) -> JwtConfig {
        JwtConfig {
            secret: self.jwt_secret.clone(),
            token_ttl: Duration::seconds(self.token_ttl_secs),
            issuer: self.jwt_issuer.clone(),
            audience: self.jwt_issuer.clone(),
        }
    }
}
