//! CLI-specific error types
//!
//! Every CLI error is fatal for the command that raised it.

use std::fmt;
use std::io;

use crate::auth::AuthError;
use crate::coordinator::CoordinatorError;
use crate::store::StoreError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (files, stdout)
    IoError,
    /// Already initialized
    AlreadyInitialized,
    /// Not initialized
    NotInitialized,
    /// Server failed to start or crashed
    BootFailed,
    /// Store rejected or failed an operation
    StoreError,
    /// Input record could not be parsed
    InvalidRecord,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "REVIEWDESK_CLI_CONFIG_ERROR",
            Self::IoError => "REVIEWDESK_CLI_IO_ERROR",
            Self::AlreadyInitialized => "REVIEWDESK_CLI_ALREADY_INITIALIZED",
            Self::NotInitialized => "REVIEWDESK_CLI_NOT_INITIALIZED",
            Self::BootFailed => "REVIEWDESK_CLI_BOOT_FAILED",
            Self::StoreError => "REVIEWDESK_CLI_STORE_ERROR",
            Self::InvalidRecord => "REVIEWDESK_CLI_INVALID_RECORD",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Already initialized
    pub fn already_initialized() -> Self {
        Self::new(
            CliErrorCode::AlreadyInitialized,
            "Data directory already initialized",
        )
    }

    /// Not initialized
    pub fn not_initialized() -> Self {
        Self::new(
            CliErrorCode::NotInitialized,
            "Data directory not initialized. Run 'reviewdesk init' first.",
        )
    }

    /// Boot failed
    pub fn boot_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::BootFailed, msg)
    }

    /// Invalid input record
    pub fn invalid_record(line: usize, msg: impl fmt::Display) -> Self {
        Self::new(
            CliErrorCode::InvalidRecord,
            format!("line {}: {}", line, msg),
        )
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        Self::new(CliErrorCode::StoreError, e.to_string())
    }
}

impl From<CoordinatorError> for CliError {
    fn from(e: CoordinatorError) -> Self {
        match e {
            CoordinatorError::Store(store) => store.into(),
            other => Self::new(CliErrorCode::StoreError, other.to_string()),
        }
    }
}

impl From<AuthError> for CliError {
    fn from(e: AuthError) -> Self {
        Self::config_error(e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_code() {
        let err = CliError::not_initialized();
        assert!(err.to_string().starts_with("REVIEWDESK_CLI_NOT_INITIALIZED"));
    }

    #[test]
    fn test_store_error_conversion() {
        let err: CliError = StoreError::Corrupted("bad json".into()).into();
        assert_eq!(err.code(), &CliErrorCode::StoreError);
        assert!(err.message().contains("bad json"));
    }

    #[test]
    fn test_invalid_record_names_line() {
        let err = CliError::invalid_record(7, "missing id");
        assert_eq!(err.message(), "line 7: missing id");
    }
}
