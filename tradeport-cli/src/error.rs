//! CLI error types.

use thiserror::Error;
use tradeport_domain::{DomainError, ValueError};
use tradeport_exec::ExecError;

/// CLI-level errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Port operation failed
    #[error("Port error: {0}")]
    Domain(#[from] DomainError),

    /// Port could not be built
    #[error("Execution error: {0}")]
    Exec(#[from] ExecError),

    /// Argument could not be turned into a domain value
    #[error("Invalid argument: {0}")]
    Argument(#[from] ValueError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;
