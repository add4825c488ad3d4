//! Tradeport operator CLI.
//!
//! Loads a client configuration from the environment, opens one exchange
//! port, runs a single read-only query, and closes the port.

#![warn(clippy::all)]

pub mod commands;
pub mod config;
pub mod error;

pub use commands::{run, Command};
pub use config::CliConfig;
pub use error::{CliError, CliResult};
