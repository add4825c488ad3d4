//! CLI configuration.
//!
//! Loads the exchange connection from environment variables, with an optional
//! `.env` file. Invalid values are errors, never silently defaulted.

use std::env;
use std::time::Duration;

use tradeport_domain::{ClientConfig, MarketType};
use tradeport_exec::DEFAULT_RATE_LIMIT;

use crate::error::{CliError, CliResult};

/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// Configuration
// =============================================================================

/// Everything needed to open one exchange port.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Exchange credentials and routing
    pub client: ClientConfig,
    /// Ceiling in operations per second
    pub rate_limit: u32,
    /// Per-request timeout
    pub timeout: Duration,
}

impl CliConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> CliResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> CliResult<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| CliError::Config(format!("{} is not set", key)))
        };

        let mut client = ClientConfig::new(required("BITGET_API_KEY")?, required("BITGET_SECRET")?)
            .with_testnet(parse_bool("TESTNET", lookup("TESTNET"))?)
            .with_market_type(parse_market_type(lookup("TRADEPORT_MARKET_TYPE"))?);
        if let Some(password) = lookup("BITGET_PASSWORD").filter(|v| !v.is_empty()) {
            client = client.with_password(password);
        }

        let rate_limit = parse_number("TRADEPORT_RATE_LIMIT", lookup("TRADEPORT_RATE_LIMIT"), DEFAULT_RATE_LIMIT)?;
        if rate_limit == 0 {
            return Err(CliError::Config("TRADEPORT_RATE_LIMIT must be at least 1".to_string()));
        }
        let timeout_secs = parse_number(
            "TRADEPORT_TIMEOUT_SECS",
            lookup("TRADEPORT_TIMEOUT_SECS"),
            DEFAULT_TIMEOUT_SECS,
        )?;

        Ok(Self {
            client,
            rate_limit,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn parse_bool(key: &str, value: Option<String>) -> CliResult<bool> {
    match value.as_deref().map(str::to_lowercase).as_deref() {
        None | Some("") => Ok(false),
        Some("true" | "1") => Ok(true),
        Some("false" | "0") => Ok(false),
        Some(other) => Err(CliError::Config(format!(
            "Invalid {}: {}. Expected: true, false, 1, 0",
            key, other
        ))),
    }
}

fn parse_market_type(value: Option<String>) -> CliResult<MarketType> {
    match value {
        None => Ok(MarketType::Swap),
        Some(raw) => raw
            .to_lowercase()
            .parse()
            .map_err(|_| CliError::Config(format!("Invalid TRADEPORT_MARKET_TYPE: {}. Expected: swap, spot", raw))),
    }
}

fn parse_number<N: std::str::FromStr>(key: &str, value: Option<String>, default: N) -> CliResult<N> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| CliError::Config(format!("Invalid {} value: {}", key, raw))),
    }
}

// =============================================================================
// Tests
// =============================================================================
