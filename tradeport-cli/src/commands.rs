//! Read-only port queries exposed on the command line.

use clap::Subcommand;
use serde_json::Value;
use std::collections::BTreeSet;

use tradeport_domain::{canonical_symbol, CanonicalSymbol, QuoteFamily};
use tradeport_exec::ExchangePort;

use crate::error::{CliError, CliResult};

/// Available queries
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Current funding rates of USDT-settled swaps
    Funding {
        /// Include instruments that no longer accept orders
        #[arg(long)]
        all: bool,
    },

    /// Last traded price
    Ticker {
        /// Symbol in any notation (BTC, BTCUSDT, BTC/USDT:USDT)
        symbol: String,
    },

    /// Trading constraints of one instrument
    Instrument {
        /// Symbol in any notation
        symbol: String,
    },

    /// Open positions (all symbols if none given)
    Positions {
        /// Symbols in any notation
        symbols: Vec<String>,
    },

    /// Balance of one asset
    Balance {
        /// Asset code
        #[arg(default_value = "USDT")]
        asset: String,
    },
}

fn symbol(raw: &str) -> CliResult<CanonicalSymbol> {
    Ok(canonical_symbol(raw, QuoteFamily::USDT)?)
}

fn to_json<T: serde::Serialize>(value: &T) -> CliResult<Value> {
    serde_json::to_value(value).map_err(|e| CliError::Config(format!("output encoding: {}", e)))
}

/// Run one query and render its result as JSON.
pub async fn run<P>(port: &P, command: &Command) -> CliResult<Value>
where
    P: ExchangePort + ?Sized,
{
    match command {
        Command::Funding { all } => to_json(&port.get_funding_usdt_rates(!all).await?),
        Command::Ticker { symbol: raw } => to_json(&port.get_ticker(&symbol(raw)?).await?),
        Command::Instrument { symbol: raw } => to_json(&port.get_instrument_info(&symbol(raw)?).await?),
        Command::Positions { symbols } => {
            let symbols = symbols
                .iter()
                .map(|raw| symbol(raw))
                .collect::<CliResult<BTreeSet<_>>>()?;
            to_json(&port.get_positions(&symbols).await?)
        },
        Command::Balance { asset } => to_json(&port.get_balance(asset).await?),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tradeport_testkit::simulated_bitget;

    #[tokio::test]
    async fn test_ticker_accepts_loose_symbols() {
        let port = simulated_bitget();

        let output = run(&port, &Command::Ticker { symbol: "btc".to_string() }).await.unwrap();
        assert_eq!(output["symbol"], "BTC/USDT:USDT");
        assert_eq!(output["last_price"], "65000.0");
        port.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_funding_lists_current_records() {
        let port = simulated_bitget();

        let output = run(&port, &Command::Funding { all: false }).await.unwrap();
        let records = output.as_array().unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r["exchange"] == "bitget"));
        port.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_positions_empty_when_flat() {
        let port = simulated_bitget();

        let output = run(&port, &Command::Positions { symbols: vec!["XRPUSDT".to_string()] })
            .await
            .unwrap();
        assert_eq!(output, serde_json::json!([]));
        port.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_bad_symbol_is_argument_error() {
        let port = simulated_bitget();

        let err = run(&port, &Command::Instrument { symbol: "BTC/USDC:USDC".to_string() })
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Argument(_)));
        port.close().await.unwrap();
    }
}
