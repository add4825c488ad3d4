//! Tradeport CLI
//!
//! Read-only queries against a live exchange port.
//!
//! # Usage
//!
//! ```bash
//! tradeport funding
//! tradeport ticker BTC
//! tradeport positions XRP BTC
//! TESTNET=1 tradeport balance USDT
//! ```
//!
//! # Environment Variables
//!
//! - `BITGET_API_KEY`, `BITGET_SECRET`, `BITGET_PASSWORD`: credentials
//! - `TESTNET`: route to demo trading (default: false)
//! - `TRADEPORT_MARKET_TYPE`: swap or spot (default: swap)
//! - `TRADEPORT_RATE_LIMIT`: operations per second (default: 10)
//! - `TRADEPORT_TIMEOUT_SECS`: per-request timeout (default: 10)

use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use serde_json::Value;

use tradeport_cli::{run, CliConfig, CliResult, Command};
use tradeport_connectors::BitgetExchange;
use tradeport_exec::scoped;

/// Query an exchange through the Tradeport port
#[derive(Parser)]
#[command(name = "tradeport")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log every request
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Query to run
    #[command(subcommand)]
    command: Command,
}

/// Open the port, run the query, close the port on every path.
async fn execute(config: CliConfig, command: Command) -> CliResult<Value> {
    let port = BitgetExchange::connect(&config.client, config.rate_limit, config.timeout)?;
    scoped(port, move |port| Box::pin(async move { run(port, &command).await })).await
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let directive = if cli.verbose { "tradeport=debug" } else { "tradeport=info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .init();

    let config = CliConfig::from_env()?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        testnet = config.client.testnet(),
        rate_limit = config.rate_limit,
        "Tradeport CLI"
    );

    // One cooperative thread; every operation suspends on I/O or the limiter.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let output = runtime.block_on(execute(config, cli.command))?;

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
