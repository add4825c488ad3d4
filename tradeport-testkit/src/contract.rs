//! Exchange-independent contract scenarios.
//!
//! Every scenario takes any [`ExchangePort`] and returns `anyhow::Result`.
//! Bindings run the whole suite through [`contract_tests!`](crate::contract_tests):
//!
//! ```rust,ignore
//! tradeport_testkit::contract_tests!(|| simulated_bitget());
//! ```
//!
//! Scenarios that open positions leave the fixture symbol flat again.

use anyhow::{bail, ensure, Context, Result};
use chrono::Utc;
use futures_util::future::BoxFuture;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use std::collections::BTreeSet;
use std::time::Duration;

use tradeport_domain::{
    CanonicalSymbol, Leverage, MarginMode, OrderSide, OrderType, Params, Price, Quantity,
    TpslRequest,
};
use tradeport_exec::{await_flat, observe_lifecycle, scoped, ExchangePort, LifecycleState};

/// Symbol every trading scenario uses
pub const FIXTURE_SYMBOL: &str = "XRP/USDT:USDT";

/// Symbol of the ticker scenario
pub const TICKER_SYMBOL: &str = "BTC/USDT:USDT";

/// Contracts per trading scenario
pub const FIXTURE_AMOUNT: Decimal = dec!(5);

/// Polls allowed for a close to settle
const FLAT_ATTEMPTS: u32 = 5;

/// Spacing of those polls
const FLAT_INTERVAL: Duration = Duration::from_millis(200);

/// Fixture symbol.
pub fn fixture_symbol() -> Result<CanonicalSymbol> {
    Ok(CanonicalSymbol::parse(FIXTURE_SYMBOL)?)
}

fn fixture_set() -> Result<BTreeSet<CanonicalSymbol>> {
    Ok(BTreeSet::from([fixture_symbol()?]))
}

fn fixture_amount() -> Result<Quantity> {
    Ok(Quantity::new(FIXTURE_AMOUNT)?)
}

/// Run one scenario on a port and close the port afterwards.
pub async fn run<P, F>(port: P, scenario: F) -> Result<()>
where
    P: ExchangePort,
    F: for<'a> FnOnce(&'a P) -> BoxFuture<'a, Result<()>>,
{
    scoped(port, scenario).await
}

/// `BASE/USDT:USDT` with an upper-case alphanumeric base of 1 to 32 chars.
pub fn is_canonical_usdt(symbol: &str) -> bool {
    match symbol.split_once('/') {
        Some((base, rest)) => {
            rest == "USDT:USDT"
                && (1..=32).contains(&base.len())
                && base.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        },
        None => false,
    }
}

/// One-way mode, the given margin mode and leverage on the fixture symbol.
pub async fn configure<P>(port: &P, margin_mode: MarginMode, leverage: u32) -> Result<()>
where
    P: ExchangePort + ?Sized,
{
    let symbol = fixture_symbol()?;
    port.set_position_mode(false, Some(&symbol)).await?;
    port.set_margin_mode(margin_mode, &symbol, None).await?;
    port.set_leverage(Leverage::new(leverage)?, &symbol).await?;
    Ok(())
}

async fn ensure_flat<P>(port: &P, symbol: &CanonicalSymbol) -> Result<()>
where
    P: ExchangePort + ?Sized,
{
    let state = await_flat(port, symbol, FLAT_ATTEMPTS, FLAT_INTERVAL).await?;
    ensure!(state.is_flat(), "{} did not settle flat: {:?}", symbol, state);
    Ok(())
}

// =============================================================================
// Read-only scenarios
// =============================================================================

/// The settlement asset has a positive free balance.
pub async fn balance_is_positive<P: ExchangePort>(port: &P) -> Result<()> {
    let balance = port.get_balance("USDT").await?;
    ensure!(balance.free > Decimal::ZERO, "free USDT balance is {}", balance.free);
    Ok(())
}

/// No positions and no trigger orders on the fixture symbol.
pub async fn starts_flat<P: ExchangePort>(port: &P) -> Result<()> {
    let symbol = fixture_symbol()?;

    let triggers = port.get_trigger_orders(&symbol).await?;
    ensure!(triggers.is_empty(), "{} pending trigger orders", triggers.len());

    let positions = port.get_positions(&fixture_set()?).await?;
    ensure!(positions.is_empty(), "{} open positions", positions.len());
    Ok(())
}

/// Funding records are canonical, current and attributed to the port.
pub async fn funding_rates_are_current<P: ExchangePort>(port: &P) -> Result<()> {
    let rates = port.get_funding_usdt_rates(true).await?;
    ensure!(!rates.is_empty(), "empty funding batch");

    let now = Utc::now();
    for rate in &rates {
        let symbol = rate.symbol.to_string();
        ensure!(is_canonical_usdt(&symbol), "non-canonical symbol {}", symbol);
        ensure!(rate.funding_date > now, "{} funding date {} is not in the future", symbol, rate.funding_date);
        ensure!(rate.exchange == port.exchange_id(), "{} attributed to {}", symbol, rate.exchange);
    }
    Ok(())
}

/// Last traded price is non-zero.
pub async fn ticker_is_priced<P: ExchangePort>(port: &P) -> Result<()> {
    let symbol = CanonicalSymbol::parse(TICKER_SYMBOL)?;
    let ticker = port.get_ticker(&symbol).await?;
    ensure!(ticker.symbol == symbol, "ticker for {} returned {}", symbol, ticker.symbol);
    ensure!(!ticker.last_price.is_zero(), "{} last price is zero", symbol);
    Ok(())
}

/// Instrument constraints of the fixture symbol are usable.
pub async fn instrument_is_described<P: ExchangePort>(port: &P) -> Result<()> {
    let symbol = fixture_symbol()?;
    let instrument = port.get_instrument_info(&symbol).await?;

    ensure!(instrument.symbol == symbol, "instrument for {} is {}", symbol, instrument.symbol);
    ensure!(instrument.amount_precision != Decimal::ZERO, "zero amount precision");
    ensure!(instrument.price_precision != Decimal::ZERO, "zero price precision");
    ensure!(instrument.amount_precision > Decimal::ZERO, "negative amount precision");
    ensure!(instrument.price_precision > Decimal::ZERO, "negative price precision");
    ensure!(instrument.contract_size > Decimal::ZERO, "zero contract size");
    Ok(())
}

// =============================================================================
// Setter scenarios
// =============================================================================

/// Initialising the account twice with the same values succeeds both times.
pub async fn double_init_is_idempotent<P: ExchangePort>(port: &P) -> Result<()> {
    let symbol = fixture_symbol()?;
    let params = Params::from([("leverage".to_string(), json!(1))]);

    for round in 1..=2 {
        port.set_position_mode(false, Some(&symbol))
            .await
            .with_context(|| format!("position mode, round {}", round))?;
        port.set_margin_mode(MarginMode::Isolated, &symbol, Some(&params))
            .await
            .with_context(|| format!("margin mode, round {}", round))?;
        port.set_leverage(Leverage::new(1)?, &symbol)
            .await
            .with_context(|| format!("leverage, round {}", round))?;
    }
    Ok(())
}

/// Each setter works on its own, including an account-wide position mode.
pub async fn single_setters<P: ExchangePort>(port: &P) -> Result<()> {
    let symbol = fixture_symbol()?;
    port.set_position_mode(false, None).await?;
    port.set_margin_mode(MarginMode::Isolated, &symbol, None).await?;
    port.set_leverage(Leverage::new(2)?, &symbol).await?;
    Ok(())
}

// =============================================================================
// Trading scenarios
// =============================================================================

/// Closing when nothing is open places no orders.
pub async fn close_positions_when_flat<P: ExchangePort>(port: &P) -> Result<()> {
    let orders = port.close_positions(&fixture_set()?).await?;
    ensure!(orders.is_empty(), "placed {} close orders while flat", orders.len());
    Ok(())
}

/// Open with TP/SL at +20%/-10%, observe the pair, close, observe flat.
pub async fn tpsl_lifecycle<P: ExchangePort>(port: &P) -> Result<()> {
    let symbol = fixture_symbol()?;
    configure(port, MarginMode::Isolated, 3).await?;

    let last = port.get_ticker(&symbol).await?.last_price;
    let request = TpslRequest::market(
        symbol.clone(),
        OrderSide::Buy,
        fixture_amount()?,
        Price::new(last * dec!(1.2))?,
        Price::new(last * dec!(0.9))?,
    );
    port.create_tpsl_position(&request).await?;

    match observe_lifecycle(port, &symbol).await? {
        LifecycleState::OpenWithTriggers { position, .. } => {
            ensure!(position.leverage == 3, "leverage {}", position.leverage);
            ensure!(!position.hedged, "position is hedged");
            ensure!(position.margin_mode == MarginMode::Isolated, "margin mode {}", position.margin_mode);
        },
        other => bail!("expected one position with two triggers, observed {:?}", other),
    }

    let orders = port.close_positions(&fixture_set()?).await?;
    ensure!(orders.len() == 1, "placed {} close orders", orders.len());
    ensure_flat(port, &symbol).await
}

/// Open a market position, check it, close it reduce-only, check flat.
pub async fn full_cycle<P: ExchangePort>(port: &P, side: OrderSide, leverage: u32) -> Result<()> {
    let symbol = fixture_symbol()?;
    configure(port, MarginMode::Isolated, leverage).await?;

    port.create_order(&symbol, side, OrderType::Market, fixture_amount()?, None)
        .await?;

    let positions = port.get_positions(&fixture_set()?).await?;
    ensure!(positions.len() == 1, "{} positions after {} entry", positions.len(), side);
    let position = &positions[0];
    ensure!(position.side.entry_side() == side, "{} entry opened a {} position", side, position.side);
    ensure!(position.contracts.as_decimal() > Decimal::ZERO, "no contracts");
    ensure!(position.entry_price > Decimal::ZERO, "no entry price");
    ensure!(position.notional > Decimal::ZERO, "no notional");
    ensure!(position.leverage == leverage, "leverage {} instead of {}", position.leverage, leverage);
    ensure!(!position.hedged, "position is hedged after one-way configuration");
    ensure!(
        position.margin_mode == MarginMode::Isolated,
        "margin mode {} instead of isolated",
        position.margin_mode
    );

    let orders = port.close_positions(&fixture_set()?).await?;
    ensure!(
        orders.iter().all(|o| o.reduce_only && o.side == side.opposite()),
        "close orders must be reduce-only on the {} side",
        side.opposite()
    );
    ensure_flat(port, &symbol).await
}

/// Long cycle at 2x.
pub async fn full_cycle_buy<P: ExchangePort>(port: &P) -> Result<()> {
    full_cycle(port, OrderSide::Buy, 2).await
}

/// Short cycle at 4x.
pub async fn full_cycle_sell<P: ExchangePort>(port: &P) -> Result<()> {
    full_cycle(port, OrderSide::Sell, 4).await
}

/// Generate one `#[tokio::test]` per contract scenario.
///
/// `$factory` is called once per test and must return a fresh port. The
/// calling crate needs `tokio` (with `test-util`) and `anyhow`.
#[macro_export]
macro_rules! contract_tests {
    ($factory:expr) => {
        $crate::contract_tests!(@case $factory, contract_balance_is_positive, balance_is_positive);
        $crate::contract_tests!(@case $factory, contract_starts_flat, starts_flat);
        $crate::contract_tests!(@case $factory, contract_funding_rates_are_current, funding_rates_are_current);
        $crate::contract_tests!(@case $factory, contract_ticker_is_priced, ticker_is_priced);
        $crate::contract_tests!(@case $factory, contract_instrument_is_described, instrument_is_described);
        $crate::contract_tests!(@case $factory, contract_double_init_is_idempotent, double_init_is_idempotent);
        $crate::contract_tests!(@case $factory, contract_single_setters, single_setters);
        $crate::contract_tests!(@case $factory, contract_close_positions_when_flat, close_positions_when_flat);
        $crate::contract_tests!(@case $factory, contract_tpsl_lifecycle, tpsl_lifecycle);
        $crate::contract_tests!(@case $factory, contract_full_cycle_buy, full_cycle_buy);
        $crate::contract_tests!(@case $factory, contract_full_cycle_sell, full_cycle_sell);
    };
    (@case $factory:expr, $name:ident, $scenario:ident) => {
        #[tokio::test(start_paused = true)]
        async fn $name() -> ::anyhow::Result<()> {
            $crate::contract::run(($factory)(), |port| {
                Box::pin($crate::contract::$scenario(port))
            })
            .await
        }
    };
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_usdt_shape() {
        assert!(is_canonical_usdt("BTC/USDT:USDT"));
        assert!(is_canonical_usdt("1000PEPE/USDT:USDT"));
        assert!(!is_canonical_usdt("btc/USDT:USDT"));
        assert!(!is_canonical_usdt("BTC/USDT"));
        assert!(!is_canonical_usdt("/USDT:USDT"));
        assert!(!is_canonical_usdt(&format!("{}/USDT:USDT", "A".repeat(33))));
    }
}
