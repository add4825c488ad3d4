//! Funding-rate selection.
//!
//! Pure part of `get_funding_usdt_rates`: validate every raw record, keep only
//! forward-looking ones, optionally restrict to tradable swaps, and refuse to
//! return an empty result.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use tracing::warn;

use tradeport_domain::{
    normalize_funding_rate, CanonicalSymbol, DomainError, FundingRateRecord, Market, PortResult,
    QuoteFamily, RawFundingRate,
};

/// Symbols of swaps that settle in `family` and currently accept orders.
///
/// Computed per call from freshly loaded markets.
pub fn active_swap_symbols<'a>(
    markets: impl IntoIterator<Item = &'a Market>,
    family: QuoteFamily,
) -> BTreeSet<CanonicalSymbol> {
    markets
        .into_iter()
        .filter(|m| m.swap && m.active && m.symbol().settle() == family.settle)
        .map(|m| m.symbol().clone())
        .collect()
}

/// Validate and filter a raw funding batch.
///
/// Records keep their arrival order.
///
/// # Errors
/// - `RateUnavailable` naming the raw symbol of the first invalid record
/// - `RateUnavailable` naming the family wildcard if nothing remains
pub fn select_funding_rates(
    raw: &[RawFundingRate],
    exchange: &str,
    family: QuoteFamily,
    now: DateTime<Utc>,
    active: Option<&BTreeSet<CanonicalSymbol>>,
) -> PortResult<Vec<FundingRateRecord>> {
    let mut selected = Vec::with_capacity(raw.len());
    let mut stale = 0usize;

    for record in raw {
        let record = normalize_funding_rate(record, exchange, family)
            .map_err(|e| DomainError::RateUnavailable(e.context().clone()))?;

        if record.funding_date <= now {
            stale += 1;
            continue;
        }
        if active.is_some_and(|symbols| !symbols.contains(&record.symbol)) {
            continue;
        }
        selected.push(record);
    }

    if stale > 0 {
        warn!(exchange, stale, "Dropped funding records not in the future");
    }

    if selected.is_empty() {
        return Err(DomainError::rate_unavailable(
            exchange,
            family.wildcard(),
            format!("no current funding data among {} records", raw.len()),
        ));
    }

    Ok(selected)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use tradeport_domain::{ErrorKind, Instrument, RawDecimal, RawTimestamp};

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_700_000_000_000).unwrap()
    }

    fn raw(symbol: &str, rate: &str, at: DateTime<Utc>) -> RawFundingRate {
        RawFundingRate {
            symbol: symbol.to_string(),
            funding_rate: RawDecimal::from(rate),
            funding_date: RawTimestamp::Text(at.timestamp_millis().to_string()),
        }
    }

    fn market(symbol: &str, swap: bool, active: bool) -> Market {
        let symbol = CanonicalSymbol::parse(symbol).unwrap();
        Market {
            id: symbol.market_id(),
            swap,
            active,
            instrument: Instrument {
                symbol,
                amount_precision: Decimal::ONE,
                price_precision: dec!(0.0001),
                contract_size: Decimal::ONE,
                min_amount: None,
            },
        }
    }

    #[test]
    fn test_future_only_filter() {
        let batch = [
            raw("BTCUSDT", "0.0001", now() + Duration::hours(8)),
            raw("ETHUSDT", "0.0002", now()),
            raw("XRPUSDT", "0.0003", now() - Duration::seconds(1)),
            raw("SOLUSDT", "0.0004", now() + Duration::milliseconds(1)),
        ];

        let records = select_funding_rates(&batch, "bitget", QuoteFamily::USDT, now(), None).unwrap();
        let symbols: Vec<String> = records.iter().map(|r| r.symbol.to_string()).collect();

        assert_eq!(symbols, vec!["BTC/USDT:USDT", "SOL/USDT:USDT"]);
        assert_eq!(records[0].funding_rate, dec!(0.0001));
    }

    #[test]
    fn test_empty_result_is_rate_unavailable() {
        let batch = [raw("BTCUSDT", "0.0001", now())];

        let err = select_funding_rates(&batch, "bitget", QuoteFamily::USDT, now(), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateUnavailable);
        assert_eq!(err.symbol(), Some("*/USDT"));

        let err = select_funding_rates(&[], "bitget", QuoteFamily::USDT, now(), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateUnavailable);
    }

    #[test]
    fn test_invalid_record_names_symbol() {
        let batch = [
            raw("BTCUSDT", "0.0001", now() + Duration::hours(1)),
            raw("ETHUSDT", "not-a-number", now() + Duration::hours(1)),
        ];

        let err = select_funding_rates(&batch, "bitget", QuoteFamily::USDT, now(), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateUnavailable);
        assert_eq!(err.symbol(), Some("ETHUSDT"));
    }

    #[test]
    fn test_active_filter() {
        let markets = [
            market("BTC/USDT:USDT", true, true),
            market("ETH/USDT:USDT", true, false),
            market("XRP/USDT:USDT", false, true),
        ];
        let active = active_swap_symbols(&markets, QuoteFamily::USDT);
        assert_eq!(active.len(), 1);

        let later = now() + Duration::hours(1);
        let batch = [
            raw("BTCUSDT", "0.0001", later),
            raw("ETHUSDT", "0.0001", later),
            raw("XRPUSDT", "0.0001", later),
        ];

        let records =
            select_funding_rates(&batch, "bitget", QuoteFamily::USDT, now(), Some(&active)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].symbol.to_string(), "BTC/USDT:USDT");
    }
}
