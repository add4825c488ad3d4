//! Normalizer/Validator
//!
//! Turns raw exchange payload fields into typed domain values:
//!
//! - symbols in any of the usual exchange notations → [`CanonicalSymbol`]
//! - millisecond Unix timestamps (number or digit string) → `DateTime<Utc>`
//! - decimal fields (string, integer or JSON number) → exact [`Decimal`]
//!
//! Nothing here performs I/O. Bindings deserialize raw payloads into their own
//! strict schema structs using [`RawDecimal`] and [`RawTimestamp`] for the
//! loosely-typed fields, then hand them to these functions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::entities::{FundingRateRecord, Instrument};
use crate::error::DomainError;
use crate::value_objects::{CanonicalSymbol, ValueError};

/// Largest decimal precision an instrument may declare.
pub const MAX_PRECISION: u32 = 18;

// =============================================================================
// Raw field types
// =============================================================================

/// Decimal field as exchanges send it: text or a JSON number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawDecimal {
    /// "0.0001"
    Text(String),
    /// 0.0001 (kept in its textual JSON form)
    Number(serde_json::Number),
}

impl From<&str> for RawDecimal {
    fn from(value: &str) -> Self {
        RawDecimal::Text(value.to_string())
    }
}

/// Timestamp field as exchanges send it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    /// Milliseconds since the Unix epoch
    Millis(i64),
    /// Already timezone-aware instant (RFC 3339 with offset)
    Aware(DateTime<Utc>),
    /// Milliseconds as a digit string
    Text(String),
}

/// Quote/settlement pair a normalizer targets (e.g. USDT-settled linear swaps).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteFamily {
    /// Quote currency
    pub quote: &'static str,
    /// Settlement currency
    pub settle: &'static str,
}

impl QuoteFamily {
    /// USDT-quoted, USDT-settled perpetual swaps.
    pub const USDT: QuoteFamily = QuoteFamily { quote: "USDT", settle: "USDT" };

    /// Wildcard symbol naming the whole family (e.g. `*/USDT`).
    pub fn wildcard(&self) -> String {
        format!("*/{}", self.quote)
    }
}

/// Raw funding-rate record in exchange-neutral shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFundingRate {
    /// Symbol in any supported notation
    pub symbol: String,
    /// Funding rate
    pub funding_rate: RawDecimal,
    /// Next funding time
    pub funding_date: RawTimestamp,
}

// =============================================================================
// Field normalizers
// =============================================================================

/// Normalize a symbol to `BASE/QUOTE:SETTLE`.
///
/// Accepts `BASE`, `BASEQUOTE`, `BASE:SETTLE`, `BASE/QUOTE` and
/// `BASE/QUOTE:SETTLE`, case-insensitively.
///
/// # Examples
/// ```
/// # use tradeport_domain::normalize::{canonical_symbol, QuoteFamily};
/// for raw in ["BTC", "BTCUSDT", "BTC:USDT", "BTC/USDT:USDT"] {
///     let symbol = canonical_symbol(raw, QuoteFamily::USDT).unwrap();
///     assert_eq!(symbol.to_string(), "BTC/USDT:USDT");
/// }
/// ```
///
/// # Errors
/// Returns `ValueError::InvalidSymbol` for a foreign settlement marker or a
/// malformed base.
pub fn canonical_symbol(raw: &str, family: QuoteFamily) -> Result<CanonicalSymbol, ValueError> {
    let upper = raw.trim().to_ascii_uppercase();

    let pair = match upper.split_once(':') {
        Some((pair, settle)) if settle == family.settle => pair,
        Some((_, settle)) => {
            return Err(ValueError::InvalidSymbol(format!(
                "'{}' settles in {}, expected {}",
                raw, settle, family.settle
            )))
        },
        None => upper.as_str(),
    };

    let (base, quote) = match pair.split_once('/') {
        Some((base, quote)) => (base, quote),
        None => match pair.strip_suffix(family.quote) {
            Some(base) if !base.is_empty() => (base, family.quote),
            _ => (pair, family.quote),
        },
    };

    CanonicalSymbol::new(base, quote, family.settle)
}

/// Normalize a timestamp to UTC.
///
/// # Errors
/// Returns `ValueError::InvalidTimestamp` for negative, out-of-range or
/// non-numeric millisecond values.
pub fn utc_timestamp(raw: &RawTimestamp) -> Result<DateTime<Utc>, ValueError> {
    let millis = match raw {
        RawTimestamp::Aware(instant) => return Ok(*instant),
        RawTimestamp::Millis(ms) => *ms,
        RawTimestamp::Text(text) => text.trim().parse::<i64>().map_err(|_| {
            ValueError::InvalidTimestamp(format!("'{}' is not a millisecond timestamp", text))
        })?,
    };

    if millis < 0 {
        return Err(ValueError::InvalidTimestamp(format!("negative timestamp {}", millis)));
    }

    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| ValueError::InvalidTimestamp(format!("timestamp {} out of range", millis)))
}

/// Parse a decimal field exactly, never through binary floating point.
///
/// # Errors
/// Returns `ValueError::InvalidDecimal` if the text is not a decimal number.
pub fn exact_decimal(raw: &RawDecimal) -> Result<Decimal, ValueError> {
    let text = match raw {
        RawDecimal::Text(text) => text.trim().to_string(),
        RawDecimal::Number(number) => number.to_string(),
    };

    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| ValueError::InvalidDecimal(format!("'{}' is not a decimal", text)))
}

// =============================================================================
// Record normalizers
// =============================================================================

/// Validate one raw funding record.
///
/// # Errors
/// Returns `DomainError::ValidationFailure` naming the raw symbol when any
/// field fails coercion. The caller decides how that affects the batch.
pub fn normalize_funding_rate(
    raw: &RawFundingRate,
    exchange: &str,
    family: QuoteFamily,
) -> Result<FundingRateRecord, DomainError> {
    let fail = |err: ValueError| DomainError::validation(exchange, Some(raw.symbol.as_str()), err);

    Ok(FundingRateRecord {
        symbol: canonical_symbol(&raw.symbol, family).map_err(fail)?,
        exchange: exchange.to_string(),
        funding_rate: exact_decimal(&raw.funding_rate).map_err(fail)?,
        funding_date: utc_timestamp(&raw.funding_date).map_err(fail)?,
    })
}

/// Validate raw instrument constraints.
///
/// `amount_places` and `price_places` are decimal-place counts as exchanges
/// publish them; the instrument stores the matching increment (`0` places
/// gives a step of `1`).
///
/// # Errors
/// Returns `DomainError::ValidationFailure` if a place count is negative,
/// fractional or above [`MAX_PRECISION`], or the contract size is not positive.
pub fn normalize_instrument(
    symbol: CanonicalSymbol,
    amount_places: &RawDecimal,
    price_places: &RawDecimal,
    contract_size: Decimal,
    min_amount: Option<&RawDecimal>,
    exchange: &str,
) -> Result<Instrument, DomainError> {
    let label = symbol.to_string();
    let fail = |err: ValueError| DomainError::validation(exchange, Some(label.as_str()), err);

    let increment = |raw: &RawDecimal| -> Result<Decimal, ValueError> {
        let value = exact_decimal(raw)?;
        if !value.fract().is_zero() || value < Decimal::ZERO {
            return Err(ValueError::InvalidDecimal(format!("precision {} is not a count", value)));
        }
        let places = u32::try_from(value.mantissa() / 10i128.pow(value.scale()))
            .map_err(|_| ValueError::InvalidDecimal(format!("precision {} out of range", value)))?;
        if places > MAX_PRECISION {
            return Err(ValueError::InvalidDecimal(format!(
                "precision {} exceeds {}",
                places, MAX_PRECISION
            )));
        }
        Ok(Decimal::new(1, places))
    };

    if contract_size <= Decimal::ZERO {
        return Err(fail(ValueError::InvalidQuantity(format!(
            "contract size must be positive, got {}",
            contract_size
        ))));
    }

    let min_amount = min_amount.map(exact_decimal).transpose().map_err(fail)?;

    Ok(Instrument {
        amount_precision: increment(amount_places).map_err(fail)?,
        price_precision: increment(price_places).map_err(fail)?,
        contract_size,
        min_amount,
        symbol,
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use rust_decimal_macros::dec;

    #[test]
    fn test_symbol_canonicalization_all_forms() {
        for raw in ["XRP", "XRPUSDT", "XRP:USDT", "XRP/USDT:USDT", "XRP/USDT", "xrpusdt", " XRP "] {
            let symbol = canonical_symbol(raw, QuoteFamily::USDT).unwrap();
            assert_eq!(symbol.to_string(), "XRP/USDT:USDT", "raw form {:?}", raw);
        }
    }

    #[test]
    fn test_symbol_with_digits() {
        let symbol = canonical_symbol("1000PEPEUSDT", QuoteFamily::USDT).unwrap();
        assert_eq!(symbol.to_string(), "1000PEPE/USDT:USDT");
    }

    #[test]
    fn test_symbol_foreign_settlement_rejected() {
        assert!(canonical_symbol("BTC/USD:BTC", QuoteFamily::USDT).is_err());
    }

    #[test]
    fn test_symbol_malformed_rejected() {
        assert!(canonical_symbol("", QuoteFamily::USDT).is_err());
        assert!(canonical_symbol("BTC-PERP", QuoteFamily::USDT).is_err());
        assert!(canonical_symbol("USDT", QuoteFamily::USDT).is_err());
    }

    #[test]
    fn test_timestamp_is_utc() {
        for raw in [
            RawTimestamp::Millis(1_700_000_000_000),
            RawTimestamp::Text("1700000000000".to_string()),
        ] {
            let ts = utc_timestamp(&raw).unwrap();
            assert_eq!(ts.timestamp_millis(), 1_700_000_000_000);
            assert_eq!(ts.timezone(), Utc);
        }
    }

    #[test]
    fn test_timestamp_aware_passes_through() {
        let raw: RawTimestamp = serde_json::from_str("\"2024-03-01T10:00:00+02:00\"").unwrap();
        let ts = utc_timestamp(&raw).unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-03-01T08:00:00+00:00");
    }

    #[test]
    fn test_timestamp_invalid() {
        assert!(utc_timestamp(&RawTimestamp::Millis(-1)).is_err());
        assert!(utc_timestamp(&RawTimestamp::Text("soon".to_string())).is_err());
        assert!(serde_json::from_str::<RawTimestamp>("1.5e12").is_err());
    }

    #[test]
    fn test_decimal_exact_forms() {
        let from_text = exact_decimal(&RawDecimal::from("0.000125")).unwrap();
        let from_number: RawDecimal = serde_json::from_str("0.000125").unwrap();
        let from_sci = exact_decimal(&RawDecimal::from("1.25e-4")).unwrap();

        assert_eq!(from_text, dec!(0.000125));
        assert_eq!(exact_decimal(&from_number).unwrap(), dec!(0.000125));
        assert_eq!(from_sci, dec!(0.000125));
        assert!(exact_decimal(&RawDecimal::from("n/a")).is_err());
    }

    #[test]
    fn test_normalize_funding_rate() {
        let raw = RawFundingRate {
            symbol: "ETHUSDT".to_string(),
            funding_rate: RawDecimal::from("-0.0003"),
            funding_date: RawTimestamp::Text("1700000000000".to_string()),
        };

        let record = normalize_funding_rate(&raw, "bitget", QuoteFamily::USDT).unwrap();
        assert_eq!(record.symbol.to_string(), "ETH/USDT:USDT");
        assert_eq!(record.exchange, "bitget");
        assert_eq!(record.funding_rate, dec!(-0.0003));
    }

    #[test]
    fn test_normalize_funding_rate_names_offending_symbol() {
        let raw = RawFundingRate {
            symbol: "ETHUSDT".to_string(),
            funding_rate: RawDecimal::from(""),
            funding_date: RawTimestamp::Millis(1_700_000_000_000),
        };

        let err = normalize_funding_rate(&raw, "bitget", QuoteFamily::USDT).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailure);
        assert_eq!(err.symbol(), Some("ETHUSDT"));
    }

    #[test]
    fn test_normalize_instrument() {
        let symbol = CanonicalSymbol::parse("BTC/USDT:USDT").unwrap();
        let instrument = normalize_instrument(
            symbol,
            &RawDecimal::from("4"),
            &RawDecimal::from("1"),
            Decimal::ONE,
            Some(&RawDecimal::from("0.0001")),
            "bitget",
        )
        .unwrap();

        assert_eq!(instrument.amount_precision, dec!(0.0001));
        assert_eq!(instrument.price_precision, dec!(0.1));
        assert_eq!(instrument.min_amount, Some(dec!(0.0001)));
    }

    #[test]
    fn test_zero_places_is_a_whole_step() {
        let symbol = CanonicalSymbol::parse("XRP/USDT:USDT").unwrap();
        let instrument = normalize_instrument(
            symbol,
            &RawDecimal::from("0"),
            &RawDecimal::from("4"),
            Decimal::ONE,
            Some(&RawDecimal::from("1")),
            "bitget",
        )
        .unwrap();

        assert_eq!(instrument.amount_precision, Decimal::ONE);
        assert_eq!(instrument.price_precision, dec!(0.0001));
        assert!(instrument.amount_precision > Decimal::ZERO);
    }

    #[test]
    fn test_normalize_instrument_rejects_bad_precision() {
        let symbol = CanonicalSymbol::parse("BTC/USDT:USDT").unwrap();
        let err = normalize_instrument(
            symbol,
            &RawDecimal::from("0.5"),
            &RawDecimal::from("1"),
            Decimal::ONE,
            None,
            "bitget",
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ValidationFailure);
        assert_eq!(err.symbol(), Some("BTC/USDT:USDT"));
    }
}
