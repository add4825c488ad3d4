//! Domain Entities for the Tradeport Domain
//!
//! Value snapshots returned by exchange ports. None of them hold a reference
//! to exchange state; each query produces a fresh copy.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::value_objects::{
    CanonicalSymbol, Leverage, MarginMode, OrderSide, OrderType, PositionSide, Price, Quantity,
    TriggerKind,
};

/// Raw key/value overrides merged into an exchange request body.
pub type Params = BTreeMap<String, serde_json::Value>;

// =============================================================================
// Funding Rate
// =============================================================================

/// Validated funding rate for one perpetual instrument.
///
/// # Invariants
/// - `funding_date` is UTC
/// - `symbol` is canonical `BASE/QUOTE:SETTLE`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingRateRecord {
    /// Canonical instrument symbol
    pub symbol: CanonicalSymbol,
    /// Exchange identifier
    pub exchange: String,
    /// Funding rate as a fraction (0.0001 = 0.01%)
    pub funding_rate: Decimal,
    /// Next funding settlement time
    pub funding_date: DateTime<Utc>,
}

// =============================================================================
// Market metadata
// =============================================================================

/// Trading constraints of one instrument.
///
/// Precisions are increments, not decimal-place counts: an instrument traded
/// in whole contracts has `amount_precision == 1`, one quoted to four places
/// has `price_precision == 0.0001`.
///
/// # Invariants
/// - `amount_precision`, `price_precision` and `contract_size` are > 0
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    /// Canonical instrument symbol
    pub symbol: CanonicalSymbol,
    /// Smallest order amount increment
    pub amount_precision: Decimal,
    /// Smallest price increment
    pub price_precision: Decimal,
    /// Units of base currency per contract
    pub contract_size: Decimal,
    /// Smallest order amount, if the exchange publishes one
    pub min_amount: Option<Decimal>,
}

impl Instrument {
    /// Smallest amount increment
    pub fn amount_step(&self) -> Decimal {
        self.amount_precision
    }

    /// Smallest price increment
    pub fn price_tick(&self) -> Decimal {
        self.price_precision
    }

    /// Round an amount down to a multiple of the amount step.
    pub fn round_amount(&self, amount: Decimal) -> Decimal {
        ((amount / self.amount_precision).trunc() * self.amount_precision).normalize()
    }

    /// Round a price to the nearest multiple of the price tick.
    pub fn round_price(&self, price: Decimal) -> Decimal {
        ((price / self.price_precision).round() * self.price_precision).normalize()
    }
}

/// Market metadata entry, as loaded by `load_markets`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    /// Exchange-native id (e.g. "BTCUSDT")
    pub id: String,
    /// Whether this is a perpetual swap
    pub swap: bool,
    /// Whether the instrument currently accepts orders
    pub active: bool,
    /// Trading constraints
    pub instrument: Instrument,
}

impl Market {
    /// Canonical symbol of this market.
    pub fn symbol(&self) -> &CanonicalSymbol {
        &self.instrument.symbol
    }
}

// =============================================================================
// Quotes and balances
// =============================================================================

/// Last traded price snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticker {
    /// Canonical instrument symbol
    pub symbol: CanonicalSymbol,
    /// Last traded price
    pub last_price: Decimal,
}

/// Balance of one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Asset code (e.g. "USDT")
    pub asset: String,
    /// Amount available for new orders
    pub free: Decimal,
    /// Total equity in this asset
    pub total: Decimal,
}

// =============================================================================
// Position
// =============================================================================

/// Open derivatives position snapshot.
///
/// A position with zero contracts does not exist; ports return no entry
/// for it rather than a zero-sized record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Canonical instrument symbol
    pub symbol: CanonicalSymbol,
    /// Direction
    pub side: PositionSide,
    /// Open contracts (> 0)
    pub contracts: Quantity,
    /// Average entry price
    pub entry_price: Decimal,
    /// Position value in quote currency
    pub notional: Decimal,
    /// Leverage multiplier
    pub leverage: u32,
    /// Whether the account is in hedge (two-sided) position mode
    pub hedged: bool,
    /// Margin mode
    pub margin_mode: MarginMode,
}

impl Position {
    /// Side of the order that flattens this position.
    pub fn exit_side(&self) -> OrderSide {
        self.side.exit_side()
    }
}

// =============================================================================
// Orders
// =============================================================================

/// Caller overrides for `create_order`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderParams {
    /// Only decrease an existing position
    pub reduce_only: bool,
    /// Close-side offset (used by hedge mode)
    pub close: bool,
    /// Limit price
    pub price: Option<Decimal>,
    /// Client order id for idempotent submission
    pub client_order_id: Option<String>,
    /// Raw overrides merged into the request body last
    pub extra: Params,
}

impl OrderParams {
    /// Params for a reduce-only close order.
    pub fn close_position() -> Self {
        Self {
            reduce_only: true,
            close: true,
            ..Self::default()
        }
    }

    /// Set a limit price.
    pub fn with_price(mut self, price: Decimal) -> Self {
        self.price = Some(price);
        self
    }

    /// Set a client order id.
    pub fn with_client_order_id(mut self, id: impl Into<String>) -> Self {
        self.client_order_id = Some(id.into());
        self
    }

    /// Add a raw override.
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Order accepted by the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Exchange order id
    pub id: String,
    /// Client order id, if one was sent
    pub client_order_id: Option<String>,
    /// Canonical instrument symbol
    pub symbol: CanonicalSymbol,
    /// Direction
    pub side: OrderSide,
    /// Market or limit
    pub order_type: OrderType,
    /// Requested amount in contracts
    pub amount: Decimal,
    /// Limit price, if any
    pub price: Option<Decimal>,
    /// Whether the order can only reduce a position
    pub reduce_only: bool,
}

/// Request to open a position with bound take-profit and stop-loss triggers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TpslRequest {
    /// Canonical instrument symbol
    pub symbol: CanonicalSymbol,
    /// Entry order type
    pub order_type: OrderType,
    /// Entry side
    pub side: OrderSide,
    /// Entry amount in contracts
    pub amount: Quantity,
    /// Limit price, required for limit entries
    pub price: Option<Price>,
    /// Take-profit trigger price
    pub take_profit: Price,
    /// Stop-loss trigger price
    pub stop_loss: Price,
}

impl TpslRequest {
    /// Market entry with take-profit and stop-loss.
    pub fn market(
        symbol: CanonicalSymbol,
        side: OrderSide,
        amount: Quantity,
        take_profit: Price,
        stop_loss: Price,
    ) -> Self {
        Self {
            symbol,
            order_type: OrderType::Market,
            side,
            amount,
            price: None,
            take_profit,
            stop_loss,
        }
    }

    /// Check that the triggers bracket the entry in the right direction.
    ///
    /// Buy needs `stop_loss < take_profit`, sell needs `take_profit < stop_loss`.
    pub fn triggers_are_ordered(&self) -> bool {
        match self.side {
            OrderSide::Buy => self.stop_loss < self.take_profit,
            OrderSide::Sell => self.take_profit < self.stop_loss,
        }
    }
}

/// Pending take-profit or stop-loss trigger order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerOrder {
    /// Exchange order id
    pub id: String,
    /// Canonical instrument symbol
    pub symbol: CanonicalSymbol,
    /// Take-profit or stop-loss
    pub kind: TriggerKind,
    /// Side of the order placed when triggered, if reported
    pub side: Option<OrderSide>,
    /// Trigger price
    pub trigger_price: Decimal,
    /// Amount, if bound to a fixed size rather than the whole position
    pub amount: Option<Decimal>,
    /// Whether the triggered order only reduces the position
    pub reduce_only: bool,
}

/// Convenience: leverage as stored on positions.
impl From<Leverage> for u32 {
    fn from(leverage: Leverage) -> Self {
        leverage.value()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn xrp() -> CanonicalSymbol {
        CanonicalSymbol::parse("XRP/USDT:USDT").unwrap()
    }

    #[test]
    fn test_instrument_rounding() {
        let instrument = Instrument {
            symbol: xrp(),
            amount_precision: dec!(0.1),
            price_precision: dec!(0.0001),
            contract_size: Decimal::ONE,
            min_amount: Some(dec!(1)),
        };

        assert_eq!(instrument.amount_step(), dec!(0.1));
        assert_eq!(instrument.price_tick(), dec!(0.0001));
        assert_eq!(instrument.round_amount(dec!(5.19)), dec!(5.1));
        assert_eq!(instrument.round_price(dec!(0.523456)), dec!(0.5235));
    }

    #[test]
    fn test_instrument_rounding_whole_contracts() {
        let instrument = Instrument {
            symbol: xrp(),
            amount_precision: Decimal::ONE,
            price_precision: dec!(0.5),
            contract_size: Decimal::ONE,
            min_amount: None,
        };

        assert_eq!(instrument.round_amount(dec!(5.9)), dec!(5));
        assert_eq!(instrument.round_amount(dec!(0.9)), Decimal::ZERO);
        assert_eq!(instrument.round_price(dec!(10.3)), dec!(10.5));
        assert_eq!(instrument.round_amount(dec!(7)).to_string(), "7");
    }

    #[test]
    fn test_tpsl_trigger_ordering() {
        let mut request = TpslRequest {
            symbol: xrp(),
            order_type: OrderType::Market,
            side: OrderSide::Buy,
            amount: Quantity::new(dec!(5)).unwrap(),
            price: None,
            take_profit: Price::new(dec!(0.6)).unwrap(),
            stop_loss: Price::new(dec!(0.45)).unwrap(),
        };
        assert!(request.triggers_are_ordered());

        request.side = OrderSide::Sell;
        assert!(!request.triggers_are_ordered());
    }

    #[test]
    fn test_close_position_params() {
        let params = OrderParams::close_position().with_client_order_id("c-1");
        assert!(params.reduce_only);
        assert!(params.close);
        assert_eq!(params.client_order_id.as_deref(), Some("c-1"));
        assert!(params.extra.is_empty());
    }

    #[test]
    fn test_funding_record_serialization() {
        let record = FundingRateRecord {
            symbol: xrp(),
            exchange: "bitget".to_string(),
            funding_rate: dec!(0.0001),
            funding_date: chrono::DateTime::from_timestamp_millis(1_700_000_000_000).unwrap(),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["symbol"], "XRP/USDT:USDT");

        let back: FundingRateRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
