//! Value Objects for the Tradeport Domain
//!
//! Immutable, validated domain primitives.
//! All value objects enforce invariants at construction time.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Errors raised when a value object cannot be constructed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    /// Price must be positive
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    /// Quantity must be positive
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    /// Symbol must be a valid canonical instrument
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Leverage outside the supported range
    #[error("Invalid leverage: {0}")]
    InvalidLeverage(String),

    /// Timestamp could not be interpreted as a UTC instant
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Decimal field could not be parsed exactly
    #[error("Invalid decimal: {0}")]
    InvalidDecimal(String),

    /// Unknown enum variant in a raw payload
    #[error("Invalid variant: {0}")]
    InvalidVariant(String),
}

// =============================================================================
// Price
// =============================================================================

/// Price represents a positive decimal price
///
/// # Invariants
/// - Must be > 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Price(Decimal);

impl Price {
    /// Create a new Price with validation
    ///
    /// # Errors
    /// Returns `ValueError::InvalidPrice` if value <= 0
    pub fn new(value: Decimal) -> Result<Self, ValueError> {
        if value <= Decimal::ZERO {
            return Err(ValueError::InvalidPrice(format!("Price must be positive, got {}", value)));
        }
        Ok(Self(value))
    }

    /// Get the underlying Decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Quantity
// =============================================================================

/// Quantity represents a positive decimal amount of contracts
///
/// # Invariants
/// - Must be > 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Quantity(Decimal);

impl Quantity {
    /// Create a new Quantity with validation
    ///
    /// # Errors
    /// Returns `ValueError::InvalidQuantity` if value <= 0
    pub fn new(value: Decimal) -> Result<Self, ValueError> {
        if value <= Decimal::ZERO {
            return Err(ValueError::InvalidQuantity(format!(
                "Quantity must be positive, got {}",
                value
            )));
        }
        Ok(Self(value))
    }

    /// Get the underlying Decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Leverage
// =============================================================================

/// Leverage multiplier for a derivatives position
///
/// # Invariants
/// - 1 <= value <= `Leverage::MAX`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Leverage(u32);

impl Leverage {
    /// Highest multiplier any supported venue accepts
    pub const MAX: u32 = 125;

    /// Create a new Leverage with validation
    ///
    /// # Errors
    /// Returns `ValueError::InvalidLeverage` if value is 0 or above `MAX`
    pub fn new(value: u32) -> Result<Self, ValueError> {
        if value == 0 || value > Self::MAX {
            return Err(ValueError::InvalidLeverage(format!(
                "Leverage must be between 1 and {}, got {}",
                Self::MAX,
                value
            )));
        }
        Ok(Self(value))
    }

    /// Get the multiplier
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Leverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0)
    }
}

// =============================================================================
// CanonicalSymbol
// =============================================================================

/// Canonical derivatives symbol in `BASE/QUOTE:SETTLE` form (e.g. `BTC/USDT:USDT`)
///
/// # Invariants
/// - Every currency code matches `[A-Z0-9]{1,32}`
/// - Base differs from quote
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CanonicalSymbol {
    base: String,
    quote: String,
    settle: String,
}

impl CanonicalSymbol {
    /// Create a symbol from its three currency codes
    ///
    /// # Errors
    /// Returns `ValueError::InvalidSymbol` if a code is malformed
    pub fn new(
        base: impl Into<String>,
        quote: impl Into<String>,
        settle: impl Into<String>,
    ) -> Result<Self, ValueError> {
        let base = base.into();
        let quote = quote.into();
        let settle = settle.into();

        for code in [&base, &quote, &settle] {
            if !is_currency_code(code) {
                return Err(ValueError::InvalidSymbol(format!(
                    "Currency code must match [A-Z0-9]{{1,32}}, got '{}'",
                    code
                )));
            }
        }
        if base == quote {
            return Err(ValueError::InvalidSymbol(format!(
                "Base and quote must differ, got {}/{}",
                base, quote
            )));
        }

        Ok(Self { base, quote, settle })
    }

    /// Parse an already-canonical `BASE/QUOTE:SETTLE` string
    ///
    /// # Examples
    /// ```
    /// # use tradeport_domain::value_objects::CanonicalSymbol;
    /// let symbol = CanonicalSymbol::parse("BTC/USDT:USDT").unwrap();
    /// assert_eq!(symbol.base(), "BTC");
    /// assert_eq!(symbol.market_id(), "BTCUSDT");
    /// ```
    ///
    /// # Errors
    /// Returns `ValueError::InvalidSymbol` if the string is not canonical
    pub fn parse(raw: &str) -> Result<Self, ValueError> {
        let invalid = || ValueError::InvalidSymbol(format!("Expected BASE/QUOTE:SETTLE, got '{}'", raw));

        let (pair, settle) = raw.split_once(':').ok_or_else(invalid)?;
        let (base, quote) = pair.split_once('/').ok_or_else(invalid)?;
        Self::new(base, quote, settle)
    }

    /// Get the base currency
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Get the quote currency
    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Get the settlement currency
    pub fn settle(&self) -> &str {
        &self.settle
    }

    /// Exchange-native concatenated id (e.g. `BTCUSDT`)
    pub fn market_id(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }
}

fn is_currency_code(code: &str) -> bool {
    (1..=32).contains(&code.len())
        && code.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

impl fmt::Display for CanonicalSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.base, self.quote, self.settle)
    }
}

impl FromStr for CanonicalSymbol {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CanonicalSymbol {
    type Error = ValueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CanonicalSymbol> for String {
    fn from(symbol: CanonicalSymbol) -> Self {
        symbol.to_string()
    }
}

// =============================================================================
// Sides
// =============================================================================

/// OrderSide represents the order direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    /// Buy order
    Buy,
    /// Sell order
    Sell,
}

impl OrderSide {
    /// The side that reduces a position opened with this side
    pub fn opposite(&self) -> OrderSide {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }

    /// Lower-case wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderSide {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buy" => Ok(OrderSide::Buy),
            "sell" => Ok(OrderSide::Sell),
            other => Err(ValueError::InvalidVariant(format!("order side '{}'", other))),
        }
    }
}

/// PositionSide represents the position direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSide {
    /// Long position
    Long,
    /// Short position
    Short,
}

impl PositionSide {
    /// Long → Buy, Short → Sell
    pub fn entry_side(&self) -> OrderSide {
        match self {
            PositionSide::Long => OrderSide::Buy,
            PositionSide::Short => OrderSide::Sell,
        }
    }

    /// Long → Sell, Short → Buy
    pub fn exit_side(&self) -> OrderSide {
        self.entry_side().opposite()
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionSide::Long => write!(f, "long"),
            PositionSide::Short => write!(f, "short"),
        }
    }
}

// =============================================================================
// Order type, margin mode, trigger kind, market type
// =============================================================================

/// OrderType for entries and exits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// Fill immediately at the best available price
    Market,
    /// Rest on the book at a limit price
    Limit,
}

impl OrderType {
    /// Lower-case wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "market",
            OrderType::Limit => "limit",
        }
    }
}

impl FromStr for OrderType {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "market" => Ok(OrderType::Market),
            "limit" => Ok(OrderType::Limit),
            other => Err(ValueError::InvalidVariant(format!("order type '{}'", other))),
        }
    }
}

/// MarginMode of a derivatives position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginMode {
    /// Margin ring-fenced per position
    Isolated,
    /// Margin shared across positions
    Cross,
}

impl MarginMode {
    /// Canonical lower-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            MarginMode::Isolated => "isolated",
            MarginMode::Cross => "cross",
        }
    }
}

impl fmt::Display for MarginMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarginMode {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "isolated" => Ok(MarginMode::Isolated),
            "cross" | "crossed" => Ok(MarginMode::Cross),
            other => Err(ValueError::InvalidVariant(format!("margin mode '{}'", other))),
        }
    }
}

/// Kind of a take-profit/stop-loss trigger order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Closes the position in profit
    TakeProfit,
    /// Closes the position at a loss
    StopLoss,
}

/// Default market family a connection trades
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketType {
    /// Spot market
    Spot,
    /// Perpetual swaps
    #[default]
    Swap,
}

impl MarketType {
    /// Lower-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketType::Spot => "spot",
            MarketType::Swap => "swap",
        }
    }
}

impl FromStr for MarketType {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "spot" => Ok(MarketType::Spot),
            "swap" => Ok(MarketType::Swap),
            other => Err(ValueError::InvalidVariant(format!("market type '{}'", other))),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_price_must_be_positive() {
        assert!(Price::new(dec!(0.5)).is_ok());
        assert!(Price::new(Decimal::ZERO).is_err());
        assert!(Price::new(dec!(-1)).is_err());
    }

    #[test]
    fn test_quantity_must_be_positive() {
        assert_eq!(Quantity::new(dec!(5)).unwrap().as_decimal(), dec!(5));
        assert!(matches!(Quantity::new(Decimal::ZERO), Err(ValueError::InvalidQuantity(_))));
    }

    #[test]
    fn test_leverage_bounds() {
        assert_eq!(Leverage::new(3).unwrap().value(), 3);
        assert!(Leverage::new(0).is_err());
        assert!(Leverage::new(Leverage::MAX + 1).is_err());
        assert_eq!(Leverage::new(10).unwrap().to_string(), "10x");
    }

    #[test]
    fn test_canonical_symbol_parse_and_display() {
        let symbol = CanonicalSymbol::parse("XRP/USDT:USDT").unwrap();

        assert_eq!(symbol.base(), "XRP");
        assert_eq!(symbol.quote(), "USDT");
        assert_eq!(symbol.settle(), "USDT");
        assert_eq!(symbol.market_id(), "XRPUSDT");
        assert_eq!(symbol.to_string(), "XRP/USDT:USDT");
    }

    #[test]
    fn test_canonical_symbol_rejects_non_canonical() {
        assert!(CanonicalSymbol::parse("BTCUSDT").is_err());
        assert!(CanonicalSymbol::parse("BTC/USDT").is_err());
        assert!(CanonicalSymbol::parse("btc/USDT:USDT").is_err());
        assert!(CanonicalSymbol::parse("USDT/USDT:USDT").is_err());
        assert!(CanonicalSymbol::parse("/USDT:USDT").is_err());
    }

    #[test]
    fn test_canonical_symbol_serde_as_string() {
        let symbol = CanonicalSymbol::parse("1000PEPE/USDT:USDT").unwrap();
        let json = serde_json::to_string(&symbol).unwrap();
        assert_eq!(json, "\"1000PEPE/USDT:USDT\"");

        let back: CanonicalSymbol = serde_json::from_str(&json).unwrap();
        assert_eq!(back, symbol);
        assert!(serde_json::from_str::<CanonicalSymbol>("\"PEPEUSDT\"").is_err());
    }

    #[test]
    fn test_sides() {
        assert_eq!(OrderSide::Buy.opposite(), OrderSide::Sell);
        assert_eq!(PositionSide::Long.exit_side(), OrderSide::Sell);
        assert_eq!(PositionSide::Short.exit_side(), OrderSide::Buy);
        assert_eq!("SELL".parse::<OrderSide>().unwrap(), OrderSide::Sell);
    }

    #[test]
    fn test_margin_mode_accepts_exchange_spelling() {
        assert_eq!("crossed".parse::<MarginMode>().unwrap(), MarginMode::Cross);
        assert_eq!("Isolated".parse::<MarginMode>().unwrap(), MarginMode::Isolated);
        assert!("portfolio".parse::<MarginMode>().is_err());
    }
}
