//! Tradeport Domain Layer
//!
//! Exchange-neutral types shared by every port and binding, with zero I/O.
//! Contains value objects, entities, the port error taxonomy, and the
//! normalizers that turn raw exchange fields into validated values.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Public modules
pub mod config;
pub mod entities;
pub mod error;
pub mod normalize;
pub mod value_objects;

// Re-export commonly used types
pub use config::ClientConfig;
pub use entities::{
    Balance, FundingRateRecord, Instrument, Market, Order, OrderParams, Params, Position,
    Ticker, TpslRequest, TriggerOrder,
};
pub use error::{DomainError, ErrorContext, ErrorKind, PortResult, ANY_USDT_SYMBOL};
pub use normalize::{
    canonical_symbol, exact_decimal, normalize_funding_rate, normalize_instrument,
    utc_timestamp, QuoteFamily, RawDecimal, RawFundingRate, RawTimestamp,
};
pub use value_objects::{
    CanonicalSymbol, Leverage, MarginMode, MarketType, OrderSide, OrderType, PositionSide,
    Price, Quantity, TriggerKind, ValueError,
};
