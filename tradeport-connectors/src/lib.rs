//! Tradeport Exchange Connectors
//!
//! Bindings of the exchange port to concrete venues.
//! Normalizes exchange-specific payloads to domain types.

#![warn(clippy::all)]

// Public modules
pub mod bitget;
pub mod bitget_rest;
pub mod bitget_types;

// Re-exports
pub use bitget::{codes, endpoints, rejection_policy, BitgetExchange, PRODUCT_TYPE};
pub use bitget_rest::{BitgetRestClient, REQUEST_TIMEOUT_SECS, SUCCESS_CODE};
pub use bitget_types::{
    BitgetAccount, BitgetContract, BitgetEnvelope, BitgetFundRate, BitgetPlacedOrder,
    BitgetPlanOrder, BitgetPlanOrders, BitgetPosition, BitgetSymbolAccount, BitgetTicker,
};
