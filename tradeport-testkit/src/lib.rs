//! Test kit for Tradeport exchange ports.
//!
//! Provides the exchange-independent contract suite and an in-memory Bitget
//! venue so the suite runs offline.

pub mod contract;
pub mod sim;

pub use contract::{fixture_symbol, is_canonical_usdt, FIXTURE_AMOUNT, FIXTURE_SYMBOL};
pub use sim::BitgetSimulator;

use tradeport_connectors::BitgetExchange;
use tradeport_exec::RateLimiter;

/// Bitget binding wired to a freshly seeded simulator.
pub fn simulated_bitget() -> BitgetExchange<BitgetSimulator> {
    bitget_on(BitgetSimulator::new())
}

/// Bitget binding wired to a prepared simulator at the default rate limit.
pub fn bitget_on(simulator: BitgetSimulator) -> BitgetExchange<BitgetSimulator> {
    BitgetExchange::new(simulator, RateLimiter::default())
}
