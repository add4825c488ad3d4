//! Tradeport Execution Layer
//!
//! The uniform exchange port and the cross-cutting layers every binding
//! composes around its raw calls.
//!
//! # Architecture
//!
//! ```text
//! Strategy → ExchangePort → Gateway → ErrorMapper ← RateLimiter ← Transport
//!                             ↓
//!                      Normalizer (tradeport-domain) → typed records
//! ```
//!
//! # Components
//!
//! - **Ports**: `ExchangePort` (strategy-facing) and `Transport` (raw, signed calls)
//! - **Rate limiter**: per-connection GCRA shared by every operation
//! - **Error mapper**: raw failures → closed `DomainError` taxonomy, with a
//!   per-binding rejection policy for "already set" codes
//! - **Gateway**: the composed pipeline, built once per port instance
//! - **Funding**: validation and filtering of funding-rate batches
//! - **Lifecycle**: TPSL state observation and scoped teardown
//! - **Stub**: scripted transport for tests
//!
//! # Example
//!
//! ```rust,ignore
//! use tradeport_exec::{scoped, ExchangePort};
//!
//! let rates = scoped(exchange, |port| {
//!     Box::pin(async move { port.get_funding_usdt_rates(true).await })
//! })
//! .await?;
//! ```

#![warn(clippy::all)]

pub mod error;
pub mod error_map;
pub mod funding;
pub mod gateway;
pub mod lifecycle;
pub mod ports;
pub mod rate_limit;
pub mod stub;

// Re-exports for convenience
pub use error::{ExecError, ExecResult, TransportError, TransportResult};
pub use error_map::{Disposition, ErrorMapper, Operation, Outcome, RejectionPolicy};
pub use funding::{active_swap_symbols, select_funding_rates};
pub use gateway::Gateway;
pub use lifecycle::{await_flat, observe_lifecycle, scoped, LifecycleState};
pub use ports::{Auth, ExchangePort, Method, RawRequest, Transport};
pub use rate_limit::{RateLimitedTransport, RateLimiter, DEFAULT_RATE_LIMIT};
pub use stub::ScriptedTransport;
