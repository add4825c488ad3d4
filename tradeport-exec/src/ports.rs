//! Execution layer port definitions.
//!
//! Two seams:
//!
//! - [`Transport`]: the raw, signed request/response capability a binding
//!   talks to (Bitget REST, a simulator, a scripted stub).
//! - [`ExchangePort`]: the uniform contract a strategy talks to.
//!
//! # Cancellation
//!
//! Dropping the future of an in-flight operation stops waiting for it, not the
//! exchange-side effect. An abandoned `create_order` or `create_tpsl_position`
//! may still be executed by the exchange; query positions and trigger orders
//! before re-issuing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

use tradeport_domain::{
    Balance, CanonicalSymbol, FundingRateRecord, Instrument, Leverage, MarginMode, Order,
    OrderParams, OrderSide, OrderType, Params, PortResult, Position, Quantity, Ticker,
    TpslRequest, TriggerOrder,
};

use crate::error::TransportResult;

// =============================================================================
// Transport
// =============================================================================

/// HTTP method of a raw request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    /// Query parameters in the URL
    Get,
    /// Parameters in a JSON body
    Post,
}

/// Whether a raw request must be signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Auth {
    /// Public market data
    Public,
    /// Signed account endpoint
    Private,
}

/// Exchange-neutral description of one raw API call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRequest {
    /// HTTP method
    pub method: Method,
    /// Endpoint path (e.g. `/api/v2/mix/market/ticker`)
    pub path: String,
    /// Query or body parameters
    pub params: Params,
    /// Signing requirement
    pub auth: Auth,
}

impl RawRequest {
    /// Public GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            params: Params::new(),
            auth: Auth::Public,
        }
    }

    /// Signed POST request.
    pub fn post(path: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            params: Params::new(),
            auth: Auth::Private,
        }
    }

    /// Require signing.
    pub fn signed(mut self) -> Self {
        self.auth = Auth::Private;
        self
    }

    /// Add a parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Merge raw overrides; later keys win.
    pub fn merge(mut self, extra: &Params) -> Self {
        for (key, value) in extra {
            self.params.insert(key.clone(), value.clone());
        }
        self
    }

    /// String parameter, if present.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }
}

/// Raw exchange transport.
///
/// Implementations own their connection exclusively. Returns the unwrapped
/// `data` payload of a successful response.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Exchange identifier (e.g. "bitget").
    fn exchange_id(&self) -> &str;

    /// Send one request and wait for its payload.
    async fn send(&self, request: RawRequest) -> TransportResult<Value>;

    /// Release the connection. Calls after this fail with `TransportError::Closed`.
    async fn close(&self) -> TransportResult<()>;
}

// =============================================================================
// Exchange Port
// =============================================================================

/// Uniform exchange contract.
///
/// Implementations:
/// - `BitgetExchange` - Bitget USDT-M perpetual swaps (tradeport-connectors)
///
/// Every operation runs through the connection's rate limiter and error
/// mapper; every failure is a `DomainError`.
#[async_trait]
pub trait ExchangePort: Send + Sync {
    /// Exchange identifier.
    fn exchange_id(&self) -> &str;

    /// Refresh market metadata. Safe to call repeatedly.
    async fn load_markets(&self) -> PortResult<()>;

    /// Current funding rates of USDT-settled swaps.
    ///
    /// Only records with a funding date strictly in the future are returned,
    /// restricted to tradable instruments when `is_active` is set.
    ///
    /// # Errors
    /// `RateUnavailable` naming the broken symbol if one record is invalid, or
    /// naming `*/USDT` if nothing usable remains. Never returns an empty list.
    async fn get_funding_usdt_rates(&self, is_active: bool) -> PortResult<Vec<FundingRateRecord>>;

    /// Last traded price.
    async fn get_ticker(&self, symbol: &CanonicalSymbol) -> PortResult<Ticker>;

    /// Trading constraints of one instrument.
    async fn get_instrument_info(&self, symbol: &CanonicalSymbol) -> PortResult<Instrument>;

    /// Open positions for the given symbols (all symbols if empty).
    ///
    /// Zero-sized positions are never returned.
    async fn get_positions(&self, symbols: &BTreeSet<CanonicalSymbol>) -> PortResult<Vec<Position>>;

    /// Pending take-profit and stop-loss orders of one symbol.
    async fn get_trigger_orders(&self, symbol: &CanonicalSymbol) -> PortResult<Vec<TriggerOrder>>;

    /// Balance of one asset.
    async fn get_balance(&self, asset: &str) -> PortResult<Balance>;

    /// Place an order.
    async fn create_order(
        &self,
        symbol: &CanonicalSymbol,
        side: OrderSide,
        order_type: OrderType,
        amount: Quantity,
        params: Option<OrderParams>,
    ) -> PortResult<Order>;

    /// Open a position with bound take-profit and stop-loss triggers.
    ///
    /// Position mode, margin mode and leverage must already be configured.
    /// Returns once both triggers are observed.
    ///
    /// # Errors
    /// `ValidationFailure` if the triggers do not bracket the entry side;
    /// `ExchangeRejected` if the exchange does not produce exactly one
    /// take-profit and one stop-loss. A half-created pair is not repaired.
    async fn create_tpsl_position(&self, request: &TpslRequest) -> PortResult<()>;

    /// Set leverage. Idempotent.
    async fn set_leverage(&self, leverage: Leverage, symbol: &CanonicalSymbol) -> PortResult<()>;

    /// Set margin mode. Idempotent.
    async fn set_margin_mode(
        &self,
        margin_mode: MarginMode,
        symbol: &CanonicalSymbol,
        params: Option<&Params>,
    ) -> PortResult<()>;

    /// Set hedged (two-sided) or one-way position mode. Idempotent.
    async fn set_position_mode(&self, hedged: bool, symbol: Option<&CanonicalSymbol>) -> PortResult<()>;

    /// Release the transport connection. Idempotent.
    async fn close(&self) -> PortResult<()>;

    /// Flatten every open position among `symbols` (all if empty) with a
    /// reduce-only market order of its full size.
    async fn close_positions(&self, symbols: &BTreeSet<CanonicalSymbol>) -> PortResult<Vec<Order>> {
        let mut orders = Vec::new();
        for position in self.get_positions(symbols).await? {
            let order = self
                .create_order(
                    &position.symbol,
                    position.exit_side(),
                    OrderType::Market,
                    position.contracts,
                    Some(OrderParams::close_position()),
                )
                .await?;
            orders.push(order);
        }
        Ok(orders)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_request_builder() {
        let mut extra = Params::new();
        extra.insert("marginCoin".to_string(), Value::from("USDC"));

        let request = RawRequest::get("/api/v2/mix/market/ticker")
            .param("symbol", "XRPUSDT")
            .param("marginCoin", "USDT")
            .merge(&extra)
            .signed();

        assert_eq!(request.method, Method::Get);
        assert_eq!(request.auth, Auth::Private);
        assert_eq!(request.param_str("symbol"), Some("XRPUSDT"));
        assert_eq!(request.param_str("marginCoin"), Some("USDC"));
    }

    #[test]
    fn test_post_is_signed() {
        let request = RawRequest::post("/api/v2/mix/order/place-order");
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.auth, Auth::Private);
    }
}
