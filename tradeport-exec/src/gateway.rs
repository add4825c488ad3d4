//! Composed request pipeline.
//!
//! ```text
//! binding → Gateway → ErrorMapper ← RateLimitedTransport ← Transport
//! ```
//!
//! Built once per port instance. Every raw call a binding makes goes through
//! [`Gateway::call`] or one of its typed helpers, so no operation can bypass
//! the limiter or the mapper.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

use tradeport_domain::{DomainError, ErrorContext, PortResult};

use crate::error::TransportError;
use crate::error_map::{ErrorMapper, Operation, Outcome, RejectionPolicy};
use crate::ports::{RawRequest, Transport};
use crate::rate_limit::{RateLimitedTransport, RateLimiter};

/// Transport wrapped by the rate limiter, wrapped by the error mapper.
pub struct Gateway<T: Transport> {
    transport: RateLimitedTransport<T>,
    mapper: ErrorMapper,
    closed: AtomicBool,
}

impl<T: Transport> Gateway<T> {
    /// Compose the pipeline around a raw transport.
    pub fn new(transport: T, limiter: RateLimiter, policy: RejectionPolicy) -> Self {
        let mapper = ErrorMapper::new(transport.exchange_id(), policy);
        Self {
            transport: RateLimitedTransport::new(transport, limiter),
            mapper,
            closed: AtomicBool::new(false),
        }
    }

    /// Exchange identifier.
    pub fn exchange_id(&self) -> &str {
        self.mapper.exchange()
    }

    /// Error mapper of this pipeline.
    pub fn mapper(&self) -> &ErrorMapper {
        &self.mapper
    }

    /// Raw transport (inside the limiter).
    pub fn transport(&self) -> &T {
        self.transport.inner()
    }

    /// Send one request and map its result.
    pub async fn call(
        &self,
        operation: Operation,
        symbol: Option<&str>,
        request: RawRequest,
    ) -> PortResult<Outcome<Value>> {
        if self.closed.load(Ordering::SeqCst) {
            return self.mapper.map(operation, symbol, Err(TransportError::Closed));
        }

        debug!(
            exchange = self.exchange_id(),
            operation = operation.as_str(),
            path = %request.path,
            "Sending request"
        );
        let result = self.transport.send(request).await;
        self.mapper.map(operation, symbol, result)
    }

    /// Send a query and decode its payload into a schema type.
    pub async fn fetch<R: DeserializeOwned>(
        &self,
        operation: Operation,
        symbol: Option<&str>,
        request: RawRequest,
    ) -> PortResult<R> {
        match self.call(operation, symbol, request).await? {
            Outcome::Completed(payload) => serde_json::from_value(payload)
                .map_err(|e| self.mapper.invalid_payload(operation, symbol, e)),
            Outcome::AlreadyApplied => Err(DomainError::ExchangeRejected(
                ErrorContext::new(self.exchange_id(), format!("{} returned no payload", operation))
                    .with_symbol(symbol),
            )),
        }
    }

    /// Send an idempotent setter; an "already set" rejection is success.
    pub async fn apply(
        &self,
        operation: Operation,
        symbol: Option<&str>,
        request: RawRequest,
    ) -> PortResult<()> {
        match self.call(operation, symbol, request).await? {
            Outcome::Completed(_) => {
                info!(
                    exchange = self.exchange_id(),
                    operation = operation.as_str(),
                    symbol = symbol.unwrap_or("-"),
                    "Applied"
                );
            },
            Outcome::AlreadyApplied => {},
        }
        Ok(())
    }

    /// Close the transport. Only the first call reaches it.
    pub async fn close(&self) -> PortResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        info!(exchange = self.exchange_id(), "Closing transport");
        self.transport.close().await.map_err(|e| {
            DomainError::TransportFailure(ErrorContext::new(self.exchange_id(), e.to_string()))
        })
    }

    /// Whether `close()` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl<T: Transport> Drop for Gateway<T> {
    fn drop(&mut self) {
        if !self.is_closed() {
            debug!(exchange = self.exchange_id(), "Gateway dropped without close");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::ScriptedTransport;
    use serde::Deserialize;
    use serde_json::json;
    use tradeport_domain::ErrorKind;

    #[derive(Debug, Deserialize)]
    struct Tick {
        price: String,
    }

    fn gateway() -> Gateway<ScriptedTransport> {
        let policy = RejectionPolicy::new().already_applied(Operation::SetLeverage, "40872");
        Gateway::new(
            ScriptedTransport::new("test"),
            RateLimiter::per_second(100).unwrap(),
            policy,
        )
    }

    #[tokio::test]
    async fn test_fetch_decodes_schema() {
        let gw = gateway();
        gw.transport().respond("/tick", json!({"price": "1.5"}));

        let tick: Tick = gw.fetch(Operation::Ticker, None, RawRequest::get("/tick")).await.unwrap();
        assert_eq!(tick.price, "1.5");
    }

    #[tokio::test]
    async fn test_fetch_schema_violation_is_validation_failure() {
        let gw = gateway();
        gw.transport().respond("/tick", json!({"last": 1}));

        let err = gw
            .fetch::<Tick>(Operation::Ticker, Some("XRP/USDT:USDT"), RawRequest::get("/tick"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailure);
        assert_eq!(err.symbol(), Some("XRP/USDT:USDT"));
    }

    #[tokio::test]
    async fn test_apply_absorbs_already_set() {
        let gw = gateway();
        gw.transport().respond("/lev", json!({})).fail(
            "/lev",
            TransportError::Api {
                code: "40872".to_string(),
                msg: "leverage not modified".to_string(),
            },
        );

        gw.apply(Operation::SetLeverage, None, RawRequest::post("/lev")).await.unwrap();
        gw.apply(Operation::SetLeverage, None, RawRequest::post("/lev")).await.unwrap();
        assert_eq!(gw.transport().request_count("/lev"), 2);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_blocks_calls() {
        let gw = gateway();
        gw.transport().respond("/tick", json!({"price": "1"}));

        gw.close().await.unwrap();
        gw.close().await.unwrap();
        assert_eq!(gw.transport().close_calls(), 1);

        let err = gw.call(Operation::Ticker, None, RawRequest::get("/tick")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportFailure);
        assert_eq!(gw.transport().request_count("/tick"), 0);
    }
}
