//! Error mapping.
//!
//! Every port operation funnels its raw transport result through one
//! [`ErrorMapper`]. The mapper consults the binding's [`RejectionPolicy`]
//! (structured exchange codes only, never message text) and produces either
//! an [`Outcome`] or a `DomainError` of the closed taxonomy.

use std::collections::HashMap;
use std::fmt;
use tracing::warn;

use tradeport_domain::{DomainError, ErrorContext, PortResult, ANY_USDT_SYMBOL};

use crate::error::{TransportError, TransportResult};

// =============================================================================
// Operation
// =============================================================================

/// Port operation a raw call belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Market metadata refresh
    LoadMarkets,
    /// Batched funding-rate retrieval
    FundingRates,
    /// Ticker query
    Ticker,
    /// Position query
    Positions,
    /// Trigger-order query
    TriggerOrders,
    /// Balance query
    Balance,
    /// Margin and position mode query of one symbol's account
    AccountModes,
    /// Plain order placement
    CreateOrder,
    /// Order placement with preset take-profit/stop-loss
    CreateTpsl,
    /// Leverage setter
    SetLeverage,
    /// Margin-mode setter
    SetMarginMode,
    /// Position-mode setter
    SetPositionMode,
}

impl Operation {
    /// Whether repeating the operation with the same arguments is a no-op.
    pub fn is_idempotent_setter(&self) -> bool {
        matches!(
            self,
            Operation::SetLeverage | Operation::SetMarginMode | Operation::SetPositionMode
        )
    }

    /// Snake-case name, used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::LoadMarkets => "load_markets",
            Operation::FundingRates => "get_funding_usdt_rates",
            Operation::Ticker => "get_ticker",
            Operation::Positions => "get_positions",
            Operation::TriggerOrders => "get_trigger_orders",
            Operation::Balance => "get_balance",
            Operation::AccountModes => "account_modes",
            Operation::CreateOrder => "create_order",
            Operation::CreateTpsl => "create_tpsl_position",
            Operation::SetLeverage => "set_leverage",
            Operation::SetMarginMode => "set_margin_mode",
            Operation::SetPositionMode => "set_position_mode",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Rejection policy
// =============================================================================

/// What a raw exchange rejection code means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Account already in the requested state; absorbed as success
    AlreadyApplied,
    /// Exchange-side throttling
    Throttled,
    /// Genuine refusal
    Rejected,
}

/// Per-binding table mapping raw rejection codes to dispositions.
///
/// Operation-specific entries win over code-only entries. Unknown codes are
/// `Rejected`. `AlreadyApplied` is only honoured for idempotent setters.
#[derive(Debug, Clone, Default)]
pub struct RejectionPolicy {
    by_operation: HashMap<(Operation, String), Disposition>,
    by_code: HashMap<String, Disposition>,
}

impl RejectionPolicy {
    /// Empty policy: every code is a rejection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat `code` as success for `operation`.
    pub fn already_applied(mut self, operation: Operation, code: impl Into<String>) -> Self {
        self.by_operation
            .insert((operation, code.into()), Disposition::AlreadyApplied);
        self
    }

    /// Treat `code` as exchange throttling for every operation.
    pub fn throttled(mut self, code: impl Into<String>) -> Self {
        self.by_code.insert(code.into(), Disposition::Throttled);
        self
    }

    /// Classify a raw code raised by `operation`.
    pub fn disposition(&self, operation: Operation, code: &str) -> Disposition {
        let found = self
            .by_operation
            .get(&(operation, code.to_string()))
            .or_else(|| self.by_code.get(code))
            .copied()
            .unwrap_or(Disposition::Rejected);

        match found {
            Disposition::AlreadyApplied if !operation.is_idempotent_setter() => Disposition::Rejected,
            other => other,
        }
    }
}

// =============================================================================
// Error mapper
// =============================================================================

/// Successful result of a mapped call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The exchange performed the operation
    Completed(T),
    /// The exchange reported the requested state was already in place
    AlreadyApplied,
}

/// Translates raw transport results into port results.
#[derive(Debug, Clone)]
pub struct ErrorMapper {
    exchange: String,
    policy: RejectionPolicy,
}

impl ErrorMapper {
    /// Create a mapper for one exchange.
    pub fn new(exchange: impl Into<String>, policy: RejectionPolicy) -> Self {
        Self {
            exchange: exchange.into(),
            policy,
        }
    }

    /// Exchange identifier carried by every error.
    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// Map a raw result.
    pub fn map<T>(
        &self,
        operation: Operation,
        symbol: Option<&str>,
        result: TransportResult<T>,
    ) -> PortResult<Outcome<T>> {
        match result {
            Ok(value) => Ok(Outcome::Completed(value)),
            Err(err) => self.classify(operation, symbol, err),
        }
    }

    fn classify<T>(
        &self,
        operation: Operation,
        symbol: Option<&str>,
        err: TransportError,
    ) -> PortResult<Outcome<T>> {
        let context = |cause: String| ErrorContext::new(&self.exchange, cause).with_symbol(symbol);

        let error = match err {
            TransportError::Api { code, msg } => match self.policy.disposition(operation, &code) {
                Disposition::AlreadyApplied => {
                    warn!(
                        exchange = %self.exchange,
                        operation = operation.as_str(),
                        symbol = symbol.unwrap_or("-"),
                        code = %code,
                        "Absorbed no-change rejection"
                    );
                    return Ok(Outcome::AlreadyApplied);
                },
                Disposition::Throttled => DomainError::RateLimited(context(msg).with_code(code)),
                Disposition::Rejected => DomainError::ExchangeRejected(context(msg).with_code(code)),
            },
            TransportError::Http { status: 429, body } => {
                DomainError::RateLimited(context(body).with_code("429"))
            },
            TransportError::Http { status, body } if status >= 500 => {
                DomainError::TransportFailure(context(format!("HTTP {}: {}", status, body)))
            },
            TransportError::Http { status, body } => {
                DomainError::ExchangeRejected(context(body).with_code(status.to_string()))
            },
            TransportError::Decode(cause) => self.invalid_payload(operation, symbol, cause),
            other @ (TransportError::Timeout(_)
            | TransportError::Network(_)
            | TransportError::Closed) => DomainError::TransportFailure(context(other.to_string())),
        };

        Err(error)
    }

    /// Error for a payload that failed schema validation.
    ///
    /// `RateUnavailable` for funding-rate retrieval, `ValidationFailure`
    /// everywhere else.
    pub fn invalid_payload(
        &self,
        operation: Operation,
        symbol: Option<&str>,
        cause: impl fmt::Display,
    ) -> DomainError {
        match operation {
            Operation::FundingRates => DomainError::rate_unavailable(
                &self.exchange,
                symbol.unwrap_or(ANY_USDT_SYMBOL),
                cause,
            ),
            _ => DomainError::validation(&self.exchange, symbol, cause),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
