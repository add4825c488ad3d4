//! Port error taxonomy.
//!
//! Every failure that leaves an exchange port is one of five kinds. Each
//! carries the exchange, the symbol when one applies, the raw exchange code
//! when one exists, and the underlying cause as text.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Wildcard symbol used when a failure concerns a whole market family.
pub const ANY_USDT_SYMBOL: &str = "*/USDT";

/// Context attached to every [`DomainError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Symbol the failure concerns, if any
    pub symbol: Option<String>,
    /// Exchange identifier (e.g. "bitget")
    pub exchange: String,
    /// Raw exchange rejection code, if the exchange reported one
    pub code: Option<String>,
    /// Underlying cause
    pub cause: String,
}

impl ErrorContext {
    /// Create a context without symbol or code.
    pub fn new(exchange: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            symbol: None,
            exchange: exchange.into(),
            code: None,
            cause: cause.into(),
        }
    }

    /// Attach a symbol.
    pub fn with_symbol(mut self, symbol: Option<impl Into<String>>) -> Self {
        self.symbol = symbol.map(Into::into);
        self
    }

    /// Attach a raw exchange code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exchange={}", self.exchange)?;
        if let Some(symbol) = &self.symbol {
            write!(f, " symbol={}", symbol)?;
        }
        if let Some(code) = &self.code {
            write!(f, " code={}", code)?;
        }
        write!(f, ": {}", self.cause)
    }
}

/// Discriminant of [`DomainError`], handy for matching in callers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Payload shape or type violation
    ValidationFailure,
    /// Funding-rate feed empty or a record invalid
    RateUnavailable,
    /// Exchange-reported throttling
    RateLimited,
    /// Exchange refused the operation
    ExchangeRejected,
    /// Network, timeout, or closed connection
    TransportFailure,
}

/// Closed taxonomy of errors surfaced by an exchange port.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Payload shape/type violation, surfaced immediately, never retried
    #[error("Validation failure ({0})")]
    ValidationFailure(ErrorContext),

    /// No usable funding data, or one record in the feed is broken
    #[error("Funding rate unavailable ({0})")]
    RateUnavailable(ErrorContext),

    /// Exchange reported throttling
    #[error("Rate limited ({0})")]
    RateLimited(ErrorContext),

    /// Exchange explicitly refused the operation
    #[error("Exchange rejected ({0})")]
    ExchangeRejected(ErrorContext),

    /// Network failure, timeout, or use after close
    #[error("Transport failure ({0})")]
    TransportFailure(ErrorContext),
}

impl DomainError {
    /// Build a `ValidationFailure`.
    pub fn validation(
        exchange: impl Into<String>,
        symbol: Option<impl Into<String>>,
        cause: impl fmt::Display,
    ) -> Self {
        Self::ValidationFailure(ErrorContext::new(exchange, cause.to_string()).with_symbol(symbol))
    }

    /// Build a `RateUnavailable`.
    pub fn rate_unavailable(
        exchange: impl Into<String>,
        symbol: impl Into<String>,
        cause: impl fmt::Display,
    ) -> Self {
        Self::RateUnavailable(
            ErrorContext::new(exchange, cause.to_string()).with_symbol(Some(symbol)),
        )
    }

    /// Build an `ExchangeRejected` without a raw code.
    pub fn rejected(
        exchange: impl Into<String>,
        symbol: Option<impl Into<String>>,
        cause: impl fmt::Display,
    ) -> Self {
        Self::ExchangeRejected(ErrorContext::new(exchange, cause.to_string()).with_symbol(symbol))
    }

    /// Build a `TransportFailure`.
    pub fn transport(
        exchange: impl Into<String>,
        symbol: Option<impl Into<String>>,
        cause: impl fmt::Display,
    ) -> Self {
        Self::TransportFailure(ErrorContext::new(exchange, cause.to_string()).with_symbol(symbol))
    }

    /// Kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::ValidationFailure(_) => ErrorKind::ValidationFailure,
            DomainError::RateUnavailable(_) => ErrorKind::RateUnavailable,
            DomainError::RateLimited(_) => ErrorKind::RateLimited,
            DomainError::ExchangeRejected(_) => ErrorKind::ExchangeRejected,
            DomainError::TransportFailure(_) => ErrorKind::TransportFailure,
        }
    }

    /// Context carried by this error.
    pub fn context(&self) -> &ErrorContext {
        match self {
            DomainError::ValidationFailure(ctx)
            | DomainError::RateUnavailable(ctx)
            | DomainError::RateLimited(ctx)
            | DomainError::ExchangeRejected(ctx)
            | DomainError::TransportFailure(ctx) => ctx,
        }
    }

    /// Symbol the error concerns, if any.
    pub fn symbol(&self) -> Option<&str> {
        self.context().symbol.as_deref()
    }

    /// Whether a caller may reasonably retry after backoff.
    ///
    /// This layer never retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DomainError::TransportFailure(_) | DomainError::RateLimited(_))
    }
}

/// Result type for port operations.
pub type PortResult<T> = Result<T, DomainError>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_context() {
        let err = DomainError::rate_unavailable("bitget", "BTC/USDT:USDT", "bad fundingRate");
        assert_eq!(
            err.to_string(),
            "Funding rate unavailable (exchange=bitget symbol=BTC/USDT:USDT: bad fundingRate)"
        );
    }

    #[test]
    fn test_kind_and_context() {
        let err = DomainError::ExchangeRejected(
            ErrorContext::new("bitget", "insufficient balance")
                .with_symbol(Some("XRP/USDT:USDT"))
                .with_code("43012"),
        );

        assert_eq!(err.kind(), ErrorKind::ExchangeRejected);
        assert_eq!(err.symbol(), Some("XRP/USDT:USDT"));
        assert_eq!(err.context().code.as_deref(), Some("43012"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(DomainError::transport("bitget", None::<String>, "timeout").is_retryable());
        assert!(DomainError::RateLimited(ErrorContext::new("bitget", "429")).is_retryable());
        assert!(!DomainError::validation("bitget", None::<String>, "bad").is_retryable());
    }
}
