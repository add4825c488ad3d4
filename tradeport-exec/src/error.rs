//! Execution layer error types.
//!
//! `TransportError` is what a raw transport reports. It never leaves the
//! port: the error mapper translates it into a `DomainError`.

use thiserror::Error;

/// Errors reported by a raw exchange transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Request did not complete in time
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Connection-level failure (DNS, TLS, reset)
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status without a structured exchange code
    #[error("HTTP {status}: {body}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },

    /// Exchange answered with a structured rejection code
    #[error("Exchange API error {code}: {msg}")]
    Api {
        /// Raw exchange code
        code: String,
        /// Exchange message
        msg: String,
    },

    /// Response could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Transport was used after `close()`
    #[error("Transport is closed")]
    Closed,
}

/// Result type for raw transport calls.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors raised while assembling the port layer.
#[derive(Debug, Error)]
pub enum ExecError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for port construction.
pub type ExecResult<T> = Result<T, ExecError>;
