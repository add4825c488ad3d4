//! Per-connection rate limiting.
//!
//! A GCRA (leaky bucket, burst 1): every `acquire` reserves the next free
//! slot, spaced `1/R` apart, then sleeps outside the lock until that slot.
//! Callers are suspended, never rejected. Issuing N operations against a
//! ceiling of R/s therefore takes at least `(N-1)/R`.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::trace;

use crate::error::{ExecError, ExecResult, TransportResult};
use crate::ports::{RawRequest, Transport};

/// Default ceiling in operations per second.
pub const DEFAULT_RATE_LIMIT: u32 = 10;

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Connection-scoped rate limiter shared by all operation types.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a limiter allowing `ceiling` operations per second.
    ///
    /// # Errors
    /// Returns `ExecError::Config` if `ceiling` is 0.
    pub fn per_second(ceiling: u32) -> ExecResult<Self> {
        if ceiling == 0 {
            return Err(ExecError::Config("rate limit must be at least 1 op/s".to_string()));
        }
        Ok(Self::spaced(ceiling))
    }

    /// Interval rounded up to the nanosecond, so N slots never span less
    /// than `(N-1)/ceiling`.
    fn spaced(ceiling: u32) -> Self {
        let nanos = NANOS_PER_SECOND.div_ceil(u64::from(ceiling.max(1)));
        Self {
            interval: Duration::from_nanos(nanos),
            next_slot: Mutex::new(None),
        }
    }

    /// Minimum spacing between two operations.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Suspend until the connection may send one more request.
    pub async fn acquire(&self, exchange_id: &str) {
        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next {
                Some(reserved) if reserved > now => reserved,
                _ => now,
            };
            *next = Some(slot + self.interval);
            slot
        };

        let wait = slot.saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            trace!(exchange = exchange_id, wait_ms = wait.as_millis() as u64, "Rate limited");
            sleep_until(slot).await;
        }
    }
}

impl Default for RateLimiter {
    /// [`DEFAULT_RATE_LIMIT`] operations per second.
    fn default() -> Self {
        Self::spaced(DEFAULT_RATE_LIMIT)
    }
}

/// Transport decorator that passes every request through a [`RateLimiter`].
pub struct RateLimitedTransport<T> {
    inner: T,
    limiter: RateLimiter,
}

impl<T: Transport> RateLimitedTransport<T> {
    /// Wrap a transport.
    pub fn new(inner: T, limiter: RateLimiter) -> Self {
        Self { inner, limiter }
    }

    /// Wrapped transport.
    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: Transport> Transport for RateLimitedTransport<T> {
    fn exchange_id(&self) -> &str {
        self.inner.exchange_id()
    }

    async fn send(&self, request: RawRequest) -> TransportResult<Value> {
        self.limiter.acquire(self.inner.exchange_id()).await;
        self.inner.send(request).await
    }

    async fn close(&self) -> TransportResult<()> {
        self.inner.close().await
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::ScriptedTransport;
    use futures_util::future::join_all;
    use std::sync::Arc;

    #[test]
    fn test_zero_ceiling_is_config_error() {
        assert!(matches!(RateLimiter::per_second(0), Err(ExecError::Config(_))));
        assert_eq!(RateLimiter::per_second(10).unwrap().interval(), Duration::from_millis(100));
        assert_eq!(RateLimiter::default().interval(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_uneven_ceiling_rounds_interval_up() {
        let limiter = RateLimiter::per_second(3).unwrap();
        assert_eq!(limiter.interval(), Duration::from_nanos(333_333_334));

        let start = Instant::now();
        for _ in 0..4 {
            limiter.acquire("test").await;
        }

        // (N-1)/R = 3/3
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_acquire_is_immediate() {
        let limiter = RateLimiter::per_second(10).unwrap();
        let start = Instant::now();

        limiter.acquire("test").await;

        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_acquisitions_are_spaced() {
        let limiter = RateLimiter::per_second(10).unwrap();
        let start = Instant::now();

        for _ in 0..11 {
            limiter.acquire("test").await;
        }

        // (N-1)/R = 10/10
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert!(start.elapsed() < Duration::from_millis(1100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_acquisitions_are_serialized() {
        let limiter = Arc::new(RateLimiter::per_second(5).unwrap());
        let start = Instant::now();

        let tasks = (0..6).map(|_| {
            let limiter = Arc::clone(&limiter);
            async move { limiter.acquire("test").await }
        });
        join_all(tasks).await;

        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_time_does_not_accumulate_burst() {
        let limiter = RateLimiter::per_second(10).unwrap();
        limiter.acquire("test").await;

        tokio::time::sleep(Duration::from_secs(5)).await;

        let start = Instant::now();
        limiter.acquire("test").await;
        limiter.acquire("test").await;
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_decorator_limits_every_request() {
        let stub = ScriptedTransport::new("test");
        stub.respond("/ping", serde_json::json!({}));
        let transport = RateLimitedTransport::new(stub, RateLimiter::per_second(4).unwrap());
        let start = Instant::now();

        for _ in 0..5 {
            transport.send(RawRequest::get("/ping")).await.unwrap();
        }

        assert!(start.elapsed() >= Duration::from_secs(1));
        assert_eq!(transport.inner().request_count("/ping"), 5);
    }
}
