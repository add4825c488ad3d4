//! Scripted transport for testing.
//!
//! Answers requests from canned responses keyed by endpoint path and records
//! every request it receives. No network access.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{TransportError, TransportResult};
use crate::ports::{RawRequest, Transport};

/// Scripted transport.
///
/// Each path holds a queue of responses. The last queued response repeats,
/// so a single `respond` serves every call to that path.
pub struct ScriptedTransport {
    exchange: String,
    /// Queued responses by path
    responses: Mutex<HashMap<String, VecDeque<TransportResult<Value>>>>,
    /// Requests in arrival order
    requests: Mutex<Vec<RawRequest>>,
    /// Error returned by the next request, whatever its path
    fail_next: Mutex<Option<TransportError>>,
    closed: AtomicBool,
    close_calls: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedTransport {
    /// Create an empty script.
    pub fn new(exchange: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            responses: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            fail_next: Mutex::new(None),
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
        }
    }

    /// Queue a successful payload for `path`.
    pub fn respond(&self, path: &str, payload: Value) -> &Self {
        self.push(path, Ok(payload))
    }

    /// Queue an error for `path`.
    pub fn fail(&self, path: &str, error: TransportError) -> &Self {
        self.push(path, Err(error))
    }

    /// Fail the next request, whatever its path.
    pub fn set_fail_next(&self, error: TransportError) {
        *lock(&self.fail_next) = Some(error);
    }

    fn push(&self, path: &str, response: TransportResult<Value>) -> &Self {
        lock(&self.responses)
            .entry(path.to_string())
            .or_default()
            .push_back(response);
        self
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<RawRequest> {
        lock(&self.requests).clone()
    }

    /// Requests received for one path.
    pub fn requests_to(&self, path: &str) -> Vec<RawRequest> {
        lock(&self.requests)
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }

    /// Number of requests received for one path.
    pub fn request_count(&self, path: &str) -> usize {
        lock(&self.requests).iter().filter(|r| r.path == path).count()
    }

    /// Number of `close()` calls.
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Whether `close()` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn exchange_id(&self) -> &str {
        &self.exchange
    }

    async fn send(&self, request: RawRequest) -> TransportResult<Value> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let path = request.path.clone();
        lock(&self.requests).push(request);

        if let Some(error) = lock(&self.fail_next).take() {
            return Err(error);
        }

        let mut responses = lock(&self.responses);
        match responses.get_mut(&path) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(Err(TransportError::Closed)),
            Some(queue) => queue.front().cloned().unwrap_or(Err(TransportError::Closed)),
            None => Err(TransportError::Http {
                status: 404,
                body: format!("no scripted response for {}", path),
            }),
        }
    }

    async fn close(&self) -> TransportResult<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_last_response_repeats() {
        let stub = ScriptedTransport::new("test");
        stub.respond("/a", json!(1)).respond("/a", json!(2));

        assert_eq!(stub.send(RawRequest::get("/a")).await.unwrap(), json!(1));
        assert_eq!(stub.send(RawRequest::get("/a")).await.unwrap(), json!(2));
        assert_eq!(stub.send(RawRequest::get("/a")).await.unwrap(), json!(2));
        assert_eq!(stub.request_count("/a"), 3);
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let stub = ScriptedTransport::new("test");
        let err = stub.send(RawRequest::get("/missing")).await.unwrap_err();
        assert!(matches!(err, TransportError::Http { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_fail_next_then_recover() {
        let stub = ScriptedTransport::new("test");
        stub.respond("/a", json!("ok"));
        stub.set_fail_next(TransportError::Timeout("10s".to_string()));

        assert!(stub.send(RawRequest::get("/a")).await.is_err());
        assert!(stub.send(RawRequest::get("/a")).await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_rejects_requests() {
        let stub = ScriptedTransport::new("test");
        stub.respond("/a", json!("ok"));
        stub.close().await.unwrap();

        assert_eq!(stub.send(RawRequest::get("/a")).await.unwrap_err(), TransportError::Closed);
        assert_eq!(stub.close_calls(), 1);
    }
}
