//! Scripted transport for testing.

use super::{Transport, TransportError, TransportRequest, TransportResponse};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::Mutex;

/// Mock transport for testing.
///
/// Replies are consumed in order; once the script runs out the fallback reply
/// is returned for every further request. Every request is recorded.
pub struct MockTransport {
    script: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
    fallback: Result<TransportResponse, TransportError>,
    requests: Mutex<Vec<TransportRequest>>,
    call_count: AtomicU32,
}

impl MockTransport {
    /// Create a mock that answers every request with an empty `200 {}`.
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Ok(TransportResponse::ok(Value::Object(Default::default()))),
            requests: Mutex::new(Vec::new()),
            call_count: AtomicU32::new(0),
        }
    }

    /// Answer every request with `200` and `body`.
    pub fn with_body(mut self, body: Value) -> Self {
        self.fallback = Ok(TransportResponse::ok(body));
        self
    }

    /// Answer every request with `status` and `body`.
    pub fn with_status(mut self, status: u16, body: Value) -> Self {
        self.fallback = Ok(TransportResponse { status, body });
        self
    }

    /// Fail every request with `error`.
    pub fn with_failure(mut self, error: TransportError) -> Self {
        self.fallback = Err(error);
        self
    }

    /// Queue a one-off reply ahead of the fallback.
    pub fn then_reply(mut self, reply: Result<TransportResponse, TransportError>) -> Self {
        self.script.get_mut().push_back(reply);
        self
    }

    /// Get the number of times send was called.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Requests received so far, in arrival order.
    pub async fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().await.clone()
    }

    /// The most recent request.
    pub async fn last_request(&self) -> Option<TransportRequest> {
        self.requests.lock().await.last().cloned()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().await.push(request);

        match self.script.lock().await.pop_front() {
            Some(reply) => reply,
            None => self.fallback.clone(),
        }
    }
}
