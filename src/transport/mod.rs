//! Transport abstraction
//!
//! The query engine issues exactly one [`TransportRequest`] per operation and
//! expects one [`TransportResponse`] or [`TransportError`] back. Connection
//! pooling, TLS, timeouts and auth headers live behind this trait:
//! - [`HttpTransport`]: reqwest-based delivery API client
//! - [`MockTransport`]: scripted responses for tests

pub mod http;
pub mod mock;

pub use http::HttpTransport;
pub use mock::MockTransport;

use crate::error::DeliveryError;
use async_trait::async_trait;
use serde_json::Value;

/// Transport error codes, reported through [`DeliveryError::code`]
pub mod codes {
    pub const NETWORK: i64 = -1;
    pub const TIMEOUT: i64 = -2;
    pub const MALFORMED_RESPONSE: i64 = -3;
    pub const ABANDONED: i64 = -4;
}

/// Failure below the API layer
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl TransportError {
    /// Code reported through [`DeliveryError::code`].
    pub fn code(&self) -> i64 {
        match self {
            TransportError::Network(_) => codes::NETWORK,
            TransportError::Timeout => codes::TIMEOUT,
            TransportError::MalformedResponse(_) => codes::MALFORMED_RESPONSE,
        }
    }
}

impl From<TransportError> for DeliveryError {
    fn from(err: TransportError) -> Self {
        DeliveryError::Transport {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// HTTP method. The delivery API is read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
        }
    }
}

/// One request to the delivery API
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransportRequest {
    pub method: Method,
    /// Path below the base URL, e.g. `/v3/content_types/product/entries`
    pub path: String,
    /// Query pairs in send order
    pub query: Vec<(String, String)>,
    /// Per-request headers, in addition to whatever the transport injects
    pub headers: Vec<(String, String)>,
}

impl TransportRequest {
    /// GET request for `path`.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            ..Default::default()
        }
    }

    /// Replace the query pairs.
    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    /// Add a per-request header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First value of query parameter `key`
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value of query parameter `key`, in order
    pub fn query_values(&self, key: &str) -> Vec<&str> {
        self.query
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

/// Status and parsed body of a completed request.
///
/// `body` is `Value::Null` when a non-success response had no JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Value,
}

impl TransportResponse {
    /// `200` response with `body`.
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends delivery API requests
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}
