//! HTTP transport for the delivery API

use super::{Method, Transport, TransportError, TransportRequest, TransportResponse};
use crate::config::DeliveryConfig;
use crate::error::{DeliveryError, Result};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// reqwest-backed transport.
///
/// Injects the stack credentials as default headers and the publishing
/// environment as a query parameter on every request.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    environment: String,
}

impl HttpTransport {
    /// Create a transport from the delivery configuration
    pub fn new(config: &DeliveryConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert("api_key", header_value(&config.api_key)?);
        headers.insert("access_token", header_value(&config.delivery_token)?);
        if let Some(ref branch) = config.branch {
            headers.insert("branch", header_value(branch)?);
        }
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DeliveryError::Validation(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url(),
            environment: config.environment.clone(),
        })
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn header_value(value: &str) -> Result<header::HeaderValue> {
    header::HeaderValue::from_str(value)
        .map_err(|_| DeliveryError::Validation("Credential is not a valid header value".into()))
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(err.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: TransportRequest,
    ) -> std::result::Result<TransportResponse, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);

        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
        };
        if !self.environment.is_empty() {
            builder = builder.query(&[("environment", self.environment.as_str())]);
        }
        builder = builder.query(&request.query);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let text = response.text().await.map_err(map_reqwest_error)?;

        debug!(
            path = %request.path,
            status = status.as_u16(),
            bytes = text.len(),
            "Delivery response"
        );

        let body = match serde_json::from_str::<Value>(&text) {
            Ok(body) => body,
            // Error pages from proxies are not JSON; the status still describes them
            Err(_) if !status.is_success() => Value::Null,
            Err(e) => return Err(TransportError::MalformedResponse(e.to_string())),
        };

        Ok(TransportResponse {
            status: status.as_u16(),
            body,
        })
    }
}
