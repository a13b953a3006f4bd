//! Delivery API configuration
//!
//! Credentials and host selection are opaque to the query engine; they are
//! consumed by the transport only.

use crate::error::{DeliveryError, Result};
use std::str::FromStr;

/// Hosting region of the delivery API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Region {
    #[default]
    Us,
    Eu,
    AzureNa,
    AzureEu,
    GcpNa,
}

impl Region {
    /// Default CDN host for this region
    pub fn host(&self) -> &'static str {
        match self {
            Region::Us => "cdn.contentstack.io",
            Region::Eu => "eu-cdn.contentstack.com",
            Region::AzureNa => "azure-na-cdn.contentstack.com",
            Region::AzureEu => "azure-eu-cdn.contentstack.com",
            Region::GcpNa => "gcp-na-cdn.contentstack.com",
        }
    }
}

impl FromStr for Region {
    type Err = DeliveryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "us" => Ok(Region::Us),
            "eu" => Ok(Region::Eu),
            "azure-na" => Ok(Region::AzureNa),
            "azure-eu" => Ok(Region::AzureEu),
            "gcp-na" => Ok(Region::GcpNa),
            other => Err(DeliveryError::Validation(format!("Unknown region: {}", other))),
        }
    }
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Stack API key
    pub api_key: String,
    /// Delivery (read-only) access token
    pub delivery_token: String,
    /// Publishing environment content is read from
    pub environment: String,
    /// Hosting region, used when `host` is not set
    pub region: Region,
    /// Explicit host override (e.g. a proxy or a custom domain)
    pub host: Option<String>,
    /// API version path segment
    pub version: String,
    /// Content branch
    pub branch: Option<String>,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            delivery_token: String::new(),
            environment: String::new(),
            region: Region::Us,
            host: None,
            version: "v3".to_string(),
            branch: None,
            timeout_secs: 30,
        }
    }
}

impl DeliveryConfig {
    /// Configuration for the default region.
    pub fn new(
        api_key: impl Into<String>,
        delivery_token: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            delivery_token: delivery_token.into(),
            environment: environment.into(),
            ..Default::default()
        }
    }

    /// Read configuration from `DELIVERY_*` environment variables.
    ///
    /// `DELIVERY_API_KEY`, `DELIVERY_TOKEN` and `DELIVERY_ENVIRONMENT` are
    /// required; `DELIVERY_HOST`, `DELIVERY_REGION` and `DELIVERY_BRANCH`
    /// are optional.
    pub fn from_env() -> Result<Self> {
        let required = |name: &str| {
            std::env::var(name)
                .map_err(|_| DeliveryError::Validation(format!("{} is not set", name)))
        };

        let mut config = Self::new(
            required("DELIVERY_API_KEY")?,
            required("DELIVERY_TOKEN")?,
            required("DELIVERY_ENVIRONMENT")?,
        );

        if let Ok(region) = std::env::var("DELIVERY_REGION") {
            config.region = region.parse()?;
        }
        config.host = std::env::var("DELIVERY_HOST").ok();
        config.branch = std::env::var("DELIVERY_BRANCH").ok();

        Ok(config)
    }

    /// Use the hosts of `region`.
    pub fn with_region(mut self, region: Region) -> Self {
        self.region = region;
        self
    }

    /// Send requests to `host` instead of the region host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Read content from `branch`.
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Request timeout in seconds.
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Base URL for API requests.
    ///
    /// A host override that already carries a scheme is used as-is, which is
    /// how tests point the client at a local server.
    pub fn base_url(&self) -> String {
        let host = self.host.as_deref().unwrap_or_else(|| self.region.host());
        if host.starts_with("http://") || host.starts_with("https://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", host.trim_end_matches('/'))
        }
    }
}
