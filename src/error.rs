//! Error types for the delivery SDK

use serde_json::{Map, Value};
use thiserror::Error;

/// Result type for delivery operations
pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Error delivered to the caller of a fetch, find or find_one.
///
/// Every failed request produces exactly one of these. Builders never
/// return errors; anything they cannot accept is reported here after the
/// call is issued.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    /// Connectivity, timeout, malformed body or an abandoned completion.
    /// Not attributable to the query itself.
    #[error("Transport error {code}: {message}")]
    Transport { code: i64, message: String },

    /// The remote API rejected the request
    #[error("API error {code}: {message}")]
    Api {
        code: i64,
        message: String,
        details: Map<String, Value>,
    },

    /// Local validation failure, reported without a round trip
    #[error("Invalid request: {0}")]
    Validation(String),
}

impl DeliveryError {
    /// Numeric error code. Transport codes are negative, API codes come from
    /// the response envelope (or the HTTP status when the body has none).
    pub fn code(&self) -> i64 {
        match self {
            DeliveryError::Transport { code, .. } | DeliveryError::Api { code, .. } => *code,
            DeliveryError::Validation(_) => 0,
        }
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        match self {
            DeliveryError::Transport { message, .. } | DeliveryError::Api { message, .. } => {
                message
            }
            DeliveryError::Validation(message) => message,
        }
    }

    /// Field-level details from the API envelope. Empty for every other kind.
    pub fn details(&self) -> &Map<String, Value> {
        static EMPTY: std::sync::OnceLock<Map<String, Value>> = std::sync::OnceLock::new();
        match self {
            DeliveryError::Api { details, .. } => details,
            _ => EMPTY.get_or_init(Map::new),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, DeliveryError::Transport { .. })
    }

    pub fn is_api(&self) -> bool {
        matches!(self, DeliveryError::Api { .. })
    }
}

/// Error from typed field access on a materialized entry
#[derive(Debug, Error)]
pub enum FieldError {
    /// The field is not present on the entry
    #[error("Field not found: {0}")]
    Missing(String),

    /// The field is present but does not have the requested shape
    #[error("Field {field} has unexpected shape: {source}")]
    Type {
        field: String,
        #[source]
        source: serde_json::Error,
    },
}
