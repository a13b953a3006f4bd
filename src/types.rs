//! Result types returned by the fetch pipeline

use crate::asset::Asset;
use crate::entry::Entry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Entries matching a query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Matching entries in response order
    pub entries: Vec<Entry>,
    /// Total matches; `None` unless `include_count` was requested
    pub count: Option<u64>,
    /// Content type schema; `None` unless `include_schema` was requested
    pub schema: Option<Value>,
    /// Full content type; `None` unless `include_content_type` was requested
    pub content_type: Option<Value>,
}

impl QueryResult {
    /// Number of entries returned.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entry was returned.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Assets returned by an asset library request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetQueryResult {
    pub assets: Vec<Asset>,
    /// Total matches; `None` unless `include_count` was requested
    pub count: Option<u64>,
}

/// A content type definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentTypeSchema {
    /// Content type UID
    pub uid: String,
    /// Display title
    #[serde(default)]
    pub title: String,
    /// Field definitions
    #[serde(default)]
    pub schema: Vec<Value>,
    /// Remaining attributes (options, timestamps, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Parse an RFC 3339 timestamp field
pub(crate) fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    value
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

pub(crate) fn string_field(document: &Map<String, Value>, key: &str) -> Option<String> {
    document.get(key).and_then(Value::as_str).map(str::to_string)
}
