//! Materialized assets

use crate::image::{build_url, ImageTransform};
use crate::params::ParameterBag;
use crate::types::{parse_timestamp, string_field};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// A file resource with metadata.
///
/// Only built from a response fragment: either an asset response or asset
/// data embedded in an entry field. Every field of the fragment is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    uid: String,
    url: String,
    file_name: Option<String>,
    file_type: Option<String>,
    file_size: Option<u64>,
    title: Option<String>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    created_by: Option<String>,
    updated_by: Option<String>,
    fields: Map<String, Value>,
}

impl Asset {
    /// Build from a JSON object. Returns `None` unless the object carries a
    /// string `uid` and `url`, which is what distinguishes asset data from
    /// other objects.
    pub fn from_document(document: Map<String, Value>) -> Option<Self> {
        let uid = string_field(&document, "uid")?;
        let url = string_field(&document, "url")?;

        // file_size arrives as a string on most stacks
        let file_size = match document.get("file_size") {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        };

        Some(Self {
            uid,
            url,
            file_name: string_field(&document, "filename"),
            file_type: string_field(&document, "content_type"),
            file_size,
            title: string_field(&document, "title"),
            created_at: parse_timestamp(document.get("created_at")),
            updated_at: parse_timestamp(document.get("updated_at")),
            created_by: string_field(&document, "created_by"),
            updated_by: string_field(&document, "updated_by"),
            fields: document,
        })
    }

    /// Build from any JSON value; `None` for non-objects
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_object().cloned().and_then(Self::from_document)
    }

    /// Asset UID.
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Delivery URL of the file.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Original file name.
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// MIME type
    pub fn file_type(&self) -> Option<&str> {
        self.file_type.as_deref()
    }

    /// Size in bytes
    pub fn file_size(&self) -> Option<u64> {
        self.file_size
    }

    /// Asset title.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Upload time.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Last update time.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// UID of the user who uploaded the asset.
    pub fn created_by(&self) -> Option<&str> {
        self.created_by.as_deref()
    }

    /// UID of the user who last updated the asset.
    pub fn updated_by(&self) -> Option<&str> {
        self.updated_by.as_deref()
    }

    /// Any field of the source document, including ones without an accessor
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Every field of the source fragment, in response order.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Asset URL with image transform parameters appended
    pub fn transform_url(&self, transform: &ImageTransform) -> String {
        transform.url(&self.url)
    }

    /// Asset URL with raw transform parameters appended
    pub fn transform_url_with(&self, params: &ParameterBag) -> String {
        build_url(&self.url, params)
    }
}
