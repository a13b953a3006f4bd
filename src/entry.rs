//! Materialized entries

use crate::asset::Asset;
use crate::error::FieldError;
use crate::materialize::is_reference_stub;
use crate::types::{parse_timestamp, string_field};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Key resolved references carry their content type under
pub const CONTENT_TYPE_UID_KEY: &str = "_content_type_uid";

/// One entry as returned by a single fetch.
///
/// Field values are kept as JSON in response order. Typed reads go through
/// [`get_as`](Self::get_as) or the scalar helpers, which return `None` or an
/// error instead of panicking on a shape mismatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    uid: String,
    content_type_uid: String,
    title: Option<String>,
    locale: Option<String>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    created_by: Option<String>,
    updated_by: Option<String>,
    fields: Map<String, Value>,
}

impl Entry {
    /// Build from a JSON object. Returns `None` when it has no string `uid`.
    pub fn from_document(
        content_type_uid: impl Into<String>,
        document: Map<String, Value>,
    ) -> Option<Self> {
        let uid = string_field(&document, "uid")?;

        Some(Self {
            uid,
            content_type_uid: content_type_uid.into(),
            title: string_field(&document, "title"),
            locale: string_field(&document, "locale"),
            created_at: parse_timestamp(document.get("created_at")),
            updated_at: parse_timestamp(document.get("updated_at")),
            created_by: string_field(&document, "created_by"),
            updated_by: string_field(&document, "updated_by"),
            fields: document,
        })
    }

    /// Entry UID.
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// UID of the content type this entry belongs to.
    pub fn content_type_uid(&self) -> &str {
        &self.content_type_uid
    }

    /// Entry title, if the response carried one.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Locale the entry was published in.
    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    /// Creation time.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Last update time.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// UID of the user who created the entry.
    pub fn created_by(&self) -> Option<&str> {
        self.created_by.as_deref()
    }

    /// UID of the user who last updated the entry.
    pub fn updated_by(&self) -> Option<&str> {
        self.updated_by.as_deref()
    }

    /// Every field of the entry, in response order.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Consume the entry and return its field map
    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    /// Whether the entry has a field named `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Raw value of `key`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// String value of `key`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Integer value of `key`.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    /// Float value of `key`.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    /// Boolean value of `key`.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// Decode `key` into `T`
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T, FieldError> {
        let value = self
            .get(key)
            .ok_or_else(|| FieldError::Missing(key.to_string()))?;
        serde_json::from_value(value.clone()).map_err(|source| FieldError::Type {
            field: key.to_string(),
            source,
        })
    }

    /// The asset held by `field`, read from this entry's own data.
    ///
    /// For an array field the first asset is returned. `None` when the
    /// field is absent or does not hold asset data.
    pub fn get_asset(&self, field: &str) -> Option<Asset> {
        match self.get(field)? {
            Value::Array(items) => items.iter().find_map(Asset::from_value),
            value => Asset::from_value(value),
        }
    }

    /// Every asset held by `field`, in field order. Non-asset items are
    /// skipped; an absent or non-asset field yields an empty list.
    pub fn get_assets(&self, field: &str) -> Vec<Asset> {
        match self.get(field) {
            Some(Value::Array(items)) => items.iter().filter_map(Asset::from_value).collect(),
            Some(value) => Asset::from_value(value).into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// Resolved entries held by the reference `field`.
    ///
    /// Unresolved reference stubs are skipped. The content type comes from
    /// each document's `_content_type_uid`, when present.
    pub fn get_references(&self, field: &str) -> Vec<Entry> {
        let items: Vec<&Value> = match self.get(field) {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(value @ Value::Object(_)) => vec![value],
            _ => return Vec::new(),
        };

        items
            .into_iter()
            .filter_map(Value::as_object)
            .filter(|doc| !is_reference_stub(doc))
            .filter_map(|doc| {
                let content_type = string_field(doc, CONTENT_TYPE_UID_KEY).unwrap_or_default();
                Entry::from_document(content_type, doc.clone())
            })
            .collect()
    }
}
