//! Ordered request parameters
//!
//! Every builder in the crate writes into a [`ParameterBag`]. Insertion order
//! is kept (a rewrite of an existing key keeps its first position), so the
//! same sequence of writes always produces the same query string.

use serde::Serialize;
use serde_json::{Map, Value};

/// Key that is sent as one JSON-encoded parameter instead of being expanded
pub const QUERY_KEY: &str = "query";

/// Ordered mapping of parameter names to JSON values
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ParameterBag {
    entries: Map<String, Value>,
}

impl ParameterBag {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter. An existing key keeps its position and takes the
    /// new value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Chained form of [`insert`](Self::insert)
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Value of `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Whether `key` is set.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of keys set.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no key is set.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Copy the entries of `other` whose keys are not set in this bag yet,
    /// in `other`'s order. Keys already present keep their value.
    pub fn extend_missing(&mut self, other: &ParameterBag) {
        for (key, value) in other.iter() {
            if !self.entries.contains_key(key) {
                self.entries.insert(key.clone(), value.clone());
            }
        }
    }

    /// Whether a boolean flag is present and true
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.entries.get(key), Some(Value::Bool(true)))
    }

    /// Underlying ordered map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.entries
    }

    /// Expand into URL query pairs.
    ///
    /// - `query` is JSON-encoded as a single pair
    /// - arrays become repeated `key[]` pairs
    /// - objects become bracketed keys (`only[BASE][]=title`)
    /// - `null` values are dropped
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for (key, value) in &self.entries {
            if key == QUERY_KEY {
                if let Value::Object(_) = value {
                    pairs.push((key.clone(), value.to_string()));
                    continue;
                }
            }
            expand_pair(key, value, &mut pairs);
        }
        pairs
    }
}

impl From<Map<String, Value>> for ParameterBag {
    fn from(entries: Map<String, Value>) -> Self {
        Self { entries }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ParameterBag {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut bag = ParameterBag::new();
        for (key, value) in iter {
            bag.insert(key, value);
        }
        bag
    }
}

fn expand_pair(key: &str, value: &Value, pairs: &mut Vec<(String, String)>) {
    match value {
        Value::Null => {}
        Value::Array(items) => {
            let array_key = if key.ends_with("[]") {
                key.to_string()
            } else {
                format!("{}[]", key)
            };
            for item in items {
                match item {
                    Value::Null => {}
                    Value::Array(_) | Value::Object(_) => {
                        pairs.push((array_key.clone(), item.to_string()));
                    }
                    scalar => pairs.push((array_key.clone(), scalar_string(scalar))),
                }
            }
        }
        Value::Object(fields) => {
            for (sub_key, sub_value) in fields {
                expand_pair(&format!("{}[{}]", key, sub_key), sub_value, pairs);
            }
        }
        scalar => pairs.push((key.to_string(), scalar_string(scalar))),
    }
}

/// String form of a JSON value: strings unquoted, everything else displayed
pub(crate) fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
