//! Field projections and reference inclusion
//!
//! `only` / `except` lists are kept per scope: `BASE` for the top-level
//! document, or a reference path for fields of a referenced entry. The last
//! list written to a scope wins.

use crate::params::ParameterBag;
use serde_json::{Map, Value};

/// Scope key for top-level projections
pub const BASE_SCOPE: &str = "BASE";

/// Allow/deny field lists, keyed by scope
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectionSpec {
    only: Map<String, Value>,
    except: Map<String, Value>,
}

impl ProjectionSpec {
    pub fn set_only<I, S>(&mut self, scope: &str, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only.insert(scope.to_string(), field_list(fields));
    }

    pub fn set_except<I, S>(&mut self, scope: &str, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.except.insert(scope.to_string(), field_list(fields));
    }

    /// Fields allowed in `scope`, if an `only` list was set for it
    pub fn only(&self, scope: &str) -> Option<Vec<&str>> {
        self.only.get(scope).map(as_str_list)
    }

    pub fn except(&self, scope: &str) -> Option<Vec<&str>> {
        self.except.get(scope).map(as_str_list)
    }

    pub fn is_empty(&self) -> bool {
        self.only.is_empty() && self.except.is_empty()
    }

    /// Write `only` and `except` into `bag`. Both are sent when both are
    /// set; precedence is decided by the server.
    pub fn write_to(&self, bag: &mut ParameterBag) {
        if !self.only.is_empty() {
            bag.insert("only", Value::Object(self.only.clone()));
        }
        if !self.except.is_empty() {
            bag.insert("except", Value::Object(self.except.clone()));
        }
    }
}

fn field_list<I, S>(fields: I) -> Value
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Value::Array(fields.into_iter().map(|f| Value::String(f.into())).collect())
}

fn as_str_list(value: &Value) -> Vec<&str> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

/// Ordered set of dotted reference paths to resolve
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceInclusionSet {
    paths: Vec<String>,
}

impl ReferenceInclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a path. Adding a path that is already present is a no-op.
    pub fn insert(&mut self, path: impl Into<String>) {
        let path = path.into();
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn write_to(&self, bag: &mut ParameterBag) {
        if !self.paths.is_empty() {
            bag.insert("include[]", Value::from(self.paths.clone()));
        }
    }
}

impl<S: Into<String>> FromIterator<S> for ReferenceInclusionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = ReferenceInclusionSet::new();
        for path in iter {
            set.insert(path);
        }
        set
    }
}

/// Projection and inclusion state shared by queries and single-entry requests
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectionResolver {
    pub(crate) projection: ProjectionSpec,
    pub(crate) includes: ReferenceInclusionSet,
}

impl ProjectionResolver {
    pub fn only<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection.set_only(BASE_SCOPE, fields);
    }

    pub fn except<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection.set_except(BASE_SCOPE, fields);
    }

    pub fn only_with_reference_uid<I, S>(&mut self, fields: I, reference_path: &str)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection.set_only(reference_path, fields);
    }

    pub fn except_with_reference_uid<I, S>(&mut self, fields: I, reference_path: &str)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection.set_except(reference_path, fields);
    }

    pub fn include_reference(&mut self, path: impl Into<String>) {
        self.includes.insert(path);
    }

    pub fn projection(&self) -> &ProjectionSpec {
        &self.projection
    }

    pub fn includes(&self) -> &ReferenceInclusionSet {
        &self.includes
    }

    pub fn write_to(&self, bag: &mut ParameterBag) {
        self.projection.write_to(bag);
        self.includes.write_to(bag);
    }
}
