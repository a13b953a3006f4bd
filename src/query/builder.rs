//! Entry query builder
//!
//! A [`Query`] is a plain value: every method consumes it and returns the
//! updated query, and nothing touches the network until it is handed to
//! [`FetchPipeline::find`](crate::pipeline::FetchPipeline::find) or one of
//! its siblings. The pipeline reads a snapshot via [`Query::parameters`], so
//! changing a query after issuing it only affects later requests.

use super::predicate::{CombinatorKind, Comparison, Filter, Membership, Predicate};
use super::projection::{ProjectionResolver, ReferenceInclusionSet};
use crate::error::DeliveryError;
use crate::params::{ParameterBag, QUERY_KEY};
use serde_json::Value;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Ascending,
    Descending,
}

/// Filtered, projected, sorted, paginated view of a content type's entries
///
/// # Example
///
/// ```rust
/// use delivery_sdk::Query;
///
/// let query = Query::new("product")
///     .greater_than("price", 100)
///     .contained_in("color", ["red", "blue"])
///     .only(["title", "price"])
///     .include_reference("brand")
///     .include_count()
///     .limit(10);
///
/// let pairs = query.parameters().to_query_pairs();
/// assert!(pairs.iter().any(|(k, _)| k == "query"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    content_type_uid: String,
    filter: Filter,
    resolver: ProjectionResolver,
    params: ParameterBag,
    invalid: Option<String>,
}

impl Query {
    /// Create an empty query over `content_type_uid`
    pub fn new(content_type_uid: impl Into<String>) -> Self {
        Self {
            content_type_uid: content_type_uid.into(),
            ..Default::default()
        }
    }

    /// Content type this query reads.
    pub fn content_type_uid(&self) -> &str {
        &self.content_type_uid
    }

    /// Filter predicates added so far.
    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Reference paths to resolve.
    pub fn includes(&self) -> &ReferenceInclusionSet {
        self.resolver.includes()
    }

    // ==================== Predicates ====================

    /// Entries where `field` equals `value`
    pub fn where_eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(field, Comparison::Eq, value)
    }

    /// Entries where `field` is not `value`.
    pub fn not_equal_to(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(field, Comparison::Ne, value)
    }

    /// Entries where `field` is below `value`.
    pub fn less_than(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(field, Comparison::Lt, value)
    }

    /// Entries where `field` is at most `value`.
    pub fn less_than_or_equal_to(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(field, Comparison::Lte, value)
    }

    /// Entries where `field` is above `value`.
    pub fn greater_than(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(field, Comparison::Gt, value)
    }

    /// Entries where `field` is at least `value`.
    pub fn greater_than_or_equal_to(
        self,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.compare(field, Comparison::Gte, value)
    }

    /// Entries where `field` is one of `values`. An empty list is sent as-is.
    pub fn contained_in<I, V>(self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.membership(field, Membership::In, values)
    }

    /// Entries where `field` is none of `values`.
    pub fn not_contained_in<I, V>(self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.membership(field, Membership::NotIn, values)
    }

    /// Entries that have `field`.
    pub fn exists(self, field: impl Into<String>) -> Self {
        self.existence(field, true)
    }

    /// Entries that lack `field`.
    pub fn not_exists(self, field: impl Into<String>) -> Self {
        self.existence(field, false)
    }

    /// Entries where `field` matches `pattern`. The pattern is not compiled
    /// locally; an empty pattern fails the next request without sending it.
    pub fn regex(
        mut self,
        field: impl Into<String>,
        pattern: impl Into<String>,
        options: Option<&str>,
    ) -> Self {
        let field = field.into();
        let pattern = pattern.into();
        if pattern.is_empty() {
            self.reject(format!("regex pattern for field '{}' is empty", field));
        }
        self.push(Predicate::Pattern {
            field,
            regex: pattern,
            options: options.map(str::to_string),
        })
    }

    /// Entries carrying the given tags
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter
            .push(Predicate::TagMatch(tags.into_iter().map(Into::into).collect()));
        self
    }

    /// Entries matching every child query. Each child's predicates are
    /// nested verbatim, in order; everything else on the children is ignored.
    pub fn and(self, children: impl IntoIterator<Item = Query>) -> Self {
        self.combine(CombinatorKind::And, children)
    }

    /// Entries matching at least one child query
    pub fn or(self, children: impl IntoIterator<Item = Query>) -> Self {
        self.combine(CombinatorKind::Or, children)
    }

    /// Entries whose reference `field` points at entries matching `query`
    pub fn where_in(self, field: impl Into<String>, query: Query) -> Self {
        self.reference(field, Membership::In, query)
    }

    /// Entries whose reference `field` points at no entry matching `query`
    pub fn where_not_in(self, field: impl Into<String>, query: Query) -> Self {
        self.reference(field, Membership::NotIn, query)
    }

    // ==================== Projection ====================

    /// Return only `fields` of each top-level entry.
    pub fn only<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resolver.only(fields);
        self
    }

    /// Leave `fields` out of each top-level entry.
    pub fn except<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resolver.except(fields);
        self
    }

    /// Restrict the fields returned for the referenced entries at `reference_path`
    pub fn only_with_reference_uid<I, S>(mut self, fields: I, reference_path: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resolver.only_with_reference_uid(fields, reference_path);
        self
    }

    /// Leave `fields` out of the entries referenced through `reference_path`.
    pub fn except_with_reference_uid<I, S>(mut self, fields: I, reference_path: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resolver.except_with_reference_uid(fields, reference_path);
        self
    }

    /// Resolve the reference at the dotted `path` into the returned entries
    pub fn include_reference(mut self, path: impl Into<String>) -> Self {
        self.resolver.include_reference(path);
        self
    }

    // ==================== Paging, sorting, flags ====================

    /// Skip the first `skip` matches.
    pub fn skip(self, skip: u64) -> Self {
        self.add_param("skip", skip)
    }

    /// Return at most `limit` matches.
    pub fn limit(self, limit: u64) -> Self {
        self.add_param("limit", limit)
    }

    /// Sort by `field`, lowest first.
    pub fn ascending(self, field: impl Into<String>) -> Self {
        self.sort(field, Order::Ascending)
    }

    /// Sort by `field`, highest first.
    pub fn descending(self, field: impl Into<String>) -> Self {
        self.sort(field, Order::Descending)
    }

    /// Sort by `field` in `order`.
    pub fn sort(self, field: impl Into<String>, order: Order) -> Self {
        match order {
            Order::Ascending => self.add_param("asc", field.into()),
            Order::Descending => self.add_param("desc", field.into()),
        }
    }

    /// Typeahead search over entry text
    pub fn search(self, text: impl Into<String>) -> Self {
        self.add_param("typeahead", text.into())
    }

    /// Read entries published in locale `code`.
    pub fn locale(self, code: impl Into<String>) -> Self {
        self.add_param("locale", code.into())
    }

    /// Ask for the total number of matching entries
    pub fn include_count(self) -> Self {
        self.add_param("include_count", true)
    }

    /// Ask for the content type schema (legacy `schema` key)
    pub fn include_schema(self) -> Self {
        self.add_param("include_schema", true)
    }

    /// Ask for the full content type (`content_type` key)
    pub fn include_content_type(self) -> Self {
        self.add_param("include_content_type", true)
    }

    /// Ask for `_content_type_uid` on referenced entries.
    pub fn include_reference_content_type_uid(self) -> Self {
        self.add_param("include_reference_content_type_uid", true)
    }

    /// Fall back to the master locale for entries missing in `locale`
    pub fn include_fallback(self) -> Self {
        self.add_param("include_fallback", true)
    }

    /// Set an arbitrary request parameter.
    ///
    /// `query`, `only`, `except` and `include[]` are owned by the typed
    /// filter and projection methods: a value set here is only sent while
    /// the matching typed state is empty.
    pub fn add_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key, value);
        self
    }

    // ==================== Snapshot ====================

    /// Compose the request parameters: `query`, projections, `include[]`,
    /// then every other parameter in the order it was first set.
    pub fn parameters(&self) -> ParameterBag {
        let mut bag = ParameterBag::new();
        if !self.filter.is_empty() {
            bag.insert(QUERY_KEY, Value::Object(self.filter.to_document()));
        }
        self.resolver.write_to(&mut bag);
        bag.extend_missing(&self.params);
        bag
    }

    /// The first input this query could not accept, if any
    pub fn validate(&self) -> Result<(), DeliveryError> {
        match &self.invalid {
            Some(reason) => Err(DeliveryError::Validation(reason.clone())),
            None => Ok(()),
        }
    }

    pub(crate) fn flag(&self, key: &str) -> bool {
        self.params.flag(key)
    }

    // ==================== Internals ====================

    fn compare(
        mut self,
        field: impl Into<String>,
        op: Comparison,
        value: impl Into<Value>,
    ) -> Self {
        let field = self.checked_field(field);
        self.push(Predicate::Comparison {
            field,
            op,
            value: value.into(),
        })
    }

    fn membership<I, V>(mut self, field: impl Into<String>, kind: Membership, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let field = self.checked_field(field);
        self.push(Predicate::Membership {
            field,
            kind,
            values: values.into_iter().map(Into::into).collect(),
        })
    }

    fn existence(mut self, field: impl Into<String>, present: bool) -> Self {
        let field = self.checked_field(field);
        self.push(Predicate::Existence { field, present })
    }

    fn combine(mut self, kind: CombinatorKind, children: impl IntoIterator<Item = Query>) -> Self {
        let mut filters = Vec::new();
        for child in children {
            if let Some(reason) = child.invalid {
                self.reject(reason);
            }
            filters.push(child.filter);
        }
        self.push(Predicate::Combinator {
            kind,
            children: filters,
        })
    }

    fn reference(mut self, field: impl Into<String>, kind: Membership, query: Query) -> Self {
        let field = self.checked_field(field);
        if let Some(reason) = query.invalid {
            self.reject(reason);
        }
        self.push(Predicate::ReferenceMatch {
            field,
            kind,
            filter: query.filter,
        })
    }

    fn checked_field(&mut self, field: impl Into<String>) -> String {
        let field = field.into();
        if field.is_empty() {
            self.reject("field name is empty".to_string());
        }
        field
    }

    fn push(mut self, predicate: Predicate) -> Self {
        self.filter.push(predicate);
        self
    }

    fn reject(&mut self, reason: String) {
        if self.invalid.is_none() {
            self.invalid = Some(reason);
        }
    }
}
