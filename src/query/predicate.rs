//! Filter predicates and their `"query"` document form
//!
//! A [`Filter`] is an ordered conjunction of [`Predicate`]s. Adding a
//! predicate equal to one already present is a no-op, so repeated identical
//! calls do not change the serialized document. Any other predicate is kept,
//! including conflicting ones on the same field.

use serde_json::{Map, Value};
use tracing::debug;

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl Comparison {
    /// Wire operator. `Eq` has none: equality is written as `field: value`.
    pub fn operator(&self) -> Option<&'static str> {
        match self {
            Comparison::Eq => None,
            Comparison::Ne => Some("$ne"),
            Comparison::Lt => Some("$lt"),
            Comparison::Lte => Some("$lte"),
            Comparison::Gt => Some("$gt"),
            Comparison::Gte => Some("$gte"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Membership {
    In,
    NotIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CombinatorKind {
    And,
    Or,
}

impl CombinatorKind {
    pub fn operator(&self) -> &'static str {
        match self {
            CombinatorKind::And => "$and",
            CombinatorKind::Or => "$or",
        }
    }
}

/// One filter condition or a logical grouping of conditions
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Comparison {
        field: String,
        op: Comparison,
        value: Value,
    },
    Membership {
        field: String,
        kind: Membership,
        values: Vec<Value>,
    },
    Existence {
        field: String,
        present: bool,
    },
    Pattern {
        field: String,
        regex: String,
        options: Option<String>,
    },
    TagMatch(Vec<String>),
    Combinator {
        kind: CombinatorKind,
        children: Vec<Filter>,
    },
    /// Match entries whose reference field points at entries matching `filter`
    ReferenceMatch {
        field: String,
        kind: Membership,
        filter: Filter,
    },
}

/// Field tags reads and writes
const TAGS_FIELD: &str = "tags";

impl Predicate {
    fn clause(&self) -> Clause {
        match self {
            Predicate::Comparison { op, value, .. } => match op.operator() {
                None => Clause::Equals(value.clone()),
                Some(operator) => Clause::operators([(operator, value.clone())]),
            },
            Predicate::Membership { kind, values, .. } => {
                let operator = match kind {
                    Membership::In => "$in",
                    Membership::NotIn => "$nin",
                };
                Clause::operators([(operator, Value::Array(values.clone()))])
            }
            Predicate::Existence { present, .. } => {
                Clause::operators([("$exists", Value::Bool(*present))])
            }
            Predicate::Pattern { regex, options, .. } => {
                let mut ops = vec![("$regex", Value::String(regex.clone()))];
                if let Some(options) = options.as_ref().filter(|o| !o.is_empty()) {
                    ops.push(("$options", Value::String(options.clone())));
                }
                Clause::operators(ops)
            }
            Predicate::TagMatch(tags) => Clause::Equals(Value::from(tags.clone())),
            Predicate::Combinator { children, .. } => Clause::Equals(Value::Array(
                children.iter().map(|c| Value::Object(c.to_document())).collect(),
            )),
            Predicate::ReferenceMatch { kind, filter, .. } => {
                let operator = match kind {
                    Membership::In => "$in_query",
                    Membership::NotIn => "$nin_query",
                };
                Clause::operators([(operator, Value::Object(filter.to_document()))])
            }
        }
    }

    /// Field name this predicate constrains (empty for combinators)
    pub fn field(&self) -> &str {
        match self {
            Predicate::Comparison { field, .. }
            | Predicate::Membership { field, .. }
            | Predicate::Existence { field, .. }
            | Predicate::Pattern { field, .. }
            | Predicate::ReferenceMatch { field, .. } => field,
            Predicate::TagMatch(_) => TAGS_FIELD,
            Predicate::Combinator { .. } => "",
        }
    }
}

/// Document form of the predicates on one field
enum Clause {
    Equals(Value),
    Operators(Map<String, Value>),
}

impl Clause {
    fn operators<'a>(ops: impl IntoIterator<Item = (&'a str, Value)>) -> Self {
        Clause::Operators(ops.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    fn into_value(self) -> Value {
        match self {
            Clause::Equals(value) => value,
            Clause::Operators(ops) => Value::Object(ops),
        }
    }
}

/// Ordered conjunction of predicates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    predicates: Vec<Predicate>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predicate. A predicate equal to one already present is dropped.
    pub fn push(&mut self, predicate: Predicate) {
        if !self.predicates.contains(&predicate) {
            self.predicates.push(predicate);
        }
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Build the `"query"` document.
    ///
    /// Distinct operators on the same field merge into one object. A clause
    /// that cannot share the field's key (a second equality, an equality next
    /// to operators, or an operator already set) is appended to `$and` after
    /// any explicit `and` children. Repeated `and` groups are concatenated;
    /// a repeated `or` group goes to `$and` as its own member.
    pub fn to_document(&self) -> Map<String, Value> {
        let mut document: Map<String, Value> = Map::new();
        let mut equality_fields: Vec<&str> = Vec::new();
        let mut overflow: Vec<Value> = Vec::new();

        for predicate in &self.predicates {
            if let Predicate::Combinator { kind, children } = predicate {
                if children.is_empty() {
                    debug!(operator = kind.operator(), "Empty combinator passed through");
                }
                let group = predicate.clause().into_value();
                match (document.get_mut(kind.operator()), kind, group) {
                    (None, _, group) => {
                        document.insert(kind.operator().to_string(), group);
                    }
                    (Some(Value::Array(existing)), CombinatorKind::And, Value::Array(more)) => {
                        existing.extend(more);
                    }
                    (Some(_), _, group) => {
                        let mut repeated = Map::new();
                        repeated.insert(kind.operator().to_string(), group);
                        overflow.push(Value::Object(repeated));
                    }
                }
                continue;
            }

            let field = predicate.field();
            let clause = predicate.clause();
            let is_equality = matches!(clause, Clause::Equals(_));

            match (document.get_mut(field), clause) {
                (None, clause) => {
                    if is_equality {
                        equality_fields.push(field);
                    }
                    document.insert(field.to_string(), clause.into_value());
                }
                (Some(Value::Object(existing)), Clause::Operators(ops))
                    if !equality_fields.contains(&field)
                        && !ops.keys().any(|op| existing.contains_key(op)) =>
                {
                    existing.extend(ops);
                }
                (Some(_), clause) => {
                    let mut conflicting = Map::new();
                    conflicting.insert(field.to_string(), clause.into_value());
                    overflow.push(Value::Object(conflicting));
                }
            }
        }

        if !overflow.is_empty() {
            match document.get_mut("$and") {
                Some(Value::Array(existing)) => existing.extend(overflow),
                _ => {
                    document.insert("$and".to_string(), Value::Array(overflow));
                }
            }
        }

        document
    }
}
