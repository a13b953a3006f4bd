//! Query construction
//!
//! - `predicate`: typed filter conditions and their `"query"` document form
//! - `projection`: `only` / `except` field lists and reference inclusion
//! - `builder`: the [`Query`] value callers configure

pub mod builder;
pub mod predicate;
pub mod projection;

pub use builder::{Order, Query};
pub use predicate::{CombinatorKind, Comparison, Filter, Membership, Predicate};
pub use projection::{ProjectionResolver, ProjectionSpec, ReferenceInclusionSet, BASE_SCOPE};
