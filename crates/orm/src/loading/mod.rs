//! Aggregate loading for collections of entities
//!
//! Counts, sums and existence checks over a model's relations are loaded for
//! a whole collection with a single query and stored as plain attributes.

pub mod loader;
pub mod query;
pub mod request;

pub use loader::AggregateLoader;
pub use query::{build_aggregate_query, AggregateColumn, AggregateQuery};
pub use request::{AggregateFunction, IntoRelationTargets, RelationTarget};
