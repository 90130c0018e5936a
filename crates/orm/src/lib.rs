//! # tally-orm: relation aggregates for entity collections
//!
//! A small async ORM core built on sqlx. Models describe their table and
//! relations; entities carry attributes with dirty tracking; collections
//! load relation counts and other aggregates for all of their entities with
//! one query per call.
//!
//! PostgreSQL and SQLite are supported through the [`backends`] module.

pub mod backends;
pub mod collection;
pub mod config;
pub mod error;
pub mod loading;
pub mod model;
pub mod relationships;
pub mod security;

pub use backends::{
    DatabaseBackendType, DatabasePool, DatabasePoolConfig, DatabaseRow, DatabaseValue, LoggedQuery,
    QueryLoggingPool, SqlDialect,
};
pub use collection::Collection;
pub use config::{connect, DatabaseConfig};
pub use error::{ModelError, ModelResult, OrmError, OrmResult};
pub use loading::{AggregateFunction, IntoRelationTargets, RelationTarget};
pub use model::{Attributes, Entity, Model};
pub use relationships::{FilterBuilder, HasMany, Relation, RelationFilter, RelationRegistry};
