//! Relationships Module - relation metadata consumed by aggregate loading

pub mod filters;
pub mod has_many;
pub mod naming;
pub mod registry;

pub use filters::{FilterBuilder, RelationFilter};
pub use has_many::{HasMany, JoinClause, Relation};
pub use naming::to_snake_case;
pub use registry::RelationRegistry;
