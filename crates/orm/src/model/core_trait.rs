//! Core Model Trait - static metadata for a database table
//!
//! Models describe their table; row data lives in [`Entity`](super::Entity).

use crate::backends::DatabaseValue;
use crate::relationships::RelationRegistry;

/// Core trait for database models
pub trait Model: Send + Sync + 'static {
    /// Table name for this model
    fn table_name() -> &'static str;

    /// Primary key column
    fn primary_key_name() -> &'static str {
        "id"
    }

    /// Column marking a row as soft deleted, if the model supports it
    fn soft_delete_column() -> Option<&'static str> {
        None
    }

    /// Check if this model supports soft deletes
    fn uses_soft_deletes() -> bool {
        Self::soft_delete_column().is_some()
    }

    /// Attribute values a freshly constructed entity starts with
    fn default_attributes() -> Vec<(&'static str, DatabaseValue)> {
        Vec::new()
    }

    /// Relations this model declares
    fn relations() -> RelationRegistry {
        RelationRegistry::new()
    }
}
