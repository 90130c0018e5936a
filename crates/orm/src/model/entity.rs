//! Entity - a row of a model's table
//!
//! Declared default attributes are applied once, in [`Entity::new`]. Rows
//! hydrated from storage never see defaults, and nothing else re-applies
//! them.

use std::fmt;
use std::marker::PhantomData;

use crate::backends::{DatabaseRow, DatabaseValue};
use crate::error::ModelResult;

use super::attributes::Attributes;
use super::core_trait::Model;

pub struct Entity<M: Model> {
    attributes: Attributes,
    exists: bool,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Entity<M> {
    /// New, unsaved entity carrying the model's default attributes
    pub fn new() -> Self {
        let mut attributes = Attributes::new();
        for (name, value) in M::default_attributes() {
            attributes.set(name, value);
        }
        attributes.sync_original();

        Self {
            attributes,
            exists: false,
            _model: PhantomData,
        }
    }

    /// Entity hydrated from a stored row
    pub fn from_row(row: &dyn DatabaseRow) -> ModelResult<Self> {
        Ok(Self {
            attributes: Attributes::from_synced(row.to_map()?),
            exists: true,
            _model: PhantomData,
        })
    }

    /// Set an attribute, builder style
    pub fn with(mut self, name: &str, value: impl Into<DatabaseValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&DatabaseValue> {
        self.attributes.get(name)
    }

    pub fn get_original(&self, name: &str) -> Option<&DatabaseValue> {
        self.attributes.get_original(name)
    }

    pub fn set(&mut self, name: &str, value: impl Into<DatabaseValue>) {
        self.attributes.set(name, value);
    }

    pub fn is_dirty(&self, name: &str) -> bool {
        self.attributes.is_dirty(name)
    }

    /// True when no attribute differs from its original value
    pub fn is_clean(&self) -> bool {
        self.attributes.dirty().is_empty()
    }

    /// Copy the current value of `name` into the original snapshot
    pub fn sync_original_attribute(&mut self, name: &str) {
        self.attributes.sync_original_attribute(name);
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub(crate) fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    /// Primary key value, if set
    pub fn key(&self) -> Option<&DatabaseValue> {
        self.get(M::primary_key_name()).filter(|value| !value.is_null())
    }

    /// Whether the entity is backed by a stored row
    pub fn exists(&self) -> bool {
        self.exists
    }

    pub(crate) fn set_exists(&mut self, exists: bool) {
        self.exists = exists;
    }

    /// Whether the entity has been soft deleted
    pub fn is_trashed(&self) -> bool {
        M::soft_delete_column()
            .and_then(|column| self.get(column))
            .is_some_and(|value| !value.is_null())
    }

    pub fn to_json(&self) -> serde_json::Value {
        self.attributes.to_json()
    }
}

impl<M: Model> Default for Entity<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> Clone for Entity<M> {
    fn clone(&self) -> Self {
        Self {
            attributes: self.attributes.clone(),
            exists: self.exists,
            _model: PhantomData,
        }
    }
}

impl<M: Model> fmt::Debug for Entity<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("table", &M::table_name())
            .field("exists", &self.exists)
            .field("attributes", &self.attributes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Post;

    impl Model for Post {
        fn table_name() -> &'static str {
            "posts"
        }

        fn soft_delete_column() -> Option<&'static str> {
            Some("deleted_at")
        }

        fn default_attributes() -> Vec<(&'static str, DatabaseValue)> {
            vec![("some_default_value", DatabaseValue::Int64(100))]
        }
    }

    #[test]
    fn test_new_applies_defaults_once() {
        let post = Entity::<Post>::new();
        assert_eq!(post.get("some_default_value"), Some(&DatabaseValue::Int64(100)));
        assert!(post.is_clean());
        assert!(!post.exists());
        assert_eq!(post.key(), None);
    }

    #[test]
    fn test_overridden_default_is_dirty() {
        let post = Entity::<Post>::new().with("some_default_value", 200i64);
        assert!(post.is_dirty("some_default_value"));
        assert_eq!(post.get_original("some_default_value"), Some(&DatabaseValue::Int64(100)));
    }

    #[test]
    fn test_key_ignores_null() {
        let post = Entity::<Post>::new().with("id", DatabaseValue::Null);
        assert_eq!(post.key(), None);
        let post = post.with("id", 4i64);
        assert_eq!(post.key(), Some(&DatabaseValue::Int64(4)));
    }

    #[test]
    fn test_is_trashed() {
        let mut post = Entity::<Post>::new();
        assert!(!post.is_trashed());
        post.set("deleted_at", DatabaseValue::Null);
        assert!(!post.is_trashed());
        post.set("deleted_at", "2024-01-01T00:00:00Z");
        assert!(post.is_trashed());
    }
}
