//! Relationship Registry - name to relation lookup for a model
//!
//! Names are stored snake-cased, so `commentWithLikes` and
//! `comment_with_likes` resolve to the same relation.

use std::collections::HashMap;

use crate::error::{ModelError, ModelResult};

use super::has_many::Relation;
use super::naming::to_snake_case;

/// Relations declared by one model
#[derive(Debug, Clone, Default)]
pub struct RelationRegistry {
    relations: HashMap<String, Relation>,
}

impl RelationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a relation, builder style
    pub fn define(mut self, name: &str, relation: impl Into<Relation>) -> Self {
        self.register(name, relation);
        self
    }

    /// Declare a relation; a later definition with the same name replaces it
    pub fn register(&mut self, name: &str, relation: impl Into<Relation>) {
        self.relations.insert(to_snake_case(name), relation.into());
    }

    pub fn get(&self, name: &str) -> Option<&Relation> {
        self.relations.get(&to_snake_case(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Look up a relation for `model`, failing with `InvalidRelation`
    pub fn resolve(&self, model: &str, name: &str) -> ModelResult<&Relation> {
        let relation = self
            .get(name)
            .ok_or_else(|| ModelError::invalid_relation(model, name))?;
        relation.validate()?;
        Ok(relation)
    }

    /// Declared relation names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.relations.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }
}
