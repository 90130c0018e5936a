//! Collection - an ordered set of entities of one model
//!
//! Besides plain vector access, a collection can load relation aggregates
//! (`load_count`, `load_sum`, ...) onto all of its entities at once.
//!
//! ```ignore
//! let mut posts = Entity::<Post>::all_with_trashed(&pool).await?;
//! posts.load_count(&pool, ["comments", "likes as total_likes"]).await?;
//! assert_eq!(posts[0].get("comments_count"), Some(&DatabaseValue::Int64(2)));
//! ```

use std::ops::{Index, IndexMut};

use crate::backends::DatabasePool;
use crate::error::ModelResult;
use crate::loading::{AggregateFunction, AggregateLoader, IntoRelationTargets};
use crate::model::{Entity, Model};

pub struct Collection<M: Model> {
    items: Vec<Entity<M>>,
}

impl<M: Model> Collection<M> {
    pub fn new(items: Vec<Entity<M>>) -> Self {
        Self { items }
    }

    /// Collection over the given entities
    pub fn make(items: impl IntoIterator<Item = Entity<M>>) -> Self {
        items.into_iter().collect()
    }

    pub fn push(&mut self, entity: Entity<M>) {
        self.items.push(entity);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Entity<M>> {
        self.items.get(index)
    }

    pub fn first(&self) -> Option<&Entity<M>> {
        self.items.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entity<M>> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Entity<M>> {
        self.items.iter_mut()
    }

    pub fn into_vec(self) -> Vec<Entity<M>> {
        self.items
    }

    /// Load `<relation>_count` onto every entity with a single query
    ///
    /// Entities without related rows get `0`. The loaded attribute is not
    /// dirty afterwards; no other attribute changes.
    pub async fn load_count(&mut self, pool: &dyn DatabasePool, relations: impl IntoRelationTargets) -> ModelResult<()> {
        AggregateLoader::new(pool, AggregateFunction::Count)
            .load(&mut self.items, relations.into_relation_targets())
            .await
    }

    /// Like [`load_count`](Self::load_count), counting each relation exactly
    /// as declared; targets carrying extra filters are rejected
    pub async fn load_count_as_stated(
        &mut self,
        pool: &dyn DatabasePool,
        relations: impl IntoRelationTargets,
    ) -> ModelResult<()> {
        AggregateLoader::new(pool, AggregateFunction::Count)
            .as_stated()
            .load(&mut self.items, relations.into_relation_targets())
            .await
    }

    /// Load any aggregate function over `column` of each relation
    ///
    /// `column` is ignored by `Count` and `Exists`.
    pub async fn load_aggregate(
        &mut self,
        pool: &dyn DatabasePool,
        relations: impl IntoRelationTargets,
        function: AggregateFunction,
        column: Option<&str>,
    ) -> ModelResult<()> {
        let mut loader = AggregateLoader::new(pool, function);
        if let Some(column) = column.filter(|_| function.requires_column()) {
            loader = loader.column(column);
        }
        loader.load(&mut self.items, relations.into_relation_targets()).await
    }

    pub async fn load_sum(&mut self, pool: &dyn DatabasePool, relations: impl IntoRelationTargets, column: &str) -> ModelResult<()> {
        self.load_aggregate(pool, relations, AggregateFunction::Sum, Some(column)).await
    }

    /// Smallest `column` value per entity, in the column's own type
    ///
    /// PostgreSQL NUMERIC columns come back as `Float64`.
    pub async fn load_min(&mut self, pool: &dyn DatabasePool, relations: impl IntoRelationTargets, column: &str) -> ModelResult<()> {
        self.load_aggregate(pool, relations, AggregateFunction::Min, Some(column)).await
    }

    pub async fn load_max(&mut self, pool: &dyn DatabasePool, relations: impl IntoRelationTargets, column: &str) -> ModelResult<()> {
        self.load_aggregate(pool, relations, AggregateFunction::Max, Some(column)).await
    }

    pub async fn load_avg(&mut self, pool: &dyn DatabasePool, relations: impl IntoRelationTargets, column: &str) -> ModelResult<()> {
        self.load_aggregate(pool, relations, AggregateFunction::Avg, Some(column)).await
    }

    /// Load `<relation>_exists` booleans onto every entity
    pub async fn load_exists(&mut self, pool: &dyn DatabasePool, relations: impl IntoRelationTargets) -> ModelResult<()> {
        self.load_aggregate(pool, relations, AggregateFunction::Exists, None).await
    }
}

impl<M: Model> Default for Collection<M> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<M: Model> Clone for Collection<M> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
        }
    }
}

impl<M: Model> std::fmt::Debug for Collection<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

impl<M: Model> Index<usize> for Collection<M> {
    type Output = Entity<M>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.items[index]
    }
}

impl<M: Model> IndexMut<usize> for Collection<M> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.items[index]
    }
}

impl<M: Model> FromIterator<Entity<M>> for Collection<M> {
    fn from_iter<I: IntoIterator<Item = Entity<M>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<M: Model> IntoIterator for Collection<M> {
    type Item = Entity<M>;
    type IntoIter = std::vec::IntoIter<Entity<M>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, M: Model> IntoIterator for &'a Collection<M> {
    type Item = &'a Entity<M>;
    type IntoIter = std::slice::Iter<'a, Entity<M>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
