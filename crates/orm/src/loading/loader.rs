//! Aggregate loader - resolves requests, runs one query, assigns results
//!
//! Entities are only touched once the full result set has been read and
//! decoded. Any error before that point leaves the collection as it was.

use std::collections::{HashMap, HashSet};

use crate::backends::{DatabasePool, DatabaseValue};
use crate::error::{ModelError, ModelResult};
use crate::model::{Entity, Model};

use super::query::{build_aggregate_query, AggregateColumn, PARENT_KEY_COLUMN};
use super::request::{AggregateFunction, RelationTarget};

/// Loads one aggregate function for many relations onto a set of entities
pub struct AggregateLoader<'p> {
    pool: &'p dyn DatabasePool,
    function: AggregateFunction,
    column: Option<String>,
    as_stated: bool,
}

impl<'p> AggregateLoader<'p> {
    pub fn new(pool: &'p dyn DatabasePool, function: AggregateFunction) -> Self {
        Self {
            pool,
            function,
            column: None,
            as_stated: false,
        }
    }

    /// Column aggregated by `SUM`, `MIN`, `MAX` and `AVG`
    pub fn column(mut self, column: &str) -> Self {
        self.column = Some(column.to_string());
        self
    }

    /// Aggregate relations exactly as declared, refusing call-level filters
    pub fn as_stated(mut self) -> Self {
        self.as_stated = true;
        self
    }

    pub async fn load<M: Model>(&self, entities: &mut [Entity<M>], targets: Vec<RelationTarget>) -> ModelResult<()> {
        if entities.is_empty() || targets.is_empty() {
            return Ok(());
        }

        let columns = self.resolve::<M>(targets)?;

        let mut seen = HashSet::new();
        let keys: Vec<DatabaseValue> = entities
            .iter()
            .filter_map(|entity| entity.key().cloned())
            .filter(|key| seen.insert(key.key_string()))
            .collect();

        let results = if keys.is_empty() {
            tracing::debug!(
                "No stored {} entities, assigning default {} values",
                M::table_name(),
                self.function
            );
            HashMap::new()
        } else {
            self.fetch::<M>(&columns, &keys, &seen).await?
        };

        for entity in entities.iter_mut() {
            let row = entity.key().and_then(|key| results.get(&key.key_string()));
            for column in &columns {
                let value = row
                    .and_then(|values| values.get(&column.alias))
                    .cloned()
                    .unwrap_or_else(|| self.function.default_value());
                entity.set(&column.alias, value);
                entity.sync_original_attribute(&column.alias);
            }
        }

        Ok(())
    }

    /// Turn requested targets into validated columns, one per alias
    fn resolve<M: Model>(&self, targets: Vec<RelationTarget>) -> ModelResult<Vec<AggregateColumn>> {
        let registry = M::relations();
        let mut columns: Vec<AggregateColumn> = Vec::with_capacity(targets.len());

        for target in targets {
            let relation = registry.resolve(M::table_name(), &target.relation)?;
            if self.as_stated && !target.filters.is_empty() {
                return Err(ModelError::Validation(format!(
                    "Relation '{}' must be aggregated as declared, without extra filters",
                    target.relation
                )));
            }

            let alias = target.attribute_name(self.function, self.column.as_deref());
            if columns.iter().any(|c| c.alias == alias) {
                tracing::debug!("Skipping duplicate aggregate alias {}", alias);
                continue;
            }

            let column = AggregateColumn {
                alias,
                relation: relation.clone(),
                function: self.function,
                column: self.column.clone(),
                filters: target.filters,
            };
            column.validate()?;
            columns.push(column);
        }

        Ok(columns)
    }

    async fn fetch<M: Model>(
        &self,
        columns: &[AggregateColumn],
        keys: &[DatabaseValue],
        requested: &HashSet<String>,
    ) -> ModelResult<HashMap<String, HashMap<String, DatabaseValue>>> {
        let query = build_aggregate_query(
            self.pool.sql_dialect(),
            M::table_name(),
            M::primary_key_name(),
            columns,
            keys,
        )?;
        tracing::debug!("Loading {} aggregates for {} {}: {}", self.function, keys.len(), M::table_name(), query.sql);

        let rows = self.pool.fetch_all(&query.sql, &query.params).await?;

        let mut results = HashMap::with_capacity(rows.len());
        for row in rows {
            let key = row.get_by_name(PARENT_KEY_COLUMN)?.key_string();
            if !requested.contains(&key) {
                tracing::warn!("Aggregate row for unknown {} key {}", M::table_name(), key);
                continue;
            }

            let mut values = HashMap::with_capacity(columns.len());
            for column in columns {
                let raw = row.get_by_name(&column.alias)?;
                values.insert(column.alias.clone(), self.normalize(raw)?);
            }
            results.insert(key, values);
        }

        Ok(results)
    }

    /// Counts become integers and existence checks become booleans on every backend
    fn normalize(&self, value: DatabaseValue) -> ModelResult<DatabaseValue> {
        match self.function {
            AggregateFunction::Count if value.is_null() => Ok(DatabaseValue::Int64(0)),
            AggregateFunction::Count => value.as_i64().map(DatabaseValue::Int64).ok_or_else(|| {
                ModelError::Serialization(format!("Count returned a non-integer value: {:?}", value))
            }),
            AggregateFunction::Exists if value.is_null() => Ok(DatabaseValue::Bool(false)),
            AggregateFunction::Exists => value.as_bool().map(DatabaseValue::Bool).ok_or_else(|| {
                ModelError::Serialization(format!("Exists returned a non-boolean value: {:?}", value))
            }),
            _ => Ok(value),
        }
    }
}
