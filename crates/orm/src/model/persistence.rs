//! Minimal persistence for entities: insert, update, delete and fetch
//!
//! Every statement goes through a [`DatabasePool`], so callers wrapping the
//! pool in a query log see all of them.

use chrono::Utc;

use crate::backends::{DatabasePool, DatabaseValue, SqlDialect};
use crate::collection::Collection;
use crate::error::{ModelError, ModelResult};
use crate::security::{escape_identifier, validate_identifier};

use super::core_trait::Model;
use super::entity::Entity;

fn select_sql<M: Model>(dialect: SqlDialect, with_trashed: bool, limit_one: bool, by_key: bool) -> String {
    let table = escape_identifier(M::table_name());
    let key = escape_identifier(M::primary_key_name());
    let mut conditions = Vec::new();

    if by_key {
        conditions.push(format!("{} = {}", key, dialect.parameter_placeholder(0)));
    }
    if !with_trashed {
        if let Some(column) = M::soft_delete_column() {
            conditions.push(format!("{} IS NULL", escape_identifier(column)));
        }
    }

    let mut sql = format!("SELECT * FROM {}", table);
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    sql.push_str(&format!(" ORDER BY {}", key));
    if limit_one {
        sql.push_str(" LIMIT 1");
    }
    sql
}

impl<M: Model> Entity<M> {
    /// All rows that are not soft deleted, ordered by primary key
    pub async fn all(pool: &dyn DatabasePool) -> ModelResult<Collection<M>> {
        Self::fetch_collection(pool, false).await
    }

    /// All rows including soft deleted ones, ordered by primary key
    pub async fn all_with_trashed(pool: &dyn DatabasePool) -> ModelResult<Collection<M>> {
        Self::fetch_collection(pool, true).await
    }

    /// First row that is not soft deleted
    pub async fn first(pool: &dyn DatabasePool) -> ModelResult<Option<Self>> {
        let sql = select_sql::<M>(pool.sql_dialect(), false, true, false);
        pool.fetch_optional(&sql, &[])
            .await?
            .map(|row| Self::from_row(row.as_ref()))
            .transpose()
    }

    /// Row with the given primary key, unless soft deleted
    pub async fn find(pool: &dyn DatabasePool, key: impl Into<DatabaseValue>) -> ModelResult<Option<Self>> {
        let sql = select_sql::<M>(pool.sql_dialect(), false, true, true);
        pool.fetch_optional(&sql, &[key.into()])
            .await?
            .map(|row| Self::from_row(row.as_ref()))
            .transpose()
    }

    async fn fetch_collection(pool: &dyn DatabasePool, with_trashed: bool) -> ModelResult<Collection<M>> {
        let sql = select_sql::<M>(pool.sql_dialect(), with_trashed, false, false);
        let rows = pool.fetch_all(&sql, &[]).await?;
        rows.iter()
            .map(|row| Self::from_row(row.as_ref()))
            .collect::<ModelResult<Vec<_>>>()
            .map(Collection::new)
    }

    /// Insert a new entity or write the dirty attributes of a stored one
    pub async fn save(&mut self, pool: &dyn DatabasePool) -> ModelResult<()> {
        if self.exists() {
            self.update(pool).await
        } else {
            self.insert(pool).await
        }
    }

    async fn insert(&mut self, pool: &dyn DatabasePool) -> ModelResult<()> {
        let dialect = pool.sql_dialect();
        let mut columns: Vec<(&String, &DatabaseValue)> = self
            .attributes()
            .current()
            .iter()
            .filter(|(name, value)| !(name.as_str() == M::primary_key_name() && value.is_null()))
            .collect();
        columns.sort_by(|a, b| a.0.cmp(b.0));

        let table = escape_identifier(M::table_name());
        let sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES RETURNING *", table)
        } else {
            let mut names = Vec::with_capacity(columns.len());
            for (name, _) in &columns {
                validate_identifier(name)?;
                names.push(escape_identifier(name));
            }
            let placeholders: Vec<String> = (0..columns.len())
                .map(|i| dialect.parameter_placeholder(i))
                .collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
                table,
                names.join(", "),
                placeholders.join(", ")
            )
        };
        let params: Vec<DatabaseValue> = columns.into_iter().map(|(_, value)| value.clone()).collect();

        let row = pool
            .fetch_optional(&sql, &params)
            .await?
            .ok_or_else(|| ModelError::QueryExecution(format!("Insert into {} returned no row", M::table_name())))?;

        self.attributes_mut().replace_synced(row.to_map()?);
        self.set_exists(true);
        tracing::debug!("Inserted {} row {:?}", M::table_name(), self.key());
        Ok(())
    }

    async fn update(&mut self, pool: &dyn DatabasePool) -> ModelResult<()> {
        let key = self.key().cloned().ok_or(ModelError::MissingPrimaryKey)?;
        let dialect = pool.sql_dialect();

        let mut dirty: Vec<(String, DatabaseValue)> = self
            .attributes()
            .dirty()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        if dirty.is_empty() {
            return Ok(());
        }
        dirty.sort_by(|a, b| a.0.cmp(&b.0));

        let mut assignments = Vec::with_capacity(dirty.len());
        for (i, (name, _)) in dirty.iter().enumerate() {
            validate_identifier(name)?;
            assignments.push(format!("{} = {}", escape_identifier(name), dialect.parameter_placeholder(i)));
        }
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = {}",
            escape_identifier(M::table_name()),
            assignments.join(", "),
            escape_identifier(M::primary_key_name()),
            dialect.parameter_placeholder(dirty.len())
        );
        let mut params: Vec<DatabaseValue> = dirty.iter().map(|(_, value)| value.clone()).collect();
        params.push(key);

        pool.execute(&sql, &params).await?;
        for (name, _) in &dirty {
            self.sync_original_attribute(name);
        }
        Ok(())
    }

    /// Soft delete when the model supports it, otherwise remove the row
    pub async fn delete(&mut self, pool: &dyn DatabasePool) -> ModelResult<()> {
        let key = self.key().cloned().ok_or(ModelError::MissingPrimaryKey)?;
        let dialect = pool.sql_dialect();
        let table = escape_identifier(M::table_name());
        let key_column = escape_identifier(M::primary_key_name());

        match M::soft_delete_column() {
            Some(column) => {
                let deleted_at = DatabaseValue::DateTime(Utc::now());
                let sql = format!(
                    "UPDATE {} SET {} = {} WHERE {} = {}",
                    table,
                    escape_identifier(column),
                    dialect.parameter_placeholder(0),
                    key_column,
                    dialect.parameter_placeholder(1)
                );
                pool.execute(&sql, &[deleted_at.clone(), key]).await?;
                self.set(column, deleted_at);
                self.sync_original_attribute(column);
            }
            None => {
                let sql = format!(
                    "DELETE FROM {} WHERE {} = {}",
                    table,
                    key_column,
                    dialect.parameter_placeholder(0)
                );
                pool.execute(&sql, &[key]).await?;
                self.set_exists(false);
            }
        }
        Ok(())
    }
}
