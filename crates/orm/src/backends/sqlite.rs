//! SQLite Backend Implementation
//!
//! SQLite implementation of the database backend traits using sqlx. Values
//! are decoded by their runtime storage class, since expression columns such
//! as aggregate sub-selects carry no declared type.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteArguments, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Pool, Row, Sqlite, TypeInfo, ValueRef};

use super::core::*;
use crate::error::{OrmError, OrmResult};

/// SQLite database backend implementation
#[derive(Debug, Default)]
pub struct SqliteBackend;

impl SqliteBackend {
    /// Create a new SQLite backend instance
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DatabaseBackend for SqliteBackend {
    async fn create_pool(&self, database_url: &str, config: &DatabasePoolConfig) -> OrmResult<Arc<dyn DatabasePool>> {
        self.validate_database_url(database_url)?;

        if database_url.contains(":memory:") && config.max_connections > 1 {
            tracing::warn!(
                "In-memory SQLite pool with {} connections: every connection sees its own database",
                config.max_connections
            );
        }

        let options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .test_before_acquire(config.test_before_acquire)
            .idle_timeout(config.idle_timeout_seconds.map(Duration::from_secs))
            .max_lifetime(config.max_lifetime_seconds.map(Duration::from_secs));

        let sqlx_pool = options.connect(database_url).await.map_err(|e| {
            tracing::error!("Failed to create SQLite pool: {}", e);
            OrmError::Connection(format!("Failed to create SQLite pool: {}", e))
        })?;

        tracing::debug!("SQLite pool created for {}", database_url);
        Ok(Arc::new(SqlitePool::new(sqlx_pool)))
    }

    fn sql_dialect(&self) -> SqlDialect {
        SqlDialect::SQLite
    }

    fn backend_type(&self) -> crate::backends::DatabaseBackendType {
        crate::backends::DatabaseBackendType::SQLite
    }

    fn validate_database_url(&self, url: &str) -> OrmResult<()> {
        match url.strip_prefix("sqlite:") {
            Some(rest) if !rest.trim_start_matches('/').is_empty() => Ok(()),
            Some(_) => Err(OrmError::Configuration("Missing SQLite database path".to_string())),
            None => Err(OrmError::Configuration("Invalid SQLite URL scheme".to_string())),
        }
    }
}

/// SQLite connection pool implementation
pub struct SqlitePool {
    pool: Pool<Sqlite>,
}

impl SqlitePool {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn build<'q>(sql: &'q str, params: &[DatabaseValue]) -> OrmResult<sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>> {
        params
            .iter()
            .try_fold(sqlx::query(sql), bind_database_value)
    }
}

#[async_trait]
impl DatabasePool for SqlitePool {
    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<u64> {
        let result = Self::build(sql, params)?
            .execute(&self.pool)
            .await
            .map_err(|e| OrmError::QueryExecution(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn fetch_all(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Vec<Box<dyn DatabaseRow>>> {
        let rows = Self::build(sql, params)?
            .fetch_all(&self.pool)
            .await
            .map_err(|e| OrmError::QueryExecution(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| Box::new(SqliteDbRow::new(row)) as Box<dyn DatabaseRow>)
            .collect())
    }

    async fn fetch_optional(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Option<Box<dyn DatabaseRow>>> {
        let row = Self::build(sql, params)?
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| OrmError::QueryExecution(e.to_string()))?;

        Ok(row.map(|r| Box::new(SqliteDbRow::new(r)) as Box<dyn DatabaseRow>))
    }

    fn sql_dialect(&self) -> SqlDialect {
        SqlDialect::SQLite
    }

    async fn close(&self) -> OrmResult<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// SQLite row implementation
pub struct SqliteDbRow {
    row: SqliteRow,
}

impl SqliteDbRow {
    pub fn new(row: SqliteRow) -> Self {
        Self { row }
    }
}

impl DatabaseRow for SqliteDbRow {
    fn get_by_index(&self, index: usize) -> OrmResult<DatabaseValue> {
        sqlite_value_to_database_value(&self.row, index)
    }

    fn get_by_name(&self, name: &str) -> OrmResult<DatabaseValue> {
        let index = self
            .row
            .columns()
            .iter()
            .position(|col| col.name() == name)
            .ok_or_else(|| OrmError::ColumnNotFound(name.to_string()))?;

        sqlite_value_to_database_value(&self.row, index)
    }

    fn column_count(&self) -> usize {
        self.row.len()
    }

    fn column_names(&self) -> Vec<String> {
        self.row.columns().iter().map(|col| col.name().to_string()).collect()
    }
}

/// Bind a DatabaseValue to a sqlx query
fn bind_database_value<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &DatabaseValue,
) -> OrmResult<sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>> {
    match value {
        DatabaseValue::Null => Ok(query.bind(Option::<String>::None)),
        DatabaseValue::Bool(b) => Ok(query.bind(*b)),
        DatabaseValue::Int32(i) => Ok(query.bind(*i)),
        DatabaseValue::Int64(i) => Ok(query.bind(*i)),
        DatabaseValue::Float32(f) => Ok(query.bind(*f)),
        DatabaseValue::Float64(f) => Ok(query.bind(*f)),
        DatabaseValue::String(s) => Ok(query.bind(s.clone())),
        DatabaseValue::Bytes(b) => Ok(query.bind(b.clone())),
        DatabaseValue::Uuid(u) => Ok(query.bind(u.to_string())),
        DatabaseValue::DateTime(dt) => Ok(query.bind(*dt)),
        DatabaseValue::Date(d) => Ok(query.bind(*d)),
        DatabaseValue::Time(t) => Ok(query.bind(*t)),
        DatabaseValue::Json(j) => Ok(query.bind(j.to_string())),
        DatabaseValue::Array(_) => Err(OrmError::Validation(
            "Array binding is not supported for SQLite".to_string(),
        )),
    }
}

fn decode_error(kind: &str, e: sqlx::Error) -> OrmError {
    OrmError::Serialization(format!("Failed to get {} value: {}", kind, e))
}

/// Convert a SQLite column value to DatabaseValue by its storage class
fn sqlite_value_to_database_value(row: &SqliteRow, index: usize) -> OrmResult<DatabaseValue> {
    let raw = row
        .try_get_raw(index)
        .map_err(|e| OrmError::ColumnNotFound(e.to_string()))?;
    if raw.is_null() {
        return Ok(DatabaseValue::Null);
    }

    let storage_class = raw.type_info().name().to_string();
    match storage_class.as_str() {
        "INTEGER" | "BIGINT" | "INT8" | "BOOLEAN" => row
            .try_get_unchecked::<i64, _>(index)
            .map(DatabaseValue::Int64)
            .map_err(|e| decode_error("integer", e)),
        "REAL" | "NUMERIC" => row
            .try_get_unchecked::<f64, _>(index)
            .map(DatabaseValue::Float64)
            .map_err(|e| decode_error("real", e)),
        "BLOB" => row
            .try_get_unchecked::<Vec<u8>, _>(index)
            .map(DatabaseValue::Bytes)
            .map_err(|e| decode_error("blob", e)),
        _ => row
            .try_get_unchecked::<String, _>(index)
            .map(DatabaseValue::String)
            .map_err(|e| decode_error("text", e)),
    }
}
