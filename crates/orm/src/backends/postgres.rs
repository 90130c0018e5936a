//! PostgreSQL Backend Implementation
//!
//! PostgreSQL-specific implementation of the database backend traits using
//! sqlx as the underlying driver.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::{Column, Pool, Postgres, Row, TypeInfo, ValueRef};

use super::core::*;
use crate::error::{OrmError, OrmResult};

/// PostgreSQL database backend implementation
#[derive(Debug, Default)]
pub struct PostgresBackend;

impl PostgresBackend {
    /// Create a new PostgreSQL backend instance
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DatabaseBackend for PostgresBackend {
    async fn create_pool(&self, database_url: &str, config: &DatabasePoolConfig) -> OrmResult<Arc<dyn DatabasePool>> {
        self.validate_database_url(database_url)?;

        let mut options = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .test_before_acquire(config.test_before_acquire);

        if let Some(idle_timeout) = config.idle_timeout_seconds {
            options = options.idle_timeout(Duration::from_secs(idle_timeout));
        }

        if let Some(max_lifetime) = config.max_lifetime_seconds {
            options = options.max_lifetime(Duration::from_secs(max_lifetime));
        }

        let sqlx_pool = options.connect(database_url).await.map_err(|e| {
            tracing::error!("Failed to create PostgreSQL pool: {}", e);
            OrmError::Connection(format!("Failed to create PostgreSQL pool: {}", e))
        })?;

        tracing::info!(
            "PostgreSQL pool created with {} max connections",
            config.max_connections
        );
        Ok(Arc::new(PostgresPool::new(sqlx_pool)))
    }

    fn sql_dialect(&self) -> SqlDialect {
        SqlDialect::PostgreSQL
    }

    fn backend_type(&self) -> crate::backends::DatabaseBackendType {
        crate::backends::DatabaseBackendType::PostgreSQL
    }

    fn validate_database_url(&self, url: &str) -> OrmResult<()> {
        let parsed = url::Url::parse(url)
            .map_err(|e| OrmError::Configuration(format!("Invalid database URL: {}", e)))?;

        if !matches!(parsed.scheme(), "postgres" | "postgresql") {
            return Err(OrmError::Configuration("Invalid PostgreSQL URL scheme".to_string()));
        }
        if parsed.host_str().is_none() {
            return Err(OrmError::Configuration("Missing host in database URL".to_string()));
        }
        if parsed.path().trim_start_matches('/').is_empty() {
            return Err(OrmError::Configuration("Missing database name in URL".to_string()));
        }
        Ok(())
    }
}

/// PostgreSQL connection pool implementation
pub struct PostgresPool {
    pool: Pool<Postgres>,
}

impl PostgresPool {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn build<'q>(sql: &'q str, params: &[DatabaseValue]) -> OrmResult<sqlx::query::Query<'q, Postgres, PgArguments>> {
        params
            .iter()
            .try_fold(sqlx::query(sql), bind_database_value)
    }
}

#[async_trait]
impl DatabasePool for PostgresPool {
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
            .map(|row| Box::new(PostgresRow::new(row)) as Box<dyn DatabaseRow>)
            .collect())
    }

    async fn fetch_optional(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Option<Box<dyn DatabaseRow>>> {
        let row = Self::build(sql, params)?
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| OrmError::QueryExecution(e.to_string()))?;

        Ok(row.map(|r| Box::new(PostgresRow::new(r)) as Box<dyn DatabaseRow>))
    }

    fn sql_dialect(&self) -> SqlDialect {
        SqlDialect::PostgreSQL
    }

    async fn close(&self) -> OrmResult<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// PostgreSQL row implementation
pub struct PostgresRow {
    row: PgRow,
}

impl PostgresRow {
    pub fn new(row: PgRow) -> Self {
        Self { row }
    }
}

impl DatabaseRow for PostgresRow {
    fn get_by_index(&self, index: usize) -> OrmResult<DatabaseValue> {
        postgres_value_to_database_value(&self.row, index)
    }

    fn get_by_name(&self, name: &str) -> OrmResult<DatabaseValue> {
        let index = self
            .row
            .columns()
            .iter()
            .position(|col| col.name() == name)
            .ok_or_else(|| OrmError::ColumnNotFound(name.to_string()))?;

        postgres_value_to_database_value(&self.row, index)
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
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    value: &DatabaseValue,
) -> OrmResult<sqlx::query::Query<'q, Postgres, PgArguments>> {
    match value {
        DatabaseValue::Null => Ok(query.bind(Option::<String>::None)),
        DatabaseValue::Bool(b) => Ok(query.bind(*b)),
        DatabaseValue::Int32(i) => Ok(query.bind(*i)),
        DatabaseValue::Int64(i) => Ok(query.bind(*i)),
        DatabaseValue::Float32(f) => Ok(query.bind(*f)),
        DatabaseValue::Float64(f) => Ok(query.bind(*f)),
        DatabaseValue::String(s) => Ok(query.bind(s.clone())),
        DatabaseValue::Bytes(b) => Ok(query.bind(b.clone())),
        DatabaseValue::Uuid(u) => Ok(query.bind(*u)),
        DatabaseValue::DateTime(dt) => Ok(query.bind(*dt)),
        DatabaseValue::Date(d) => Ok(query.bind(*d)),
        DatabaseValue::Time(t) => Ok(query.bind(*t)),
        DatabaseValue::Json(j) => Ok(query.bind(j.clone())),
        DatabaseValue::Array(_) => Err(OrmError::Validation(
            "Array binding is not supported for PostgreSQL".to_string(),
        )),
    }
}

fn decode_error(kind: &str, e: sqlx::Error) -> OrmError {
    OrmError::Serialization(format!("Failed to get {} value: {}", kind, e))
}

/// NUMERIC becomes a double; values outside f64 keep their exact text
fn numeric_to_database_value(value: Decimal) -> DatabaseValue {
    value
        .to_f64()
        .map(DatabaseValue::Float64)
        .unwrap_or_else(|| DatabaseValue::String(value.to_string()))
}

/// Convert a PostgreSQL column value to DatabaseValue
fn postgres_value_to_database_value(row: &PgRow, index: usize) -> OrmResult<DatabaseValue> {
    let raw = row
        .try_get_raw(index)
        .map_err(|e| OrmError::ColumnNotFound(e.to_string()))?;
    if raw.is_null() {
        return Ok(DatabaseValue::Null);
    }

    let type_name = row.columns()[index].type_info().name().to_string();
    match type_name.as_str() {
        "BOOL" => row.try_get(index).map(DatabaseValue::Bool).map_err(|e| decode_error("bool", e)),
        "INT2" => row
            .try_get::<i16, _>(index)
            .map(|v| DatabaseValue::Int32(i32::from(v)))
            .map_err(|e| decode_error("int16", e)),
        "INT4" => row.try_get(index).map(DatabaseValue::Int32).map_err(|e| decode_error("int32", e)),
        "INT8" => row.try_get(index).map(DatabaseValue::Int64).map_err(|e| decode_error("int64", e)),
        "FLOAT4" => row.try_get(index).map(DatabaseValue::Float32).map_err(|e| decode_error("float32", e)),
        "FLOAT8" => row.try_get(index).map(DatabaseValue::Float64).map_err(|e| decode_error("float64", e)),
        "BYTEA" => row.try_get(index).map(DatabaseValue::Bytes).map_err(|e| decode_error("bytes", e)),
        "UUID" => row.try_get(index).map(DatabaseValue::Uuid).map_err(|e| decode_error("UUID", e)),
        "TIMESTAMPTZ" => row
            .try_get(index)
            .map(DatabaseValue::DateTime)
            .map_err(|e| decode_error("datetime", e)),
        "TIMESTAMP" => row
            .try_get::<chrono::NaiveDateTime, _>(index)
            .map(|v| DatabaseValue::DateTime(v.and_utc()))
            .map_err(|e| decode_error("datetime", e)),
        "DATE" => row.try_get(index).map(DatabaseValue::Date).map_err(|e| decode_error("date", e)),
        "TIME" => row.try_get(index).map(DatabaseValue::Time).map_err(|e| decode_error("time", e)),
        "NUMERIC" => row
            .try_get::<Decimal, _>(index)
            .map(numeric_to_database_value)
            .map_err(|e| decode_error("numeric", e)),
        "JSON" | "JSONB" => row
            .try_get::<JsonValue, _>(index)
            .map(DatabaseValue::Json)
            .map_err(|e| decode_error("JSON", e)),
        _ => row
            .try_get(index)
            .map(DatabaseValue::String)
            .map_err(|e| decode_error(&format!("'{}'", type_name), e)),
    }
}
