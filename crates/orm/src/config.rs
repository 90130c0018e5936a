//! Database configuration
//!
//! `DATABASE_URL` selects the backend by scheme; pool sizing can be tuned with
//! `DATABASE_MAX_CONNECTIONS`, `DATABASE_MIN_CONNECTIONS` and
//! `DATABASE_ACQUIRE_TIMEOUT` (seconds).

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backends::{DatabaseBackendType, DatabasePool, DatabasePoolConfig};
use crate::error::{ModelError, ModelResult};

/// Connection settings for a single database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default)]
    pub pool: DatabasePoolConfig,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pool: DatabasePoolConfig::default(),
        }
    }

    pub fn with_pool(mut self, pool: DatabasePoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Read the configuration from process environment variables
    pub fn from_env() -> ModelResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> ModelResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("DATABASE_URL")
            .ok_or_else(|| ModelError::Configuration("DATABASE_URL is not set".to_string()))?;

        let mut pool = DatabasePoolConfig::default();
        if let Some(value) = parse_var(&lookup, "DATABASE_MAX_CONNECTIONS")? {
            pool.max_connections = value;
        }
        if let Some(value) = parse_var(&lookup, "DATABASE_MIN_CONNECTIONS")? {
            pool.min_connections = value;
        }
        if let Some(value) = parse_var(&lookup, "DATABASE_ACQUIRE_TIMEOUT")? {
            pool.acquire_timeout_seconds = value;
        }

        if pool.min_connections > pool.max_connections {
            return Err(ModelError::Configuration(format!(
                "min_connections ({}) exceeds max_connections ({})",
                pool.min_connections, pool.max_connections
            )));
        }

        Ok(Self { url, pool })
    }

    /// URL safe for logs, with credentials removed
    pub fn redacted_url(&self) -> String {
        match self.url.rsplit_once('@') {
            Some((prefix, host)) => {
                let scheme = prefix.split("://").next().unwrap_or("");
                format!("{}://***@{}", scheme, host)
            }
            None => self.url.clone(),
        }
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> ModelResult<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|_| {
                ModelError::Configuration(format!("{} has an invalid value: '{}'", key, raw))
            })
        })
        .transpose()
}

/// Create a pool for the configured database
pub async fn connect(config: &DatabaseConfig) -> ModelResult<Arc<dyn DatabasePool>> {
    let backend_type = DatabaseBackendType::from_url(&config.url)?;
    tracing::debug!(
        "Connecting to {} database at {} (max_connections={}, min_connections={}, acquire_timeout={}s)",
        backend_type,
        config.redacted_url(),
        config.pool.max_connections,
        config.pool.min_connections,
        config.pool.acquire_timeout_seconds
    );
    backend_type.backend().create_pool(&config.url, &config.pool).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_from_lookup_uses_defaults() {
        let config = DatabaseConfig::from_lookup(lookup(&[("DATABASE_URL", "sqlite::memory:")])).unwrap();
        assert_eq!(config.url, "sqlite::memory:");
        assert_eq!(config.pool, DatabasePoolConfig::default());
    }

    #[test]
    fn test_from_lookup_overrides_pool() {
        let config = DatabaseConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/app"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
            ("DATABASE_MIN_CONNECTIONS", " 2 "),
            ("DATABASE_ACQUIRE_TIMEOUT", "5"),
        ]))
        .unwrap();

        assert_eq!(config.pool.max_connections, 4);
        assert_eq!(config.pool.min_connections, 2);
        assert_eq!(config.pool.acquire_timeout_seconds, 5);
    }

    #[test]
    fn test_from_lookup_rejects_bad_values() {
        assert!(matches!(
            DatabaseConfig::from_lookup(lookup(&[])),
            Err(ModelError::Configuration(_))
        ));
        assert!(DatabaseConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("DATABASE_MAX_CONNECTIONS", "many"),
        ]))
        .is_err());
        assert!(DatabaseConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("DATABASE_MAX_CONNECTIONS", "1"),
            ("DATABASE_MIN_CONNECTIONS", "3"),
        ]))
        .is_err());
    }

    #[test]
    fn test_redacted_url() {
        let config = DatabaseConfig::new("postgres://user:secret@db:5432/app");
        assert_eq!(config.redacted_url(), "postgres://***@db:5432/app");
        assert_eq!(DatabaseConfig::new("sqlite::memory:").redacted_url(), "sqlite::memory:");
    }

    #[test]
    fn test_deserialize_with_default_pool() {
        let config: DatabaseConfig = serde_json::from_str(r#"{"url":"sqlite::memory:"}"#).unwrap();
        assert_eq!(config.pool, DatabasePoolConfig::default());

        let config: DatabaseConfig =
            serde_json::from_str(r#"{"url":"sqlite::memory:","pool":{"max_connections":1}}"#).unwrap();
        assert_eq!(config.pool.max_connections, 1);
        assert_eq!(config.pool.min_connections, 1);
    }

    #[tokio::test]
    async fn test_connect_picks_backend_from_url() {
        let config = DatabaseConfig::new("sqlite::memory:").with_pool(DatabasePoolConfig::single_connection());
        let pool = connect(&config).await.unwrap();
        assert_eq!(pool.sql_dialect(), crate::backends::SqlDialect::SQLite);

        let err = connect(&DatabaseConfig::new("mysql://localhost/app")).await.err();
        assert!(matches!(err, Some(ModelError::Configuration(_))));
    }
}
