//! Database Backend Abstractions
//!
//! This module provides database backend abstractions so the ORM can run on
//! PostgreSQL and SQLite through common traits and interfaces.

pub mod core;
pub mod postgres;
pub mod query_log;
pub mod sqlite;

use std::sync::Arc;

// Re-export core traits and types
pub use core::*;
pub use postgres::PostgresBackend;
pub use query_log::{LoggedQuery, QueryLoggingPool};
pub use sqlite::SqliteBackend;

use crate::error::{OrmError, OrmResult};

/// Database backend type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseBackendType {
    PostgreSQL,
    SQLite,
}

impl DatabaseBackendType {
    /// Detect database backend type from URL
    pub fn from_url(url: &str) -> OrmResult<Self> {
        if url.starts_with("postgresql://") || url.starts_with("postgres://") {
            Ok(DatabaseBackendType::PostgreSQL)
        } else if url.starts_with("sqlite:") {
            Ok(DatabaseBackendType::SQLite)
        } else {
            Err(OrmError::Configuration(format!(
                "Unable to detect database backend from URL: {}",
                url
            )))
        }
    }

    /// Backend implementation for this type
    pub fn backend(self) -> Arc<dyn DatabaseBackend> {
        match self {
            DatabaseBackendType::PostgreSQL => Arc::new(PostgresBackend::new()),
            DatabaseBackendType::SQLite => Arc::new(SqliteBackend::new()),
        }
    }
}

impl std::fmt::Display for DatabaseBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseBackendType::PostgreSQL => write!(f, "postgresql"),
            DatabaseBackendType::SQLite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for DatabaseBackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(DatabaseBackendType::PostgreSQL),
            "sqlite" => Ok(DatabaseBackendType::SQLite),
            _ => Err(format!("Unsupported database backend: {}", s)),
        }
    }
}
