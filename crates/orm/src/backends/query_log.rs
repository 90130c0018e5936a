//! Query logging pool wrapper
//!
//! Wraps any [`DatabasePool`] and records every statement sent through it
//! while logging is enabled, so callers can assert how many round trips an
//! operation made.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::core::*;
use crate::error::OrmResult;

/// A statement observed by [`QueryLoggingPool`]
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedQuery {
    pub sql: String,
    pub params: Vec<DatabaseValue>,
    pub elapsed: Duration,
}

/// Pool decorator that records executed statements
pub struct QueryLoggingPool {
    inner: Arc<dyn DatabasePool>,
    enabled: AtomicBool,
    log: RwLock<Vec<LoggedQuery>>,
}

impl QueryLoggingPool {
    /// Wrap a pool; logging starts disabled
    pub fn new(inner: Arc<dyn DatabasePool>) -> Self {
        Self {
            inner,
            enabled: AtomicBool::new(false),
            log: RwLock::new(Vec::new()),
        }
    }

    /// Start recording statements
    pub fn enable_query_log(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    /// Stop recording statements; already recorded entries are kept
    pub fn disable_query_log(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    /// Drop every recorded entry
    pub fn flush_query_log(&self) {
        self.log.write().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Snapshot of the recorded statements
    pub fn query_log(&self) -> Vec<LoggedQuery> {
        self.log.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn record(&self, sql: &str, params: &[DatabaseValue], started: Instant) {
        if !self.enabled.load(Ordering::SeqCst) {
            return;
        }
        let elapsed = started.elapsed();
        tracing::trace!("query log: {} ({:?})", sql, elapsed);
        self.log
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(LoggedQuery {
                sql: sql.to_string(),
                params: params.to_vec(),
                elapsed,
            });
    }
}

#[async_trait]
impl DatabasePool for QueryLoggingPool {
    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<u64> {
        let started = Instant::now();
        let result = self.inner.execute(sql, params).await;
        self.record(sql, params, started);
        result
    }

    async fn fetch_all(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Vec<Box<dyn DatabaseRow>>> {
        let started = Instant::now();
        let result = self.inner.fetch_all(sql, params).await;
        self.record(sql, params, started);
        result
    }

    async fn fetch_optional(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Option<Box<dyn DatabaseRow>>> {
        let started = Instant::now();
        let result = self.inner.fetch_optional(sql, params).await;
        self.record(sql, params, started);
        result
    }

    fn sql_dialect(&self) -> SqlDialect {
        self.inner.sql_dialect()
    }

    async fn close(&self) -> OrmResult<()> {
        self.inner.close().await
    }
}
