//! The entry point: an executor plus dialect, cache and configuration.

use crate::cache::{CacheBackend, QueryCache};
use crate::config::DbConfig;
use crate::dialect::{Dialect, Postgres};
use crate::executor::Executor;
use crate::field::Target;
use crate::plan::{JoinOp, QueryPlan};
use std::sync::Arc;

/// Starts query plans against one executor.
///
/// ```ignore
/// let (client, connection) = tokio_postgres::connect(&url, NoTls).await?;
/// tokio::spawn(connection);
/// let db = Db::new(client).with_cache(Arc::new(MemoryCache::new()));
///
/// let player = Player::fields();
/// let players = db.query(&player).where_().is_true(player.active).select().await?;
/// ```
pub struct Db<E> {
    executor: E,
    dialect: Arc<dyn Dialect>,
    cache: Option<QueryCache>,
    config: DbConfig,
}

impl<E: Executor> Db<E> {
    /// PostgreSQL dialect, no cache, default configuration.
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            dialect: Arc::new(Postgres),
            cache: None,
            config: DbConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DbConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_dialect(mut self, dialect: impl Dialect + 'static) -> Self {
        self.dialect = Arc::new(dialect);
        self
    }

    /// Read SELECTs through `backend` and invalidate it on writes.
    pub fn with_cache(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.cache = Some(QueryCache::new(backend));
        self
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    pub fn query_cache(&self) -> Option<&QueryCache> {
        self.cache.as_ref()
    }

    /// Start a plan on `target`: a model reference, a relation handle or a
    /// select-capable plan used as a derived table.
    pub fn query<T: Target + ?Sized>(&self, target: &T) -> QueryPlan<'_, E, T::Model> {
        self.query_with(target, Vec::new())
    }

    /// Start a plan with lazy joins registered for some columns.
    pub fn query_with<T: Target + ?Sized>(
        &self,
        target: &T,
        join_ops: Vec<JoinOp>,
    ) -> QueryPlan<'_, E, T::Model> {
        QueryPlan::new(self, target, join_ops)
    }

    /// Wait for outstanding cache writes and invalidations.
    pub async fn settle(&self) {
        if let Some(cache) = &self.cache {
            cache.settle().await;
        }
    }

    pub(crate) fn dialect_arc(&self) -> Arc<dyn Dialect> {
        Arc::clone(&self.dialect)
    }

    pub(crate) fn caching_enabled(&self) -> bool {
        self.config.caching_enabled && self.cache.is_some()
    }

    pub(crate) fn log_sql(&self, kind: &'static str, sql: &str, param_count: usize) {
        if let Some(logger) = &self.config.sql_log {
            logger.log(kind, sql, param_count);
        }
    }
}

impl<E> std::fmt::Debug for Db<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db")
            .field("dialect", &self.dialect.name())
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
