//! Read-through result cache with table-scoped invalidation.
//!
//! Every cached SELECT is registered against each table it read from. A
//! write to a table drops every key registered against it. Cache failures
//! are logged and never reach the caller; a broken backend only costs the
//! database round trip it would have saved.

mod memory;
mod registry;

pub use memory::{DEFAULT_CAPACITY, MemoryCache};
pub use registry::CacheRegistry;

use crate::error::OrmResult;
use crate::param::Param;
use crate::record::Record;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, oneshot};

/// Storage for serialized result sets.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> OrmResult<Option<String>>;

    async fn set(&self, key: &str, value: String) -> OrmResult<()>;

    async fn delete(&self, keys: &[String]) -> OrmResult<()>;
}

/// Backend work, applied by one worker task in the order it was queued.
#[derive(Debug)]
enum CacheCommand {
    Store { key: String, payload: String },
    Remove { keys: Vec<String> },
    Flush { done: oneshot::Sender<()> },
}

/// The cache a [`Db`](crate::Db) reads through.
///
/// Writes and invalidations reach the backend through a single queue, so a
/// slow write can never land after the delete that invalidated it.
pub struct QueryCache {
    backend: Arc<dyn CacheBackend>,
    registry: CacheRegistry,
    worker: Mutex<Option<mpsc::UnboundedSender<CacheCommand>>>,
}

impl QueryCache {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            registry: CacheRegistry::new(),
            worker: Mutex::new(None),
        }
    }

    /// Cache key for compiled SQL and its bind values.
    ///
    /// The SQL carries placeholders, so the values take part in the key
    /// through their `Debug` rendering.
    pub fn key(sql: &str, args: &[Param]) -> String {
        let signature = format!("{sql}: {args:?}");
        blake3::hash(signature.as_bytes()).to_hex().to_string()
    }

    pub fn registry(&self) -> &CacheRegistry {
        &self.registry
    }

    /// Cached rows for `key`. Misses, backend errors and unreadable
    /// payloads all come back as `None`.
    pub async fn get(&self, key: &str) -> Option<Vec<Record>> {
        let payload = match self.backend.get(key).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                tracing::trace!(target: "fieldplan.cache", key, "miss");
                return None;
            }
            Err(err) => {
                tracing::warn!(target: "fieldplan.cache", key, error = %err, "cache read failed");
                return None;
            }
        };
        match serde_json::from_str(&payload) {
            Ok(records) => {
                tracing::trace!(target: "fieldplan.cache", key, "hit");
                Some(records)
            }
            Err(err) => {
                tracing::warn!(target: "fieldplan.cache", key, error = %err, "cached payload is unreadable");
                None
            }
        }
    }

    /// Register `key` against `tables` and store `records` in the background.
    pub fn set(&self, tables: &[String], key: String, records: &[Record]) {
        let payload = match serde_json::to_string(records) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(target: "fieldplan.cache", key = %key, error = %err, "rows are not serializable");
                return;
            }
        };
        // Registration and queueing happen under one lock so an
        // invalidation cannot slip in between them.
        let mut worker = self.lock_worker();
        self.registry.register(tables, &key);
        self.enqueue(&mut worker, CacheCommand::Store { key, payload });
    }

    /// Drop every key registered against any of `tables`, in the background.
    pub fn drop_entries(&self, tables: &[String]) {
        let mut worker = self.lock_worker();
        let keys = self.registry.keys_for(tables);
        if keys.is_empty() {
            return;
        }
        self.registry.forget(&keys);
        tracing::debug!(
            target: "fieldplan.cache",
            tables = ?tables,
            count = keys.len(),
            "invalidating cached reads"
        );
        self.enqueue(&mut worker, CacheCommand::Remove { keys });
    }

    /// Wait for every background write and invalidation queued so far.
    pub async fn settle(&self) {
        let (done, finished) = oneshot::channel();
        {
            let mut worker = self.lock_worker();
            if worker.is_none() {
                return;
            }
            self.enqueue(&mut worker, CacheCommand::Flush { done });
        }
        let _ = finished.await;
    }

    /// Queue a command, starting the worker on first use or after the
    /// runtime that ran the previous one went away.
    fn enqueue(
        &self,
        worker: &mut Option<mpsc::UnboundedSender<CacheCommand>>,
        command: CacheCommand,
    ) {
        let command = match worker.as_ref() {
            Some(sender) => match sender.send(command) {
                Ok(()) => return,
                Err(mpsc::error::SendError(command)) => command,
            },
            None => command,
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(target: "fieldplan.cache", "no tokio runtime; cache command dropped");
            *worker = None;
            return;
        };
        let (sender, receiver) = mpsc::unbounded_channel();
        runtime.spawn(run_cache_worker(Arc::clone(&self.backend), receiver));
        if sender.send(command).is_err() {
            tracing::warn!(target: "fieldplan.cache", "cache worker exited; command dropped");
        }
        *worker = Some(sender);
    }

    fn lock_worker(&self) -> std::sync::MutexGuard<'_, Option<mpsc::UnboundedSender<CacheCommand>>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

async fn run_cache_worker(
    backend: Arc<dyn CacheBackend>,
    mut commands: mpsc::UnboundedReceiver<CacheCommand>,
) {
    while let Some(command) = commands.recv().await {
        match command {
            CacheCommand::Store { key, payload } => {
                if let Err(err) = backend.set(&key, payload).await {
                    tracing::warn!(target: "fieldplan.cache", key = %key, error = %err, "cache write failed");
                }
            }
            CacheCommand::Remove { keys } => {
                if let Err(err) = backend.delete(&keys).await {
                    tracing::warn!(target: "fieldplan.cache", error = %err, "cache invalidation failed");
                }
            }
            CacheCommand::Flush { done } => {
                let _ = done.send(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrmError;

    #[derive(Debug)]
    struct Broken;

    #[async_trait]
    impl CacheBackend for Broken {
        async fn get(&self, _key: &str) -> OrmResult<Option<String>> {
            Err(OrmError::Other("backend down".into()))
        }

        async fn set(&self, _key: &str, _value: String) -> OrmResult<()> {
            Err(OrmError::Other("backend down".into()))
        }

        async fn delete(&self, _keys: &[String]) -> OrmResult<()> {
            Err(OrmError::Other("backend down".into()))
        }
    }

    /// A memory cache whose writes take a while to land.
    #[derive(Debug, Default)]
    struct SlowWrites {
        inner: MemoryCache,
    }

    #[async_trait]
    impl CacheBackend for SlowWrites {
        async fn get(&self, key: &str) -> OrmResult<Option<String>> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: String) -> OrmResult<()> {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            self.inner.set(key, value).await
        }

        async fn delete(&self, keys: &[String]) -> OrmResult<()> {
            self.inner.delete(keys).await
        }
    }

    fn tables(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn keys_depend_on_sql_and_values() {
        let sql = "SELECT 1 WHERE x = $1";
        let one = QueryCache::key(sql, &[Param::new(1_i64)]);
        assert_eq!(one, QueryCache::key(sql, &[Param::new(1_i64)]));
        assert_ne!(one, QueryCache::key(sql, &[Param::new(2_i64)]));
        assert_ne!(one, QueryCache::key("SELECT 2 WHERE x = $1", &[Param::new(1_i64)]));
        assert_eq!(one.len(), 64);
    }

    #[tokio::test]
    async fn stored_rows_come_back_until_invalidated() {
        let backend = Arc::new(MemoryCache::new());
        let cache = QueryCache::new(backend.clone());
        let rows = vec![Record::new().with("id", 1)];

        cache.set(&tables(&["\"players\"", "\"teams\""]), "k".to_string(), &rows);
        cache.settle().await;
        assert_eq!(cache.get("k").await, Some(rows));

        cache.drop_entries(&tables(&["\"teams\""]));
        cache.settle().await;
        assert_eq!(cache.get("k").await, None);
        assert!(backend.is_empty());
        assert!(cache.registry().is_empty());
    }

    #[tokio::test]
    async fn invalidation_waits_for_the_write_it_drops() {
        let backend = Arc::new(SlowWrites::default());
        let cache = QueryCache::new(backend.clone());

        cache.set(&tables(&["\"players\""]), "k".to_string(), &[Record::new().with("id", 1)]);
        cache.drop_entries(&tables(&["\"players\""]));
        cache.settle().await;

        assert!(backend.inner.is_empty());
        assert!(cache.registry().is_empty());
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn settle_without_work_returns() {
        let cache = QueryCache::new(Arc::new(MemoryCache::new()));
        cache.settle().await;
        assert!(cache.registry().is_empty());
    }

    #[tokio::test]
    async fn backend_failures_are_swallowed() {
        let cache = QueryCache::new(Arc::new(Broken));
        cache.set(&tables(&["\"players\""]), "k".to_string(), &[]);
        cache.drop_entries(&tables(&["\"players\""]));
        cache.settle().await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn unreadable_payload_is_a_miss() {
        let backend = Arc::new(MemoryCache::new());
        backend.set("k", "not json".to_string()).await.unwrap();
        let cache = QueryCache::new(backend);
        assert_eq!(cache.get("k").await, None);
    }
}
