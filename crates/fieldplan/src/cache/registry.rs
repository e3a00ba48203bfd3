//! Table-to-key index used for invalidation.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

/// Which cache keys were produced by reads of which table.
///
/// Registration and removal take the write lock; lookups share the read lock.
#[derive(Debug, Default)]
pub struct CacheRegistry {
    tables: RwLock<HashMap<String, HashSet<String>>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `key` against every table in `tables`.
    pub fn register(&self, tables: &[String], key: &str) {
        let mut map = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        for table in tables {
            map.entry(table.clone()).or_default().insert(key.to_string());
        }
    }

    /// Keys registered against any of `tables`, deduplicated.
    pub fn keys_for(&self, tables: &[String]) -> Vec<String> {
        let map = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<String> = tables
            .iter()
            .filter_map(|table| map.get(table))
            .flatten()
            .cloned()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        keys.sort();
        keys
    }

    /// Remove `keys` from every table they were registered against.
    pub fn forget(&self, keys: &[String]) {
        let mut map = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        for set in map.values_mut() {
            for key in keys {
                set.remove(key);
            }
        }
        map.retain(|_, set| !set.is_empty());
    }

    pub fn is_empty(&self) -> bool {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}
