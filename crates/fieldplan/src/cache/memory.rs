//! In-process cache backend.

use super::CacheBackend;
use crate::error::OrmResult;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Entries kept by [`MemoryCache::new`].
pub const DEFAULT_CAPACITY: usize = 1024;

/// A capacity-bounded map behind a mutex. The least recently used entry is
/// evicted once the capacity is reached; a capacity of 0 stores nothing.
#[derive(Debug)]
pub struct MemoryCache {
    inner: Mutex<MemoryCacheInner>,
}

#[derive(Debug)]
struct MemoryCacheInner {
    capacity: usize,
    entries: HashMap<String, String>,
    order: VecDeque<String>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(MemoryCacheInner {
                capacity,
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().entries.contains_key(key)
    }

    fn lock(&self) -> MutexGuard<'_, MemoryCacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MemoryCacheInner {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }

    fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            if let Some(pos) = self.order.iter().position(|k| k == key) {
                self.order.remove(pos);
            }
        }
    }

    fn insert(&mut self, key: String, value: String) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.insert(key.clone(), value).is_some() {
            self.touch(&key);
        } else {
            self.order.push_back(key);
        }
        while self.entries.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
            tracing::trace!(target: "fieldplan.cache", key = %oldest, "evicted");
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> OrmResult<Option<String>> {
        let mut inner = self.lock();
        let value = inner.entries.get(key).cloned();
        if value.is_some() {
            inner.touch(key);
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: String) -> OrmResult<()> {
        self.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> OrmResult<()> {
        let mut inner = self.lock();
        for key in keys {
            inner.remove(key);
        }
        Ok(())
    }
}
