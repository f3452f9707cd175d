//! Bounded LRU cache for per-path schema fragments.
//!
//! Keys are `(path, sorted methods)`; `None` stands for "every method on the
//! path". Values are derived from the immutable OpenAPI document, so entries
//! never need invalidation and two racing misses compute the same value.

use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;

use super::HttpMethod;

pub const DEFAULT_SCHEMA_CACHE_CAPACITY: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaCacheKey {
    path: String,
    methods: Option<Vec<HttpMethod>>,
}

impl SchemaCacheKey {
    /// Normalizes the method selection: sorted, deduplicated, and an empty
    /// selection means the whole path.
    pub fn new(path: &str, methods: Option<&[HttpMethod]>) -> Self {
        let methods = methods.filter(|m| !m.is_empty()).map(|m| {
            let mut sorted = m.to_vec();
            sorted.sort();
            sorted.dedup();
            sorted
        });
        Self {
            path: path.to_string(),
            methods,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn methods(&self) -> Option<&[HttpMethod]> {
        self.methods.as_deref()
    }
}

#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

pub struct SchemaCache {
    entries: Mutex<IndexMap<SchemaCacheKey, Value>>,
    capacity: usize,
    stats: CacheStats,
}

impl SchemaCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(IndexMap::new()),
            capacity: capacity.max(1),
            stats: CacheStats::default(),
        }
    }

    /// Returns the cached value for `key`, computing and storing it on a miss.
    /// Errors from `compute` are not cached.
    pub fn get_or_try_insert<E>(
        &self,
        key: SchemaCacheKey,
        compute: impl FnOnce(&SchemaCacheKey) -> Result<Value, E>,
    ) -> Result<Value, E> {
        if let Some(value) = self.get(&key) {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value);
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);

        // The lock is not held while computing.
        let value = compute(&key)?;
        self.insert(key, value.clone());
        Ok(value)
    }

    fn get(&self, key: &SchemaCacheKey) -> Option<Value> {
        let mut entries = self.entries.lock();
        let index = entries.get_index_of(key)?;
        let last = entries.len() - 1;
        entries.move_index(index, last);
        entries.get_index(last).map(|(_, value)| value.clone())
    }

    fn insert(&self, key: SchemaCacheKey, value: Value) {
        let mut entries = self.entries.lock();
        entries.shift_remove(&key);
        entries.insert(key, value);
        while entries.len() > self.capacity {
            entries.shift_remove_index(0);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new(DEFAULT_SCHEMA_CACHE_CAPACITY)
    }
}
