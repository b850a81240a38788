//! Bounded in-memory cache of completed searches.
//!
//! Entries are keyed by `normalize(query) + ":" + page`, evicted least
//! recently used first once the cache is full, and expire lazily: an entry
//! older than the TTL is dropped by the lookup that finds it. There is no
//! background sweep.
//!
//! Recency is tracked in a queue scanned on every hit, so operations are
//! linear in the entry count. `SearchConfig` caps the size at
//! [`MAX_CACHE_SIZE_LIMIT`](crate::config::MAX_CACHE_SIZE_LIMIT).
//!
//! The lock is only ever held for the duration of a single operation and
//! never across an await point.

use crate::config::SearchConfig;
use crate::types::SearchSnapshot;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Lowercased, trimmed form of a query used for cache keys.
pub fn normalize(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Cache key for a (query, page) pair. Pages are not validated.
pub fn cache_key(query: &str, page: i64) -> String {
    format!("{}:{}", normalize(query), page)
}

struct CacheEntry {
    value: Arc<SearchSnapshot>,
    inserted_at: Instant,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    // Oldest first. Always holds exactly the keys of `entries`.
    access_order: VecDeque<String>,
}

impl CacheState {
    fn touch(&mut self, key: &str) {
        self.forget(key);
        self.access_order.push_back(key.to_string());
    }

    fn forget(&mut self, key: &str) {
        if let Some(index) = self.access_order.iter().position(|k| k == key) {
            self.access_order.remove(index);
        }
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
        self.forget(key);
    }
}

/// LRU cache with a fixed per-process TTL.
///
/// Built once by the composition root and shared between sessions through
/// an `Arc`.
pub struct SearchCache {
    state: Mutex<CacheState>,
    ttl: Duration,
    max_size: usize,
}

impl SearchCache {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            ttl,
            max_size,
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(config.max_cache_size, config.cache_ttl)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a snapshot. Missing and expired entries both return `None`;
    /// a hit becomes the most recently used entry.
    pub fn get(&self, query: &str, page: i64) -> Option<Arc<SearchSnapshot>> {
        let key = cache_key(query, page);
        let mut state = self.lock();

        let (value, inserted_at) = match state.entries.get(&key) {
            Some(entry) => (entry.value.clone(), entry.inserted_at),
            None => {
                debug!("search cache miss for {}", key);
                return None;
            }
        };

        if inserted_at.elapsed() > self.ttl {
            debug!("search cache entry {} expired", key);
            state.remove(&key);
            return None;
        }

        state.touch(&key);
        debug!("search cache hit for {}", key);
        Some(value)
    }

    /// Store a snapshot, evicting the least recently used entry first when
    /// the cache is full.
    pub fn set(&self, query: &str, page: i64, snapshot: SearchSnapshot) {
        let key = cache_key(query, page);
        let mut state = self.lock();

        // Runs even when `key` is already present, so a full cache may drop
        // some other entry to make room for an overwrite.
        if state.access_order.len() >= self.max_size {
            if let Some(oldest) = state.access_order.pop_front() {
                state.entries.remove(&oldest);
                debug!("search cache evicted {}", oldest);
            }
        }

        state.entries.insert(
            key.clone(),
            CacheEntry {
                value: Arc::new(snapshot),
                inserted_at: Instant::now(),
            },
        );
        state.touch(&key);
    }

    /// Drop every entry whose key starts with the normalized prefix.
    ///
    /// Matching is on the raw `"<query>:<page>"` key, so `"laptop"` also
    /// removes entries for `"laptops"` or `"laptop2"`.
    pub fn invalidate(&self, query_prefix: &str) {
        let prefix = normalize(query_prefix);
        let mut state = self.lock();

        let doomed: Vec<String> = state
            .entries
            .keys()
            .filter(|key| key.starts_with(&prefix))
            .cloned()
            .collect();
        for key in &doomed {
            state.remove(key);
        }
        info!("search cache invalidated {} entries for prefix {:?}", doomed.len(), prefix);
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.access_order.clear();
        info!("search cache cleared");
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SearchCache {
    fn default() -> Self {
        Self::from_config(&SearchConfig::default())
    }
}
