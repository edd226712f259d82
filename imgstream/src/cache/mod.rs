//! In-memory URL cache with LRU eviction.
//!
//! Content-addressed memoization of resolved URLs keyed by
//! `(logical key, size tier)`. The layer itself performs no TTL eviction;
//! freshness is the caller's check (the credential manager compares
//! `cached_at` against its freshness window). Eviction is purely
//! size-bounded: least-recently-used entries are dropped when the entry
//! count exceeds the configured capacity. Nothing persists across process
//! restarts.

mod stats;

pub use stats::CacheStats;

use crate::source::{ResolvedUrl, SizeTier};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Cache key: logical key plus size tier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub key: String,
    pub tier: SizeTier,
}

impl CacheKey {
    /// Creates a cache key.
    pub fn new(key: impl Into<String>, tier: SizeTier) -> Self {
        Self {
            key: key.into(),
            tier,
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.key, self.tier)
    }
}

/// A cached resolved URL with its resolution time.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// The resolved URL.
    pub resolved: ResolvedUrl,
    /// When the entry was stored. Monotonic; compared against the
    /// freshness window by the credential manager.
    pub cached_at: Instant,
}

impl CacheEntry {
    /// Creates an entry stamped with the current time.
    pub fn now(resolved: ResolvedUrl) -> Self {
        Self {
            resolved,
            cached_at: Instant::now(),
        }
    }
}

/// Entry plus LRU bookkeeping.
#[derive(Debug, Clone)]
struct Slot {
    entry: CacheEntry,
    /// Logical access time; higher is more recent.
    last_used: u64,
}

struct Inner {
    slots: HashMap<CacheKey, Slot>,
    /// Monotone counter driving LRU ordering.
    tick: u64,
    stats: CacheStats,
}

/// Bounded in-memory cache of resolved URLs.
///
/// Injected explicitly wherever it is needed; there is no global singleton.
pub struct CacheLayer {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl CacheLayer {
    /// Creates a cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                slots: HashMap::new(),
                tick: 0,
                stats: CacheStats::default(),
            }),
            capacity: capacity.max(1),
        }
    }

    /// Looks up an entry, updating LRU order and statistics.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let mut inner = self.inner.lock().unwrap();
        inner.tick += 1;
        let tick = inner.tick;

        if let Some(slot) = inner.slots.get_mut(key) {
            slot.last_used = tick;
            let entry = slot.entry.clone();
            inner.stats.hits += 1;
            Some(entry)
        } else {
            inner.stats.misses += 1;
            None
        }
    }

    /// Stores an entry, evicting least-recently-used entries if the cache
    /// is at capacity.
    pub fn put(&self, key: CacheKey, entry: CacheEntry) {
        let mut inner = self.inner.lock().unwrap();
        inner.tick += 1;
        let tick = inner.tick;

        // Replacing an existing key never needs eviction.
        if !inner.slots.contains_key(&key) && inner.slots.len() >= self.capacity {
            let excess = inner.slots.len() + 1 - self.capacity;
            evict_lru(&mut inner, excess);
        }

        inner.slots.insert(
            key,
            Slot {
                entry,
                last_used: tick,
            },
        );
        inner.stats.entry_count = inner.slots.len();
    }

    /// Removes a single entry.
    pub fn invalidate(&self, key: &CacheKey) {
        let mut inner = self.inner.lock().unwrap();
        inner.slots.remove(key);
        inner.stats.entry_count = inner.slots.len();
    }

    /// Removes all entries for a logical key across every size tier.
    pub fn invalidate_key(&self, logical_key: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.slots.retain(|k, _| k.key != logical_key);
        inner.stats.entry_count = inner.slots.len();
    }

    /// Removes everything.
    pub fn invalidate_all(&self) {
        let mut inner = self.inner.lock().unwrap();
        let dropped = inner.slots.len();
        inner.slots.clear();
        inner.stats.entry_count = 0;
        debug!(dropped, "cache cleared");
    }

    /// Current number of entries.
    pub fn entry_count(&self) -> usize {
        self.inner.lock().unwrap().slots.len()
    }

    /// Snapshot of cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().unwrap().stats.clone()
    }
}

/// Drops the `count` least-recently-used slots.
fn evict_lru(inner: &mut Inner, count: usize) {
    let mut order: Vec<(CacheKey, u64)> = inner
        .slots
        .iter()
        .map(|(k, slot)| (k.clone(), slot.last_used))
        .collect();
    order.sort_by_key(|(_, last_used)| *last_used);

    for (key, _) in order.into_iter().take(count) {
        inner.slots.remove(&key);
        inner.stats.evictions += 1;
        debug!(key = %key, "evicted LRU cache entry");
    }
    inner.stats.entry_count = inner.slots.len();
}
