//! Cache statistics for the debug/introspection boundary.

/// Counters describing cache effectiveness.
///
/// Exposed through diagnostic overlays only; never consulted by loading
/// decisions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found an entry.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Entries removed by LRU eviction.
    pub evictions: u64,
    /// Current number of entries.
    pub entry_count: usize,
}

impl CacheStats {
    /// Returns the hit ratio (0.0 to 1.0).
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
