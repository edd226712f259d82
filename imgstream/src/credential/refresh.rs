//! Lease accounting for signed-URL refresh timers.
//!
//! Refresh lifetimes follow explicit lease semantics rather than implicit
//! UI lifecycle coupling: consumers `acquire` a key while they display it
//! and `release` it on teardown. The first acquire starts the refresh
//! task; the last release cancels it.

use crate::cache::CacheKey;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;

struct Lease {
    count: usize,
    token: CancellationToken,
}

/// Reference-counted leases, one per `(key, tier)`.
pub struct RefreshScheduler {
    leases: DashMap<CacheKey, Lease>,
}

impl RefreshScheduler {
    /// Creates an empty scheduler.
    pub fn new() -> Self {
        Self {
            leases: DashMap::new(),
        }
    }

    /// Acquires a lease on the key.
    ///
    /// Returns `Some(token)` when this is the first lease, in which case
    /// the caller must start the refresh task bound to that token.
    /// Returns `None` when the key was already leased.
    pub fn acquire(&self, key: &CacheKey) -> Option<CancellationToken> {
        let mut entry = self.leases.entry(key.clone()).or_insert_with(|| Lease {
            count: 0,
            token: CancellationToken::new(),
        });
        entry.count += 1;

        if entry.count == 1 {
            debug!(key = %key, "first lease, refresh timer starts");
            Some(entry.token.clone())
        } else {
            None
        }
    }

    /// Releases a lease on the key.
    ///
    /// When the last lease is released the refresh token is cancelled and
    /// the lease entry removed. Releasing an unleased key is a no-op.
    pub fn release(&self, key: &CacheKey) {
        let remove = match self.leases.get_mut(key) {
            Some(mut lease) => {
                lease.count = lease.count.saturating_sub(1);
                lease.count == 0
            }
            None => false,
        };

        if remove {
            if let Some((_, lease)) = self.leases.remove(key) {
                lease.token.cancel();
                debug!(key = %key, "last lease released, refresh timer cancelled");
            }
        }
    }

    /// Returns the number of distinct leased keys.
    pub fn leased_count(&self) -> usize {
        self.leases.len()
    }

    /// Returns true if the key currently holds at least one lease.
    pub fn is_leased(&self, key: &CacheKey) -> bool {
        self.leases.contains_key(key)
    }
}

impl Default for RefreshScheduler {
    fn default() -> Self {
        Self::new()
    }
}
