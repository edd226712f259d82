//! Request coalescing for signed-URL lookups.
//!
//! When multiple render requests resolve the same `(key, tier)` at once,
//! only one store lookup runs; every other caller waits on the same
//! broadcast result. This is the one mandatory mutual-exclusion discipline
//! in the system: a logical per-key lock, not a global lock.

use crate::cache::CacheKey;
use crate::error::ErrorKind;
use crate::source::ResolvedUrl;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Result broadcast to coalesced waiters.
pub type LookupOutcome = Result<ResolvedUrl, ErrorKind>;

type InFlightMap = HashMap<CacheKey, broadcast::Sender<LookupOutcome>>;

/// Statistics for monitoring coalescing effectiveness.
#[derive(Debug, Default, Clone)]
pub struct CoalescerStats {
    /// Total lookups received.
    pub total_requests: u64,
    /// Lookups that waited on existing in-flight work.
    pub coalesced_requests: u64,
    /// Lookups that triggered a store call.
    pub new_requests: u64,
}

impl CoalescerStats {
    /// Returns the coalescing ratio (0.0 to 1.0).
    pub fn coalescing_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.coalesced_requests as f64 / self.total_requests as f64
        }
    }
}

/// Completion obligation held by the leader of an in-flight lookup.
///
/// The leader must call [`complete`](CompletionGuard::complete) with the
/// lookup outcome. If the leader's future is dropped first (e.g. the
/// caller raced `resolve` against a timeout), the guard's `Drop` clears
/// the in-flight entry so followers see a closed channel and re-register
/// instead of waiting forever.
pub struct CompletionGuard {
    in_flight: Arc<Mutex<InFlightMap>>,
    key: CacheKey,
    completed: bool,
}

impl CompletionGuard {
    /// Broadcasts the outcome to all waiters and clears the entry.
    pub fn complete(mut self, outcome: LookupOutcome) {
        self.completed = true;
        if let Some(tx) = self.in_flight.lock().unwrap().remove(&self.key) {
            let waiters = tx.receiver_count();
            // Send errors just mean every waiter already went away.
            let _ = tx.send(outcome);
            if waiters > 0 {
                debug!(key = %self.key, waiters, "broadcast lookup outcome to waiters");
            }
        }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if !self.completed {
            warn!(key = %self.key, "lookup leader dropped without completing");
            self.in_flight.lock().unwrap().remove(&self.key);
        }
    }
}

/// Outcome of registering a lookup.
pub enum Registration {
    /// First caller for this key: perform the lookup and hand the result
    /// to the guard.
    Leader(CompletionGuard),
    /// Another lookup is in flight: wait on this receiver. A closed
    /// channel means the leader went away without completing.
    Follower(broadcast::Receiver<LookupOutcome>),
}

impl Registration {
    /// Returns true if this registration must perform the store lookup.
    pub fn is_leader(&self) -> bool {
        matches!(self, Registration::Leader(_))
    }
}

/// Tracks in-flight signed-URL lookups keyed by `(key, tier)`.
pub struct LookupCoalescer {
    in_flight: Arc<Mutex<InFlightMap>>,
    stats: Mutex<CoalescerStats>,
}

impl LookupCoalescer {
    /// Creates an empty coalescer.
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            stats: Mutex::new(CoalescerStats::default()),
        }
    }

    /// Registers a lookup for the given key.
    pub fn register(&self, key: &CacheKey) -> Registration {
        let mut in_flight = self.in_flight.lock().unwrap();
        let mut stats = self.stats.lock().unwrap();

        stats.total_requests += 1;

        if let Some(tx) = in_flight.get(key) {
            stats.coalesced_requests += 1;
            debug!(key = %key, "coalescing lookup onto in-flight request");
            Registration::Follower(tx.subscribe())
        } else {
            // Capacity 16 covers the typical burst of same-key mounts.
            let (tx, _rx) = broadcast::channel(16);
            in_flight.insert(key.clone(), tx);
            stats.new_requests += 1;
            Registration::Leader(CompletionGuard {
                in_flight: Arc::clone(&self.in_flight),
                key: key.clone(),
                completed: false,
            })
        }
    }

    /// Returns the number of currently in-flight lookups.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().unwrap().len()
    }

    /// Returns a snapshot of the current statistics.
    pub fn stats(&self) -> CoalescerStats {
        self.stats.lock().unwrap().clone()
    }
}

impl Default for LookupCoalescer {
    fn default() -> Self {
        Self::new()
    }
}
