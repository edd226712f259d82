//! Signed-URL credential management.
//!
//! For logical-key sources, this module obtains time-limited signed URLs
//! from the keyed store, memoizes them in the cache layer within a
//! freshness window, coalesces concurrent lookups for the same key onto a
//! single store call, and keeps leased entries fresh with a background
//! refresh task.
//!
//! # Architecture
//!
//! ```text
//! resolve(k) A ─┐
//!               │                                ┌──────────────┐
//! resolve(k) B ─┼──► LookupCoalescer ──(one)───► │ KeyedStore   │
//!               │         │                      └──────┬───────┘
//! resolve(k) C ─┘         │                             │
//!                         ▼                             ▼
//!                   [A, B, C all                  CacheLayer.put
//!                    receive same                 + lease refresh
//!                    ResolvedUrl]                   timer
//! ```

mod coalesce;
mod manager;
mod refresh;
pub(crate) mod store;

pub use coalesce::{CoalescerStats, LookupCoalescer, LookupOutcome};
pub use manager::CredentialManager;
pub use refresh::RefreshScheduler;
pub use store::{KeyedStore, SignedUrl};
