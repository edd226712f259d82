//! Credential manager: cached, coalesced, lease-refreshed signed URLs.

use super::coalesce::{LookupCoalescer, LookupOutcome, Registration};
use super::refresh::RefreshScheduler;
use super::store::{KeyedStore, SignedUrl};
use crate::cache::{CacheEntry, CacheKey, CacheLayer};
use crate::config::DeliveryConfig;
use crate::error::{ErrorKind, StoreError};
use crate::source::{ResolvedUrl, SizeTier};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Suffix convention for mobile variant keys. A missing `foo-mobile` asset
/// falls back to `foo` before the lookup is reported failed.
const MOBILE_KEY_SUFFIX: &str = "-mobile";

/// Obtains and refreshes time-limited signed URLs from the keyed store.
///
/// Signed entries are served from the cache layer within the freshness
/// window; misses coalesce concurrent callers onto one store lookup.
/// Failures are never cached, so the next request retries immediately
/// rather than waiting out the freshness window.
pub struct CredentialManager<S: KeyedStore> {
    store: Arc<S>,
    cache: Arc<CacheLayer>,
    coalescer: LookupCoalescer,
    scheduler: RefreshScheduler,
    config: DeliveryConfig,
}

impl<S: KeyedStore> CredentialManager<S> {
    /// Creates a manager over the given store and cache.
    pub fn new(store: Arc<S>, cache: Arc<CacheLayer>, config: DeliveryConfig) -> Self {
        Self {
            store,
            cache,
            coalescer: LookupCoalescer::new(),
            scheduler: RefreshScheduler::new(),
            config,
        }
    }

    /// Resolves a signed URL for `(key, tier)`.
    ///
    /// Returns the resolved URL and whether it was served from cache.
    /// Concurrent calls for the same key coalesce onto a single store
    /// lookup; stale cache entries are treated as misses, never served.
    pub async fn resolve(
        &self,
        key: &str,
        tier: SizeTier,
    ) -> Result<(ResolvedUrl, bool), ErrorKind> {
        let cache_key = CacheKey::new(key, tier);

        loop {
            if let Some(entry) = self.cache.get(&cache_key) {
                if entry.cached_at.elapsed() < self.config.freshness_window {
                    debug!(key = %cache_key, "signed URL served from cache");
                    return Ok((entry.resolved, true));
                }
                debug!(key = %cache_key, "cache entry stale, refetching");
            }

            match self.coalescer.register(&cache_key) {
                Registration::Leader(guard) => {
                    // If this future is dropped mid-lookup the guard clears
                    // the in-flight entry, releasing any followers.
                    let outcome = self.lookup_and_cache(&cache_key).await;
                    guard.complete(outcome.clone());
                    return outcome.map(|resolved| (resolved, false));
                }
                Registration::Follower(mut rx) => match rx.recv().await {
                    Ok(outcome) => return outcome.map(|resolved| (resolved, false)),
                    // Leader went away without completing; take another pass.
                    Err(_) => continue,
                },
            }
        }
    }

    /// Batch resolution for the responsive-triple pre-fetch path.
    ///
    /// Fresh cache entries are served without a store call; the remaining
    /// keys go through one batch lookup. Only successful resolutions appear
    /// in the returned map; failures are logged and skipped.
    pub async fn resolve_many(
        &self,
        keys: &[String],
        tier: SizeTier,
    ) -> HashMap<String, ResolvedUrl> {
        let mut resolved = HashMap::with_capacity(keys.len());
        let mut missing = Vec::new();

        for key in keys {
            let cache_key = CacheKey::new(key.clone(), tier);
            match self.cache.get(&cache_key) {
                Some(entry) if entry.cached_at.elapsed() < self.config.freshness_window => {
                    resolved.insert(key.clone(), entry.resolved);
                }
                _ => missing.push(key.clone()),
            }
        }

        if missing.is_empty() {
            return resolved;
        }

        let results = self.store.lookup_many(&missing, tier).await;
        for (key, result) in results {
            match result {
                Ok(signed) => {
                    let entry = self.build_resolved(signed);
                    self.cache
                        .put(CacheKey::new(key.clone(), tier), CacheEntry::now(entry.clone()));
                    resolved.insert(key, entry);
                }
                Err(err) => {
                    warn!(key = %key, error = %err, "batch lookup failed for key");
                }
            }
        }

        resolved
    }

    /// Acquires a refresh lease on `(key, tier)`.
    ///
    /// The first lease starts a background task that refreshes the cache
    /// entry on the configured interval for as long as the key stays in
    /// active use. Paired with [`release`](CredentialManager::release).
    pub fn acquire(self: &Arc<Self>, key: &str, tier: SizeTier) {
        let cache_key = CacheKey::new(key, tier);
        if let Some(token) = self.scheduler.acquire(&cache_key) {
            let manager = Arc::clone(self);
            let interval = self.config.refresh_interval;

            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(interval) => {
                            match manager.lookup_and_cache(&cache_key).await {
                                Ok(_) => {
                                    info!(key = %cache_key, "refreshed signed URL");
                                }
                                Err(err) => {
                                    // Keep the lease; the next tick retries.
                                    warn!(key = %cache_key, error = %err, "signed URL refresh failed");
                                }
                            }
                        }
                    }
                }
            });
        }
    }

    /// Releases a refresh lease; the last release stops the refresh task.
    pub fn release(&self, key: &str, tier: SizeTier) {
        self.scheduler.release(&CacheKey::new(key, tier));
    }

    /// Returns true if `(key, tier)` currently holds at least one lease.
    pub fn is_leased(&self, key: &str, tier: SizeTier) -> bool {
        self.scheduler.is_leased(&CacheKey::new(key, tier))
    }

    /// Performs the store lookup and caches a successful result.
    async fn lookup_and_cache(&self, cache_key: &CacheKey) -> LookupOutcome {
        match self.lookup_with_fallback(&cache_key.key, cache_key.tier).await {
            Ok(signed) => {
                let resolved = self.build_resolved(signed);
                self.cache
                    .put(cache_key.clone(), CacheEntry::now(resolved.clone()));
                Ok(resolved)
            }
            // No negative caching: the cache is left untouched on failure.
            Err(err) => Err(err.into_error_kind(&cache_key.key)),
        }
    }

    /// Looks up a key, retrying `-mobile` variants against the desktop key.
    async fn lookup_with_fallback(
        &self,
        key: &str,
        tier: SizeTier,
    ) -> Result<SignedUrl, StoreError> {
        match self.store.lookup_signed_url(key, tier).await {
            Err(StoreError::NotFound(_)) if key.ends_with(MOBILE_KEY_SUFFIX) => {
                let desktop_key = key.trim_end_matches(MOBILE_KEY_SUFFIX);
                info!(key, desktop_key, "mobile variant missing, trying desktop key");
                self.store.lookup_signed_url(desktop_key, tier).await
            }
            result => result,
        }
    }

    /// Builds a [`ResolvedUrl`] from a store response, stamping the expiry
    /// and appending the content-hash version parameter for cache busting.
    fn build_resolved(&self, signed: SignedUrl) -> ResolvedUrl {
        let url = match &signed.content_hash {
            Some(hash) => with_version_param(&signed.url, hash),
            None => signed.url.clone(),
        };
        let expires_at = signed.expires_in.map(|ttl| Instant::now() + ttl);
        ResolvedUrl::signed(url, expires_at, signed.content_hash)
    }
}

/// Appends a `v=` version parameter to a URL.
fn with_version_param(url: &str, hash: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}v={hash}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::store::tests::MockStore;
    use std::time::Duration;

    fn manager_with(store: MockStore) -> Arc<CredentialManager<MockStore>> {
        let config = DeliveryConfig::default();
        let cache = Arc::new(CacheLayer::new(config.cache_capacity));
        Arc::new(CredentialManager::new(Arc::new(store), cache, config))
    }

    #[tokio::test]
    async fn test_resolve_success_and_cache_hit() {
        let manager = manager_with(MockStore::new().with_url("hero-1", "https://signed/hero-1"));

        let (first, hit) = manager.resolve("hero-1", SizeTier::Medium).await.unwrap();
        assert_eq!(first.url, "https://signed/hero-1");
        assert!(first.is_signed);
        assert!(!hit);

        let (second, hit) = manager.resolve("hero-1", SizeTier::Medium).await.unwrap();
        assert_eq!(second.url, first.url);
        assert!(hit);
        assert_eq!(manager.store.lookup_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_resolves_coalesce_to_one_lookup() {
        let manager = manager_with(MockStore::new().with_url("k", "https://signed/k"));

        let mut handles = vec![];
        for _ in 0..8 {
            let m = Arc::clone(&manager);
            handles.push(tokio::spawn(async move {
                m.resolve("k", SizeTier::Medium).await
            }));
        }

        for handle in handles {
            let (resolved, _) = handle.await.unwrap().unwrap();
            assert_eq!(resolved.url, "https://signed/k");
        }
        assert_eq!(manager.store.lookup_count(), 1);
    }

    #[tokio::test]
    async fn test_aborted_leader_does_not_stall_later_resolves() {
        /// First lookup hangs until aborted; later lookups succeed.
        struct SlowThenOkStore {
            calls: std::sync::atomic::AtomicUsize,
        }

        impl KeyedStore for SlowThenOkStore {
            async fn lookup_signed_url(
                &self,
                key: &str,
                _tier: SizeTier,
            ) -> Result<SignedUrl, StoreError> {
                use std::sync::atomic::Ordering;
                if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    std::future::pending::<()>().await;
                }
                Ok(SignedUrl {
                    url: format!("https://signed/{key}"),
                    expires_in: None,
                    content_hash: None,
                })
            }
        }

        let config = DeliveryConfig::default();
        let cache = Arc::new(CacheLayer::new(config.cache_capacity));
        let manager = Arc::new(CredentialManager::new(
            Arc::new(SlowThenOkStore {
                calls: std::sync::atomic::AtomicUsize::new(0),
            }),
            cache,
            config,
        ));

        // The leader stalls in the store; abort it mid-lookup.
        let leader = {
            let m = Arc::clone(&manager);
            tokio::spawn(async move { m.resolve("k", SizeTier::Medium).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        leader.abort();
        let _ = leader.await;

        // The key is not wedged: a fresh resolve takes over and completes.
        let resolved = tokio::time::timeout(
            Duration::from_secs(1),
            manager.resolve("k", SizeTier::Medium),
        )
        .await
        .expect("resolve must not hang after the leader is aborted")
        .unwrap();
        assert_eq!(resolved.0.url, "https://signed/k");
    }

    #[tokio::test]
    async fn test_lookup_failure_not_cached() {
        let manager =
            manager_with(MockStore::new().with_error("bad", StoreError::Transient("down".into())));

        let err = manager.resolve("bad", SizeTier::Medium).await.unwrap_err();
        assert!(matches!(err, ErrorKind::CredentialLookupFailed { .. }));

        // The next call retries immediately instead of waiting out the
        // freshness window.
        let _ = manager.resolve("bad", SizeTier::Medium).await;
        assert_eq!(manager.store.lookup_count(), 2);
    }

    #[tokio::test]
    async fn test_not_found_maps_to_credential_lookup_failed() {
        let manager = manager_with(MockStore::new());

        let err = manager.resolve("missing", SizeTier::Medium).await.unwrap_err();
        match err {
            ErrorKind::CredentialLookupFailed { key, .. } => assert_eq!(key, "missing"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mobile_key_falls_back_to_desktop() {
        let manager = manager_with(MockStore::new().with_url("banner", "https://signed/banner"));

        let (resolved, _) = manager
            .resolve("banner-mobile", SizeTier::Medium)
            .await
            .unwrap();
        assert_eq!(resolved.url, "https://signed/banner");
        // One miss on the mobile key plus the desktop retry.
        assert_eq!(manager.store.lookup_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_freshness_window_boundary() {
        let manager = manager_with(MockStore::new().with_url("k", "https://signed/k"));

        manager.resolve("k", SizeTier::Medium).await.unwrap();
        assert_eq!(manager.store.lookup_count(), 1);

        // Still fresh at 44 minutes.
        tokio::time::advance(Duration::from_secs(44 * 60)).await;
        let (_, hit) = manager.resolve("k", SizeTier::Medium).await.unwrap();
        assert!(hit);
        assert_eq!(manager.store.lookup_count(), 1);

        // Stale at 46 minutes: treated as a miss and refetched.
        tokio::time::advance(Duration::from_secs(2 * 60)).await;
        let (_, hit) = manager.resolve("k", SizeTier::Medium).await.unwrap();
        assert!(!hit);
        assert_eq!(manager.store.lookup_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lease_refresh_replaces_cache_entry() {
        let manager = manager_with(MockStore::new().with_url("k", "https://signed/k"));

        manager.resolve("k", SizeTier::Medium).await.unwrap();
        manager.acquire("k", SizeTier::Medium);

        // Let the spawned refresh task register its timer under the paused
        // clock before advancing past it.
        tokio::task::yield_now().await;

        // Cross one refresh interval; the background task refetches.
        tokio::time::advance(Duration::from_secs(45 * 60 + 5)).await;
        tokio::task::yield_now().await;

        assert!(manager.store.lookup_count() >= 2);
        let (_, hit) = manager.resolve("k", SizeTier::Medium).await.unwrap();
        assert!(hit, "refreshed entry is fresh again");

        manager.release("k", SizeTier::Medium);
        assert!(!manager.is_leased("k", SizeTier::Medium));
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_stops_refresh() {
        let manager = manager_with(MockStore::new().with_url("k", "https://signed/k"));

        manager.resolve("k", SizeTier::Medium).await.unwrap();
        manager.acquire("k", SizeTier::Medium);
        manager.release("k", SizeTier::Medium);

        let before = manager.store.lookup_count();
        tokio::time::advance(Duration::from_secs(3 * 45 * 60)).await;
        tokio::task::yield_now().await;

        assert_eq!(manager.store.lookup_count(), before);
    }

    #[tokio::test]
    async fn test_resolve_many_mixes_cache_and_batch() {
        let manager = manager_with(
            MockStore::new()
                .with_url("a", "https://signed/a")
                .with_url("b", "https://signed/b"),
        );

        // Warm "a" so the batch only needs "b"; "missing" is skipped.
        manager.resolve("a", SizeTier::Small).await.unwrap();
        let before = manager.store.lookup_count();

        let keys = vec!["a".to_string(), "b".to_string(), "missing".to_string()];
        let resolved = manager.resolve_many(&keys, SizeTier::Small).await;

        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved["a"].url, "https://signed/a");
        assert_eq!(resolved["b"].url, "https://signed/b");
        // "b" and "missing" each cost one lookup; "a" came from cache.
        assert_eq!(manager.store.lookup_count(), before + 2);
    }

    #[test]
    fn test_version_param_appending() {
        assert_eq!(
            with_version_param("https://x/a.jpg", "abc123"),
            "https://x/a.jpg?v=abc123"
        );
        assert_eq!(
            with_version_param("https://x/a.jpg?token=t", "abc123"),
            "https://x/a.jpg?token=t&v=abc123"
        );
    }

    #[tokio::test]
    async fn test_content_hash_versioned_url() {
        struct HashStore;
        impl KeyedStore for HashStore {
            async fn lookup_signed_url(
                &self,
                _key: &str,
                _tier: SizeTier,
            ) -> Result<SignedUrl, StoreError> {
                Ok(SignedUrl {
                    url: "https://signed/img?token=t".to_string(),
                    expires_in: Some(Duration::from_secs(3600)),
                    content_hash: Some("deadbeef".to_string()),
                })
            }
        }

        let config = DeliveryConfig::default();
        let cache = Arc::new(CacheLayer::new(config.cache_capacity));
        let manager = CredentialManager::new(Arc::new(HashStore), cache, config);

        let (resolved, _) = manager.resolve("img", SizeTier::Medium).await.unwrap();
        assert_eq!(resolved.url, "https://signed/img?token=t&v=deadbeef");
        assert_eq!(resolved.content_hash.as_deref(), Some("deadbeef"));
        assert!(resolved.expires_at.is_some());
    }
}
