//! High-level image delivery facade.
//!
//! Wires source resolution, the credential manager, the network monitor,
//! and the progressive pipeline into one entry point. A render surface
//! asks for a [`RenderHandle`] per image and watches its state; everything
//! else (signed-URL caching, coalescing, refresh leases, cancellation on
//! source change) happens behind the facade.
//!
//! # Architecture
//!
//! ```text
//! RenderSpec ──► render() ──► resolve source ──► Ready ─────────┐
//!                                  │                            ▼
//!                                  └─► Lookup ──► credential ──► pipeline run
//!                                        │         manager          │
//!                                        ▼                          ▼
//!                                  refresh lease            LoadState watch
//! ```

use crate::cache::{CacheKey, CacheLayer, CacheStats};
use crate::config::DeliveryConfig;
use crate::credential::{CredentialManager, KeyedStore};
use crate::network::NetworkMonitor;
use crate::pipeline::{self, PipelineParams, RenditionFetcher};
use crate::render::{self, DebugInfo, LoadState, RenderHandle};
use crate::source::{resolve, Candidate, DeviceClass, ImageSource, ResolvedUrl, SizeTier};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fallback asset used when a spec does not name one.
pub const DEFAULT_FALLBACK_URL: &str = "/placeholder.svg";

/// Parameters for one render request.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSpec {
    /// What to render.
    pub source: ImageSource,
    /// Device class of the consuming surface.
    pub device_class: DeviceClass,
    /// Asset painted while loading and after a failed run.
    pub fallback_url: String,
    /// Quality bound; the configured default when `None`.
    pub requested_quality: Option<u8>,
    /// Width bound in pixels; the configured default when `None`.
    pub requested_max_width: Option<u32>,
}

impl RenderSpec {
    /// Creates a spec with the default fallback and no explicit bounds.
    pub fn new(source: ImageSource, device_class: DeviceClass) -> Self {
        Self {
            source,
            device_class,
            fallback_url: DEFAULT_FALLBACK_URL.to_string(),
            requested_quality: None,
            requested_max_width: None,
        }
    }

    /// Sets the fallback URL.
    pub fn with_fallback_url(mut self, url: impl Into<String>) -> Self {
        self.fallback_url = url.into();
        self
    }

    /// Sets the quality bound.
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.requested_quality = Some(quality);
        self
    }

    /// Sets the width bound.
    pub fn with_max_width(mut self, max_width_px: u32) -> Self {
        self.requested_max_width = Some(max_width_px);
        self
    }
}

/// The delivery service.
///
/// Cheap to clone via [`Arc`]; one instance serves every render surface in
/// the process.
pub struct ImageDelivery<S: KeyedStore, F: RenditionFetcher> {
    credentials: Arc<CredentialManager<S>>,
    fetcher: Arc<F>,
    monitor: Arc<NetworkMonitor>,
    cache: Arc<CacheLayer>,
    config: DeliveryConfig,
}

impl<S: KeyedStore, F: RenditionFetcher> ImageDelivery<S, F> {
    /// Creates the service over a keyed store, a rendition fetcher, and a
    /// network monitor.
    pub fn new(
        store: Arc<S>,
        fetcher: Arc<F>,
        monitor: Arc<NetworkMonitor>,
        config: DeliveryConfig,
    ) -> Self {
        let cache = Arc::new(CacheLayer::new(config.cache_capacity));
        let credentials = Arc::new(CredentialManager::new(
            store,
            Arc::clone(&cache),
            config.clone(),
        ));
        Self {
            credentials,
            fetcher,
            monitor,
            cache,
            config,
        }
    }

    /// Starts rendering a source and returns its handle.
    ///
    /// The handle is `Idle` on return; the run proceeds in the background
    /// and transitions are observable through
    /// [`subscribe`](RenderHandle::subscribe).
    pub fn render(&self, spec: RenderSpec) -> RenderHandle {
        let handle = RenderHandle::new(
            spec.source,
            spec.device_class,
            spec.fallback_url,
            spec.requested_quality.unwrap_or(self.config.default_quality),
            spec.requested_max_width
                .unwrap_or(self.config.default_max_width),
        );
        self.start_run(&handle);
        handle
    }

    /// Points an existing handle at a different source.
    ///
    /// An identical source is a no-op: the current run continues
    /// undisturbed. A different source cancels the in-flight run
    /// mid-stage, resets the handle to `Idle`, and starts over.
    pub fn update_source(&self, handle: &RenderHandle, source: ImageSource) {
        if handle.source() == source {
            debug!("update_source with identical source ignored");
            return;
        }

        info!(source = ?source, "source changed, restarting run");
        handle.replace_source(source);
        handle.reset_state();
        self.start_run(handle);
    }

    /// Re-runs a handle's current source from the top of the ladder.
    ///
    /// The retry affordance for an `Errored` handle; valid from any state.
    pub fn retry(&self, handle: &RenderHandle) {
        handle.reset_state();
        self.start_run(handle);
    }

    /// Batch-resolves signed URLs for a set of logical keys.
    ///
    /// The pre-fetch path for gallery views: warm the cache before the
    /// individual render requests arrive. Failures are skipped.
    pub async fn resolve_urls(
        &self,
        keys: &[String],
        tier: SizeTier,
    ) -> HashMap<String, ResolvedUrl> {
        self.credentials.resolve_many(keys, tier).await
    }

    /// Current network profile snapshot.
    pub fn network_profile(&self) -> crate::network::NetworkProfile {
        self.monitor.sample()
    }

    /// URL cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drops the cached entry for `(key, tier)`, if present.
    pub fn invalidate(&self, key: &str, tier: SizeTier) {
        self.cache.invalidate(&CacheKey::new(key, tier));
    }

    /// Drops every cached entry for a key across all size tiers.
    pub fn invalidate_key(&self, key: &str) {
        self.cache.invalidate_key(key);
    }

    /// Drops every cached entry.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Kicks off one pipeline run for the handle's current source.
    fn start_run(&self, handle: &RenderHandle) {
        let token = handle.begin_run();
        let state_tx = handle.state_sender();
        let debug_slot = handle.debug_slot();
        let source = handle.source();
        let device_class = handle.device_class();
        let params = PipelineParams {
            requested_quality: handle.requested_quality(),
            requested_max_width: handle.requested_max_width(),
            stage_timeout: self.config.stage_timeout,
        };
        let profile = self.monitor.sample();
        let credentials = Arc::clone(&self.credentials);
        let fetcher = Arc::clone(&self.fetcher);
        let config = self.config.clone();

        tokio::spawn(async move {
            let candidate = match resolve(&source, device_class) {
                Ok(candidate) => candidate,
                Err(err) => {
                    // Caller contract violation: log and stay Idle rather
                    // than surfacing an error placeholder.
                    warn!(source = ?source, error = %err, "invalid image source");
                    return;
                }
            };

            let resolved = match candidate {
                Candidate::Ready(resolved) => {
                    record_resolution(&debug_slot, None, resolved.content_hash.clone());
                    resolved
                }
                Candidate::Lookup { key, tier } => {
                    match credentials.resolve(&key, tier).await {
                        Ok((resolved, cache_hit)) => {
                            // The lease starts only once the key is known to
                            // resolve; failed keys get no refresh task.
                            credentials.acquire(&key, tier);
                            spawn_lease_guard(
                                Arc::clone(&credentials),
                                key.clone(),
                                tier,
                                token.clone(),
                            );
                            record_resolution(
                                &debug_slot,
                                Some(cache_hit),
                                resolved.content_hash.clone(),
                            );
                            resolved
                        }
                        Err(err) => {
                            if token.is_cancelled() {
                                return;
                            }
                            if config.is_placeholder_key(&key) {
                                debug!(key, error = %err, "placeholder asset not yet populated");
                            } else {
                                warn!(key, error = %err, "credential resolution failed");
                            }
                            state_tx.send_replace(LoadState::Errored(err));
                            return;
                        }
                    }
                }
            };

            if token.is_cancelled() {
                return;
            }

            let transitions = pipeline::run(fetcher, resolved, params, profile, token.clone());
            render::drive(transitions, state_tx, token).await;
        });
    }
}

/// Records resolution diagnostics on the handle's debug slot.
fn record_resolution(
    slot: &Arc<std::sync::Mutex<DebugInfo>>,
    cache_hit: Option<bool>,
    content_hash: Option<String>,
) {
    let mut debug = slot.lock().unwrap();
    debug.cache_hit = cache_hit;
    debug.content_hash = content_hash;
    debug.last_updated = Some(Utc::now());
}

/// Holds a refresh lease for as long as the run token stays live.
fn spawn_lease_guard<S: KeyedStore>(
    credentials: Arc<CredentialManager<S>>,
    key: String,
    tier: SizeTier,
    token: tokio_util::sync::CancellationToken,
) {
    tokio::spawn(async move {
        token.cancelled().await;
        credentials.release(&key, tier);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::store::tests::MockStore;
    use crate::error::{ErrorKind, FetchError};
    use crate::network::{NetworkProfile, StaticTelemetry};
    use crate::pipeline::{Rendition, StageName};
    use std::time::Duration;

    struct OkFetcher;

    impl RenditionFetcher for OkFetcher {
        async fn fetch_rendition(
            &self,
            url: &str,
            max_width_px: u32,
            quality: u8,
        ) -> Result<Rendition, FetchError> {
            Ok(Rendition {
                url: format!("{url}?w={max_width_px}&q={quality}"),
                content_length: Some(1024),
            })
        }
    }

    fn delivery(store: MockStore) -> ImageDelivery<MockStore, OkFetcher> {
        let monitor = Arc::new(NetworkMonitor::new(Arc::new(StaticTelemetry::new(
            NetworkProfile::unknown(),
        ))));
        ImageDelivery::new(
            Arc::new(store),
            Arc::new(OkFetcher),
            monitor,
            DeliveryConfig::default(),
        )
    }

    async fn wait_for_full(handle: &RenderHandle) -> LoadState {
        let mut rx = handle.subscribe();
        loop {
            if rx.borrow_and_update().is_terminal() {
                return handle.state();
            }
            rx.changed().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_literal_source_runs_to_full() {
        let service = delivery(MockStore::new());
        let handle = service.render(RenderSpec::new(
            ImageSource::literal("https://cdn/x.jpg"),
            DeviceClass::Desktop,
        ));

        let state = wait_for_full(&handle).await;
        match state {
            LoadState::Loaded { stage, url } => {
                assert_eq!(stage.name, StageName::Full);
                assert!(url.starts_with("https://cdn/x.jpg?"));
            }
            other => panic!("unexpected terminal state: {other:?}"),
        }
        assert_eq!(handle.debug_info().cache_hit, None);
    }

    #[tokio::test]
    async fn test_logical_key_resolves_then_runs() {
        let service = delivery(MockStore::new().with_url("hero-1", "https://signed/hero-1"));
        let handle = service.render(RenderSpec::new(
            ImageSource::logical_key("hero-1"),
            DeviceClass::Desktop,
        ));

        let state = wait_for_full(&handle).await;
        assert!(state.url().is_some_and(|u| u.starts_with("https://signed/hero-1")));
        assert_eq!(handle.debug_info().cache_hit, Some(false));
        assert!(handle.debug_info().last_updated.is_some());
    }

    #[tokio::test]
    async fn test_missing_key_errors_and_falls_back() {
        let service = delivery(MockStore::new());
        let handle = service.render(
            RenderSpec::new(ImageSource::logical_key("absent"), DeviceClass::Desktop)
                .with_fallback_url("/fallback.svg"),
        );

        let state = wait_for_full(&handle).await;
        assert!(matches!(state, LoadState::Errored(ErrorKind::CredentialLookupFailed { .. })));
        assert_eq!(handle.display_url(), "/fallback.svg");
    }

    #[tokio::test]
    async fn test_invalid_source_stays_idle() {
        let service = delivery(MockStore::new());
        let handle = service.render(RenderSpec::new(
            ImageSource::Responsive {
                mobile: None,
                tablet: None,
                desktop: None,
            },
            DeviceClass::Mobile,
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.state(), LoadState::Idle);
        assert_eq!(handle.display_url(), DEFAULT_FALLBACK_URL);
    }

    #[tokio::test]
    async fn test_update_source_with_identical_source_is_noop() {
        let service = delivery(MockStore::new());
        let handle = service.render(RenderSpec::new(
            ImageSource::literal("https://cdn/a.jpg"),
            DeviceClass::Desktop,
        ));
        wait_for_full(&handle).await;

        service.update_source(&handle, ImageSource::literal("https://cdn/a.jpg"));
        // State is untouched: still Loaded(full) for a.jpg.
        assert!(handle.state().url().is_some_and(|u| u.contains("a.jpg")));
    }

    #[tokio::test]
    async fn test_update_source_restarts_for_new_source() {
        let service = delivery(MockStore::new());
        let handle = service.render(RenderSpec::new(
            ImageSource::literal("https://cdn/a.jpg"),
            DeviceClass::Desktop,
        ));
        wait_for_full(&handle).await;

        service.update_source(&handle, ImageSource::literal("https://cdn/b.jpg"));
        let state = wait_for_full(&handle).await;
        assert!(state.url().is_some_and(|u| u.contains("b.jpg")));
    }

    #[tokio::test]
    async fn test_retry_after_error_succeeds() {
        // First lookup fails transiently, second succeeds.
        let store = MockStore::new()
            .with_error_then_url("flaky", crate::error::StoreError::Transient("down".into()), "https://signed/flaky");
        let service = delivery(store);

        let handle = service.render(RenderSpec::new(
            ImageSource::logical_key("flaky"),
            DeviceClass::Desktop,
        ));
        let state = wait_for_full(&handle).await;
        assert!(matches!(state, LoadState::Errored(_)));

        service.retry(&handle);
        let state = wait_for_full(&handle).await;
        assert!(state.url().is_some_and(|u| u.starts_with("https://signed/flaky")));
    }

    #[tokio::test]
    async fn test_resolve_urls_warms_cache() {
        let service = delivery(
            MockStore::new()
                .with_url("a", "https://signed/a")
                .with_url("b", "https://signed/b"),
        );

        let keys = vec!["a".to_string(), "b".to_string()];
        let resolved = service.resolve_urls(&keys, SizeTier::Medium).await;
        assert_eq!(resolved.len(), 2);

        // A subsequent render for "a" is a cache hit.
        let handle = service.render(RenderSpec::new(
            ImageSource::logical_key("a"),
            DeviceClass::Desktop,
        ));
        wait_for_full(&handle).await;
        assert_eq!(handle.debug_info().cache_hit, Some(true));
    }

    #[tokio::test]
    async fn test_dropping_handle_releases_lease() {
        let service = delivery(MockStore::new().with_url("k", "https://signed/k"));
        let handle = service.render(RenderSpec::new(
            ImageSource::logical_key("k"),
            DeviceClass::Desktop,
        ));
        wait_for_full(&handle).await;
        assert!(service.credentials.is_leased("k", SizeTier::Medium));

        drop(handle);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!service.credentials.is_leased("k", SizeTier::Medium));
    }

    #[tokio::test]
    async fn test_failed_lookup_takes_no_lease() {
        let service = delivery(MockStore::new());
        let handle = service.render(RenderSpec::new(
            ImageSource::logical_key("absent"),
            DeviceClass::Desktop,
        ));

        let state = wait_for_full(&handle).await;
        assert!(matches!(state, LoadState::Errored(_)));
        // No refresh task should be ticking for a key that never resolved.
        assert!(!service.credentials.is_leased("absent", SizeTier::Medium));
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let service = delivery(MockStore::new().with_url("k", "https://signed/k"));

        let keys = vec!["k".to_string()];
        service.resolve_urls(&keys, SizeTier::Medium).await;
        assert_eq!(service.cache_stats().entry_count, 1);

        service.invalidate("k", SizeTier::Medium);
        assert_eq!(service.cache_stats().entry_count, 0);
    }
}
