//! Keyed store interface.

use crate::error::StoreError;
use crate::source::SizeTier;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

/// A signed URL as issued by the keyed store.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedUrl {
    /// The access-controlled URL.
    pub url: String,
    /// How long the URL remains valid, when the store reports it.
    pub expires_in: Option<Duration>,
    /// Content hash of the stored object, when the store tracks one.
    /// Appended to the URL as a version parameter for cache busting.
    pub content_hash: Option<String>,
}

impl SignedUrl {
    /// Creates a signed URL with no expiry or hash metadata.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            expires_in: None,
            content_hash: None,
        }
    }
}

/// Interface to the keyed object store.
///
/// The store is an external collaborator: a keyed lookup that returns
/// either a byte-source URL or an error. This trait is the seam for
/// dependency injection and mocking in tests.
pub trait KeyedStore: Send + Sync + 'static {
    /// Looks up a signed URL for `(key, tier)`.
    fn lookup_signed_url(
        &self,
        key: &str,
        tier: SizeTier,
    ) -> impl Future<Output = Result<SignedUrl, StoreError>> + Send;

    /// Batch lookup for the gallery pre-fetch path.
    ///
    /// The default implementation issues the single lookups concurrently;
    /// stores with a real batch query interface should override it.
    fn lookup_many(
        &self,
        keys: &[String],
        tier: SizeTier,
    ) -> impl Future<Output = HashMap<String, Result<SignedUrl, StoreError>>> + Send {
        async move {
            let lookups = keys.iter().map(|key| async move {
                let result = self.lookup_signed_url(key, tier).await;
                (key.clone(), result)
            });
            futures::future::join_all(lookups).await.into_iter().collect()
        }
    }
}
