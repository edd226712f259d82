//! Rendition fetcher abstraction for testability.

use crate::error::FetchError;
use std::future::Future;
use tracing::{debug, trace, warn};

/// Default User-Agent string for rendition requests.
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// A fetched rendition descriptor.
///
/// The render surface consumes the URL; bytes stay with the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendition {
    /// Concrete URL of the rendition, including width/quality bounds.
    pub url: String,
    /// Size reported by the origin, when known.
    pub content_length: Option<u64>,
}

/// Fetches a quality/width-bounded rendition of a resolved URL.
///
/// This abstraction allows for dependency injection and easier testing by
/// enabling mock fetchers in tests. Implementations must abort promptly
/// when the returned future is dropped; the pipeline drops in-flight
/// fetches on cancellation.
pub trait RenditionFetcher: Send + Sync + 'static {
    /// Requests a rendition bounded by `max_width_px` and `quality`.
    fn fetch_rendition(
        &self,
        url: &str,
        max_width_px: u32,
        quality: u8,
    ) -> impl Future<Output = Result<Rendition, FetchError>> + Send;
}

/// Real rendition fetcher backed by reqwest.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Creates a fetcher with connection pooling tuned for bursts of
    /// small rendition requests.
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(DEFAULT_USER_AGENT)
            .pool_max_idle_per_host(32)
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .tcp_keepalive(std::time::Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| FetchError::Http(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Builds the bounded rendition URL by appending transform parameters.
    fn rendition_url(url: &str, max_width_px: u32, quality: u8) -> String {
        let separator = if url.contains('?') { '&' } else { '?' };
        format!("{url}{separator}w={max_width_px}&q={quality}")
    }
}

impl RenditionFetcher for HttpFetcher {
    async fn fetch_rendition(
        &self,
        url: &str,
        max_width_px: u32,
        quality: u8,
    ) -> Result<Rendition, FetchError> {
        let rendition_url = Self::rendition_url(url, max_width_px, quality);
        trace!(url = %rendition_url, "rendition request starting");

        let response = match self.client.get(&rendition_url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(
                    url = %rendition_url,
                    error = %e,
                    is_connect = e.is_connect(),
                    is_timeout = e.is_timeout(),
                    "rendition request failed"
                );
                return Err(FetchError::Http(format!("request failed: {e}")));
            }
        };

        if !response.status().is_success() {
            warn!(
                url = %rendition_url,
                status = response.status().as_u16(),
                "rendition request returned error status"
            );
            return Err(FetchError::Http(format!(
                "HTTP {} from {}",
                response.status(),
                rendition_url
            )));
        }

        let content_length = response.content_length();
        debug!(
            url = %rendition_url,
            content_length = ?content_length,
            "rendition available"
        );

        Ok(Rendition {
            url: rendition_url,
            content_length,
        })
    }
}
