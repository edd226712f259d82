//! Configuration for the delivery subsystem.

use std::time::Duration;

/// Default freshness window for signed cache entries (45 minutes).
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(45 * 60);

/// Default refresh interval for leased signed URLs (45 minutes).
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(45 * 60);

/// Default bounded wait for a single stage fetch.
pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default cap on cached URL entries before LRU eviction.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Default requested quality when the caller does not specify one.
pub const DEFAULT_QUALITY: u8 = 80;

/// Default requested width bound when the caller does not specify one.
pub const DEFAULT_MAX_WIDTH: u32 = 1920;

/// Tunable settings for the delivery subsystem.
///
/// Defaults mirror production values: signed URLs are reused for 45 minutes
/// and refreshed on the same cadence while leased, and a stage fetch that
/// neither completes nor cancels within 10 seconds is treated as failed.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// How long a cached signed entry is served before being treated as a miss.
    pub freshness_window: Duration,

    /// Interval between background refreshes of a leased signed URL.
    pub refresh_interval: Duration,

    /// Bounded wait for a single stage fetch.
    pub stage_timeout: Duration,

    /// Maximum number of cached URL entries before LRU eviction.
    pub cache_capacity: usize,

    /// Quality used when a render request does not specify one.
    pub default_quality: u8,

    /// Width bound used when a render request does not specify one.
    pub default_max_width: u32,

    /// Key prefixes recognized as not-yet-populated placeholder assets.
    ///
    /// Lookup failures for matching keys are logged at debug rather than
    /// warn level. The state machine contract is unchanged: the run still
    /// reaches `Errored` and the fallback URL still engages.
    pub placeholder_prefixes: Vec<String>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            stage_timeout: DEFAULT_STAGE_TIMEOUT,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            default_quality: DEFAULT_QUALITY,
            default_max_width: DEFAULT_MAX_WIDTH,
            placeholder_prefixes: vec![
                "hero-".to_string(),
                "villalab-".to_string(),
                "experience-".to_string(),
            ],
        }
    }
}

impl DeliveryConfig {
    /// Returns true if the key follows a recognized placeholder naming
    /// convention for not-yet-populated assets.
    pub fn is_placeholder_key(&self, key: &str) -> bool {
        self.placeholder_prefixes
            .iter()
            .any(|prefix| key.starts_with(prefix.as_str()))
    }

    /// Sets the freshness window (primarily for tests).
    pub fn with_freshness_window(mut self, window: Duration) -> Self {
        self.freshness_window = window;
        self
    }

    /// Sets the stage timeout.
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// Sets the cache capacity.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }
}
