//! Network condition monitor.

use super::profile::NetworkProfile;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Source of platform connection telemetry.
///
/// Implementations read whatever connectivity signals the platform exposes.
/// Sampling must be cheap and must never fail; a source with nothing to
/// report returns [`NetworkProfile::unknown`].
pub trait TelemetrySource: Send + Sync {
    /// Reads the current connection telemetry.
    fn sample(&self) -> NetworkProfile;
}

/// Telemetry source returning a fixed profile.
///
/// Serves environments without connection telemetry, and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticTelemetry {
    profile: NetworkProfile,
}

impl StaticTelemetry {
    /// Creates a source that always reports the given profile.
    pub fn new(profile: NetworkProfile) -> Self {
        Self { profile }
    }
}

impl TelemetrySource for StaticTelemetry {
    fn sample(&self) -> NetworkProfile {
        self.profile.clone()
    }
}

/// Samples connection telemetry and publishes profile changes.
///
/// The monitor makes no network calls of its own. Callers either poll
/// [`sample`](NetworkMonitor::sample) or hold a [`watch`] subscription and
/// react to published changes.
pub struct NetworkMonitor {
    source: Arc<dyn TelemetrySource>,
    profile_tx: watch::Sender<NetworkProfile>,
}

impl NetworkMonitor {
    /// Creates a monitor over the given telemetry source.
    pub fn new(source: Arc<dyn TelemetrySource>) -> Self {
        let initial = source.sample();
        let (profile_tx, _) = watch::channel(initial);
        Self { source, profile_tx }
    }

    /// Reads a fresh profile from the telemetry source.
    pub fn sample(&self) -> NetworkProfile {
        self.source.sample()
    }

    /// Subscribes to profile changes.
    ///
    /// The receiver holds the most recently published profile; changes are
    /// only published by [`refresh`](NetworkMonitor::refresh) or the
    /// background sampling task.
    pub fn subscribe(&self) -> watch::Receiver<NetworkProfile> {
        self.profile_tx.subscribe()
    }

    /// Samples once and publishes the profile if it changed.
    ///
    /// Returns the sampled profile.
    pub fn refresh(&self) -> NetworkProfile {
        let profile = self.source.sample();
        self.profile_tx.send_if_modified(|current| {
            if *current == profile {
                false
            } else {
                debug!(
                    effective_type = %profile.effective_type,
                    tier = %profile.quality_tier(),
                    "network profile changed"
                );
                *current = profile.clone();
                true
            }
        });
        profile
    }

    /// Spawns a background task that samples on a fixed interval.
    ///
    /// Returns a token; cancelling it stops the task.
    pub fn spawn_sampling(self: &Arc<Self>, interval: Duration) -> CancellationToken {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let monitor = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = ticker.tick() => {
                        monitor.refresh();
                    }
                }
            }
        });

        token
    }
}
