//! Per-request render handle.

use super::state::LoadState;
use crate::source::{DeviceClass, ImageSource};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Diagnostic details of the most recent resolution.
///
/// Surfaced to debug overlays; never consulted by delivery logic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DebugInfo {
    /// Whether the last credential resolution was served from cache.
    /// `None` until a lookup-backed resolution completes, and for
    /// literal/responsive sources that never touch the store.
    pub cache_hit: Option<bool>,
    /// Content hash of the resolved asset, when the store reports one.
    pub content_hash: Option<String>,
    /// Wall-clock time of the last successful resolution.
    pub last_updated: Option<DateTime<Utc>>,
}

/// Handle to one active render request.
///
/// Owns the request's state channel and the cancellation token of its
/// current pipeline run. Dropping the handle cancels the run and releases
/// the refresh lease on its key; neither emits further state.
pub struct RenderHandle {
    source: Mutex<ImageSource>,
    device_class: DeviceClass,
    fallback_url: String,
    requested_quality: u8,
    requested_max_width: u32,
    state_tx: watch::Sender<LoadState>,
    run_token: Mutex<CancellationToken>,
    debug: Arc<Mutex<DebugInfo>>,
}

impl RenderHandle {
    pub(crate) fn new(
        source: ImageSource,
        device_class: DeviceClass,
        fallback_url: String,
        requested_quality: u8,
        requested_max_width: u32,
    ) -> Self {
        let (state_tx, _) = watch::channel(LoadState::Idle);
        Self {
            source: Mutex::new(source),
            device_class,
            fallback_url,
            requested_quality,
            requested_max_width,
            state_tx,
            run_token: Mutex::new(CancellationToken::new()),
            debug: Arc::new(Mutex::new(DebugInfo::default())),
        }
    }

    /// Subscribes to state transitions for this request.
    pub fn subscribe(&self) -> watch::Receiver<LoadState> {
        self.state_tx.subscribe()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> LoadState {
        self.state_tx.borrow().clone()
    }

    /// The URL the render surface should paint right now.
    ///
    /// The most recently loaded stage when one exists; the fallback URL
    /// while idle, loading with nothing delivered yet, or errored.
    pub fn display_url(&self) -> String {
        match self.state_tx.borrow().url() {
            Some(url) => url.to_string(),
            None => self.fallback_url.clone(),
        }
    }

    /// Snapshot of the source this handle is currently rendering.
    pub fn source(&self) -> ImageSource {
        self.source.lock().unwrap().clone()
    }

    /// Device class the request was created for.
    pub fn device_class(&self) -> DeviceClass {
        self.device_class
    }

    /// Diagnostic details of the most recent resolution.
    pub fn debug_info(&self) -> DebugInfo {
        self.debug.lock().unwrap().clone()
    }

    /// Cancels the current run without starting another.
    ///
    /// The state stays where it was; no `Errored` is emitted.
    pub fn abort(&self) {
        self.run_token.lock().unwrap().cancel();
    }

    /// Cancels any current run and installs a fresh token for the next one.
    pub(crate) fn begin_run(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let previous = {
            let mut guard = self.run_token.lock().unwrap();
            std::mem::replace(&mut *guard, token.clone())
        };
        previous.cancel();
        token
    }

    pub(crate) fn replace_source(&self, source: ImageSource) {
        *self.source.lock().unwrap() = source;
    }

    pub(crate) fn state_sender(&self) -> watch::Sender<LoadState> {
        self.state_tx.clone()
    }

    pub(crate) fn reset_state(&self) {
        self.state_tx.send_replace(LoadState::Idle);
    }

    pub(crate) fn debug_slot(&self) -> Arc<Mutex<DebugInfo>> {
        Arc::clone(&self.debug)
    }

    pub(crate) fn requested_quality(&self) -> u8 {
        self.requested_quality
    }

    pub(crate) fn requested_max_width(&self) -> u32 {
        self.requested_max_width
    }
}

impl Drop for RenderHandle {
    fn drop(&mut self) {
        self.run_token.lock().unwrap().cancel();
    }
}

impl std::fmt::Debug for RenderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderHandle")
            .field("source", &self.source())
            .field("device_class", &self.device_class)
            .field("state", &self.state())
            .finish()
    }
}
