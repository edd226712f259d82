//! Load state machine.

use crate::error::ErrorKind;
use crate::pipeline::Stage;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Per-render-request loading state.
///
/// Valid paths: `Idle → Loading(stage) → {Loading(next) | Loaded | Errored}`.
/// `Loaded` and `Errored` are stable until the owning source identity
/// changes, which resets to `Idle` and starts a new run. A credential
/// failure before the first stage transitions `Idle → Errored` directly.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    /// No run in progress.
    Idle,
    /// A stage fetch is in flight.
    Loading(Stage),
    /// A stage rendition is available. Intermediate for tiny/low/medium,
    /// terminal for full.
    Loaded { url: String, stage: Stage },
    /// The run failed; the fallback URL engages.
    Errored(ErrorKind),
}

impl LoadState {
    /// Returns the stage this state is tagged with, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            LoadState::Loading(stage) => Some(*stage),
            LoadState::Loaded { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Returns true for `Loaded(full)` and `Errored`, the stable states.
    pub fn is_terminal(&self) -> bool {
        match self {
            LoadState::Loaded { stage, .. } => stage.is_final(),
            LoadState::Errored(_) => true,
            _ => false,
        }
    }

    /// Returns the loaded URL, if any stage has completed.
    pub fn url(&self) -> Option<&str> {
        match self {
            LoadState::Loaded { url, .. } => Some(url.as_str()),
            _ => None,
        }
    }
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadState::Idle => write!(f, "idle"),
            LoadState::Loading(stage) => write!(f, "loading({})", stage.name),
            LoadState::Loaded { stage, .. } => write!(f, "loaded({})", stage.name),
            LoadState::Errored(kind) => write!(f, "errored({kind})"),
        }
    }
}

/// Forwards pipeline transitions into the observable state channel.
///
/// This is the single writer of a render request's state: no other
/// component writes it directly. Stops when the pipeline closes its
/// channel or the run token trips; nothing is forwarded after
/// cancellation.
pub async fn drive(
    mut transitions: mpsc::Receiver<LoadState>,
    state_tx: watch::Sender<LoadState>,
    token: CancellationToken,
) {
    loop {
        // Biased so a tripped token always wins over a buffered
        // transition; an unbiased select would forward one either way.
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            state = transitions.recv() => state,
        };

        match next {
            // The token can trip between recv completing and this point.
            Some(_) if token.is_cancelled() => break,
            Some(state) => {
                debug!(state = %state, "render state transition");
                state_tx.send_replace(state);
            }
            None => break,
        }
    }
}
