//! Staged pipeline execution.

use super::fetcher::RenditionFetcher;
use super::stage::{base_quality, STAGE_LADDER};
use crate::error::{ErrorKind, FetchError};
use crate::network::NetworkProfile;
use crate::render::LoadState;
use crate::source::ResolvedUrl;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Transition channel depth. A full run emits at most nine transitions
/// (Loading+Loaded per stage, plus a possible Errored), so a slow reader
/// never blocks a stage fetch for long.
const TRANSITION_CHANNEL_CAPACITY: usize = 8;

/// Caller-side bounds applied on top of the stage ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineParams {
    /// Quality requested by the caller, before network adjustment.
    pub requested_quality: u8,
    /// Width bound requested by the caller.
    pub requested_max_width: u32,
    /// Per-stage fetch deadline.
    pub stage_timeout: Duration,
}

/// Starts a staged run and returns its transition stream.
///
/// Walks the ladder in order, emitting `Loading(stage)` before each fetch
/// and `Loaded` after. The first failure or timeout emits `Errored` and
/// stops the run; stages already delivered stay delivered. Cancellation
/// at any point ends the run with no further transitions, including
/// after a fetch that raced the token and won.
pub fn run<F: RenditionFetcher>(
    fetcher: Arc<F>,
    resolved: ResolvedUrl,
    params: PipelineParams,
    profile: NetworkProfile,
    token: CancellationToken,
) -> mpsc::Receiver<LoadState> {
    let (tx, rx) = mpsc::channel(TRANSITION_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let tier = profile.quality_tier();
        let base = base_quality(params.requested_quality, tier);
        debug!(
            url = %resolved.url,
            tier = ?tier,
            base_quality = base,
            "pipeline run starting"
        );

        for stage in STAGE_LADDER {
            if token.is_cancelled() {
                debug!(stage = %stage.name, "pipeline run cancelled before stage");
                return;
            }

            if tx.send(LoadState::Loading(stage)).await.is_err() {
                return;
            }

            let quality = stage.adjusted_quality(base);
            let width = stage.bounded_width(params.requested_max_width);
            let fetch = fetcher.fetch_rendition(&resolved.url, width, quality);

            let outcome = tokio::select! {
                _ = token.cancelled() => {
                    debug!(stage = %stage.name, "pipeline run cancelled mid-fetch");
                    return;
                }
                result = tokio::time::timeout(params.stage_timeout, fetch) => result,
            };

            let rendition = match outcome {
                Ok(Ok(rendition)) => rendition,
                Ok(Err(err)) => {
                    warn!(stage = %stage.name, error = %err, "stage fetch failed");
                    let kind = match err {
                        FetchError::Timeout(d) => ErrorKind::Timeout(d),
                        other => other.into(),
                    };
                    let _ = tx.send(LoadState::Errored(kind)).await;
                    return;
                }
                Err(_) => {
                    warn!(
                        stage = %stage.name,
                        timeout_ms = params.stage_timeout.as_millis() as u64,
                        "stage fetch timed out"
                    );
                    let _ = tx
                        .send(LoadState::Errored(ErrorKind::Timeout(params.stage_timeout)))
                        .await;
                    return;
                }
            };

            // A fetch may complete in the same poll the token trips; the
            // re-check keeps cancellation silent.
            if token.is_cancelled() {
                debug!(stage = %stage.name, "pipeline run cancelled after fetch");
                return;
            }

            if tx
                .send(LoadState::Loaded {
                    url: rendition.url,
                    stage,
                })
                .await
                .is_err()
            {
                return;
            }

            if stage.is_final() {
                info!(url = %resolved.url, "pipeline run complete");
            }
        }
    });

    rx
}
