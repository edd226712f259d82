//! Progressive optimization pipeline.
//!
//! Drives a cancellable sequence of increasing-quality rendition fetches
//! for a resolved source. Each successful stage is itself observable,
//! enabling progressive reveal: the render surface paints the tiny
//! rendition while the full one is still in flight.
//!
//! # Architecture
//!
//! ```text
//! ResolvedUrl ──► run() ──► tiny ──► low ──► medium ──► full
//!                  │          │       │        │          │
//!   NetworkProfile ┘          ▼       ▼        ▼          ▼
//!   (base quality)       Loading/Loaded transitions over mpsc
//!
//!   CancellationToken trips ──► in-flight fetch aborted, silence
//! ```

mod fetcher;
mod runner;
mod stage;

pub use fetcher::{HttpFetcher, Rendition, RenditionFetcher};
pub use runner::{run, PipelineParams};
pub use stage::{base_quality, Stage, StageName, STAGE_LADDER};
