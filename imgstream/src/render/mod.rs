//! Render state and the per-request handle.
//!
//! Each active render request owns one [`LoadState`] machine, written
//! exclusively by the pipeline's transition sequence and read by the
//! presentation layer to choose between a loading placeholder (tagged with
//! the current stage), the rendered image, or the error placeholder with
//! its retry affordance.

mod handle;
mod state;

pub use handle::{DebugInfo, RenderHandle};
pub use state::{drive, LoadState};
