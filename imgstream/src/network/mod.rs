//! Network condition monitoring.
//!
//! Samples platform connection telemetry and classifies it into a coarse
//! quality tier that drives base quality selection in the pipeline. The
//! monitor itself makes no network calls; it only reads whatever telemetry
//! the platform exposes, and degrades gracefully to [`QualityTier::Standard`]
//! when none is available.

mod monitor;
mod profile;

pub use monitor::{NetworkMonitor, StaticTelemetry, TelemetrySource};
pub use profile::{EffectiveType, NetworkProfile, QualityTier};
