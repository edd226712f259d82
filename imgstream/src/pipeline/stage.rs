//! The fixed progressive-quality stage ladder.

use crate::network::QualityTier;

/// Floor applied to degraded quality under constrained networks.
const QUALITY_FLOOR: u8 = 40;

/// Reduction applied to the requested quality on non-good networks.
const QUALITY_PENALTY: u8 = 20;

/// Name of a ladder step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageName {
    Tiny,
    Low,
    Medium,
    Full,
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageName::Tiny => write!(f, "tiny"),
            StageName::Low => write!(f, "low"),
            StageName::Medium => write!(f, "medium"),
            StageName::Full => write!(f, "full"),
        }
    }
}

/// One step in the fixed progressive-quality ladder.
///
/// Stages are totally ordered by `max_width_px`; a pipeline run never
/// emits a stage narrower than one it already emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Stage {
    pub name: StageName,
    /// Rendition quality (0-100) requested at this stage.
    pub quality: u8,
    /// Width bound in pixels for this stage's rendition.
    pub max_width_px: u32,
}

/// The canonical ladder: tiny(q20,100px) → low(q40,400px) →
/// medium(q60,800px) → full(q80,1920px).
pub const STAGE_LADDER: [Stage; 4] = [
    Stage {
        name: StageName::Tiny,
        quality: 20,
        max_width_px: 100,
    },
    Stage {
        name: StageName::Low,
        quality: 40,
        max_width_px: 400,
    },
    Stage {
        name: StageName::Medium,
        quality: 60,
        max_width_px: 800,
    },
    Stage {
        name: StageName::Full,
        quality: 80,
        max_width_px: 1920,
    },
];

impl Stage {
    /// The first ladder step.
    pub const TINY: Stage = STAGE_LADDER[0];
    /// The final ladder step.
    pub const FULL: Stage = STAGE_LADDER[3];

    /// Quality actually requested at this stage for the given base quality.
    pub fn adjusted_quality(&self, base_quality: u8) -> u8 {
        self.quality.min(base_quality)
    }

    /// Width bound actually requested at this stage.
    pub fn bounded_width(&self, requested_max_width: u32) -> u32 {
        self.max_width_px.min(requested_max_width)
    }

    /// Returns true if this is the terminal ladder step.
    pub fn is_final(&self) -> bool {
        self.name == StageName::Full
    }
}

/// Computes the base quality for a run.
///
/// A good network serves the caller-requested quality unchanged; anything
/// else is penalized by 20 points with a floor of 40.
pub fn base_quality(requested_quality: u8, tier: QualityTier) -> u8 {
    match tier {
        QualityTier::Good => requested_quality,
        QualityTier::Standard | QualityTier::Poor => {
            requested_quality.saturating_sub(QUALITY_PENALTY).max(QUALITY_FLOOR)
        }
    }
}
