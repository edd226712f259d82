//! Network profile and quality tier classification.

/// Coarse connection type reported by platform telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectiveType {
    /// Slowest tier, high-latency 2G.
    Slow2g,
    /// 2G-class connection.
    TwoG,
    /// 3G-class connection.
    ThreeG,
    /// 4G-class connection or better.
    FourG,
    /// Telemetry unavailable.
    Unknown,
}

impl std::fmt::Display for EffectiveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EffectiveType::Slow2g => write!(f, "slow-2g"),
            EffectiveType::TwoG => write!(f, "2g"),
            EffectiveType::ThreeG => write!(f, "3g"),
            EffectiveType::FourG => write!(f, "4g"),
            EffectiveType::Unknown => write!(f, "unknown"),
        }
    }
}

/// A point-in-time snapshot of connection telemetry.
///
/// Recomputed on every monitor sample; not persisted. All fields may be
/// absent on platforms without connection telemetry.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkProfile {
    /// Coarse connection classification.
    pub effective_type: EffectiveType,
    /// Round-trip time estimate in milliseconds, if known.
    pub rtt_ms: Option<u32>,
    /// Downlink bandwidth estimate in megabits per second, if known.
    pub downlink_mbps: Option<f64>,
    /// True when the user has requested reduced data usage.
    pub save_data: bool,
}

impl NetworkProfile {
    /// Profile representing absent telemetry. Classifies as `Standard`.
    pub fn unknown() -> Self {
        Self {
            effective_type: EffectiveType::Unknown,
            rtt_ms: None,
            downlink_mbps: None,
            save_data: false,
        }
    }

    /// Classifies this profile into a quality tier.
    ///
    /// `Poor` when data saving is enabled, the connection is 2G-class, or
    /// RTT is high *and* bandwidth is low together. A high RTT alone does
    /// not demote an otherwise healthy connection. `Good` when the
    /// connection is 3G-class or better, or bandwidth exceeds 1 Mbps.
    pub fn quality_tier(&self) -> QualityTier {
        let poor = self.save_data
            || matches!(
                self.effective_type,
                EffectiveType::Slow2g | EffectiveType::TwoG
            )
            || (self.rtt_ms.is_some_and(|rtt| rtt > 1000)
                && self.downlink_mbps.is_some_and(|mbps| mbps < 0.5));

        if poor {
            return QualityTier::Poor;
        }

        let good = matches!(
            self.effective_type,
            EffectiveType::ThreeG | EffectiveType::FourG
        ) || self.downlink_mbps.is_some_and(|mbps| mbps > 1.0);

        if good {
            QualityTier::Good
        } else {
            QualityTier::Standard
        }
    }
}

impl Default for NetworkProfile {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Coarse classification of current network conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QualityTier {
    /// Constrained connection; reduce quality.
    Poor,
    /// No strong signal either way.
    Standard,
    /// Healthy connection; serve requested quality.
    Good,
}

impl std::fmt::Display for QualityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualityTier::Poor => write!(f, "poor"),
            QualityTier::Standard => write!(f, "standard"),
            QualityTier::Good => write!(f, "good"),
        }
    }
}
