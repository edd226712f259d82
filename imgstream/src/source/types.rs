//! Source, tier, and resolved-URL types.

use tokio::time::Instant;

/// Size variant for logical-key renditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SizeTier {
    /// Thumbnail-class rendition.
    Small,
    /// Default content rendition.
    #[default]
    Medium,
    /// Hero/full-bleed rendition.
    Large,
}

impl std::fmt::Display for SizeTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SizeTier::Small => write!(f, "small"),
            SizeTier::Medium => write!(f, "medium"),
            SizeTier::Large => write!(f, "large"),
        }
    }
}

/// Device class of the consuming render surface.
///
/// Supplied by the caller; this crate has no viewport of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    Mobile,
    Tablet,
    Desktop,
}

/// Abstract reference to an image.
///
/// Immutable once constructed; a render request carrying a different value
/// is a new source, never a mutation. Identity comparison (`==`) drives
/// pipeline cancellation and restart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImageSource {
    /// A concrete public URL, usable as-is.
    Literal(String),

    /// Per-device-class URL slots. Absent slots fall back to `desktop`;
    /// a triple with neither `mobile` nor `desktop` populated is a caller
    /// contract violation.
    Responsive {
        mobile: Option<String>,
        tablet: Option<String>,
        desktop: Option<String>,
    },

    /// An application-level identifier resolved through the keyed store.
    LogicalKey {
        key: String,
        size_tier: Option<SizeTier>,
    },
}

impl ImageSource {
    /// Creates a literal-URL source.
    pub fn literal(url: impl Into<String>) -> Self {
        ImageSource::Literal(url.into())
    }

    /// Creates a logical-key source with the default size tier.
    pub fn logical_key(key: impl Into<String>) -> Self {
        ImageSource::LogicalKey {
            key: key.into(),
            size_tier: None,
        }
    }

    /// Creates a logical-key source with an explicit size tier.
    pub fn logical_key_sized(key: impl Into<String>, tier: SizeTier) -> Self {
        ImageSource::LogicalKey {
            key: key.into(),
            size_tier: Some(tier),
        }
    }

    /// Returns the logical key and effective size tier, if this is a
    /// logical-key source.
    pub fn as_logical_key(&self) -> Option<(&str, SizeTier)> {
        match self {
            ImageSource::LogicalKey { key, size_tier } => {
                Some((key.as_str(), size_tier.unwrap_or_default()))
            }
            _ => None,
        }
    }
}

/// A concrete, possibly time-limited byte-source URL.
///
/// Signed entries are owned by the credential manager; everyone else holds
/// read-shared clones.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedUrl {
    /// The concrete URL to fetch renditions from.
    pub url: String,
    /// When the signed URL stops being valid; `None` for non-expiring
    /// literal/public URLs.
    pub expires_at: Option<Instant>,
    /// True when the URL was issued by the keyed store.
    pub is_signed: bool,
    /// Content hash for cache busting, when the store reports one.
    pub content_hash: Option<String>,
}

impl ResolvedUrl {
    /// Creates a non-expiring public URL entry.
    pub fn public(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            expires_at: None,
            is_signed: false,
            content_hash: None,
        }
    }

    /// Creates a signed entry.
    pub fn signed(
        url: impl Into<String>,
        expires_at: Option<Instant>,
        content_hash: Option<String>,
    ) -> Self {
        Self {
            url: url.into(),
            expires_at,
            is_signed: true,
            content_hash,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_tier_default_is_medium() {
        assert_eq!(SizeTier::default(), SizeTier::Medium);
    }

    #[test]
    fn test_size_tier_display() {
        assert_eq!(format!("{}", SizeTier::Small), "small");
        assert_eq!(format!("{}", SizeTier::Large), "large");
    }

    #[test]
    fn test_logical_key_accessor() {
        let source = ImageSource::logical_key("hero-1");
        assert_eq!(source.as_logical_key(), Some(("hero-1", SizeTier::Medium)));

        let source = ImageSource::logical_key_sized("hero-1", SizeTier::Large);
        assert_eq!(source.as_logical_key(), Some(("hero-1", SizeTier::Large)));

        assert_eq!(ImageSource::literal("a.jpg").as_logical_key(), None);
    }

    #[test]
    fn test_source_identity() {
        // Identity is value equality; a different tier is a different source.
        assert_eq!(
            ImageSource::logical_key("a"),
            ImageSource::logical_key("a")
        );
        assert_ne!(
            ImageSource::logical_key("a"),
            ImageSource::logical_key_sized("a", SizeTier::Large)
        );
    }

    #[test]
    fn test_public_resolved_url() {
        let resolved = ResolvedUrl::public("https://cdn.example.com/a.jpg");
        assert!(!resolved.is_signed);
        assert!(resolved.expires_at.is_none());
        assert!(resolved.content_hash.is_none());
    }
}
