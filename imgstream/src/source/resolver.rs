//! Source resolution: abstract source plus device class to candidate URL.

use super::types::{DeviceClass, ImageSource, ResolvedUrl, SizeTier};
use crate::error::ErrorKind;
use tracing::trace;

/// Outcome of resolving an [`ImageSource`].
#[derive(Debug, Clone, PartialEq)]
pub enum Candidate {
    /// The URL is usable immediately; no credential work required.
    Ready(ResolvedUrl),

    /// Resolution is delegated to the credential manager for a signed
    /// lookup of `(key, tier)`.
    Lookup { key: String, tier: SizeTier },
}

/// Resolves a source into a candidate for the given device class.
///
/// Purely a decision function plus a delegation marker; no network call is
/// made here. Responsive slot selection picks the slot matching the device
/// class and falls back to `desktop` (then `mobile`) when slots are absent.
///
/// # Errors
///
/// `ErrorKind::InvalidSource` for an empty literal URL or a responsive
/// triple with neither `mobile` nor `desktop` populated.
pub fn resolve(source: &ImageSource, device_class: DeviceClass) -> Result<Candidate, ErrorKind> {
    match source {
        ImageSource::Literal(url) => {
            if url.trim().is_empty() {
                return Err(ErrorKind::InvalidSource("empty literal URL".to_string()));
            }
            Ok(Candidate::Ready(ResolvedUrl::public(url.clone())))
        }

        ImageSource::Responsive {
            mobile,
            tablet,
            desktop,
        } => {
            let slot = select_slot(device_class, mobile, tablet, desktop)?;
            trace!(device_class = ?device_class, url = %slot, "responsive slot selected");
            Ok(Candidate::Ready(ResolvedUrl::public(slot.clone())))
        }

        ImageSource::LogicalKey { key, size_tier } => Ok(Candidate::Lookup {
            key: key.clone(),
            tier: size_tier.unwrap_or_default(),
        }),
    }
}

/// Picks the responsive slot for a device class.
///
/// Preference order: the slot matching the device class, then `desktop`,
/// then `mobile`. The tablet slot is only preferred for tablet devices.
fn select_slot<'a>(
    device_class: DeviceClass,
    mobile: &'a Option<String>,
    tablet: &'a Option<String>,
    desktop: &'a Option<String>,
) -> Result<&'a String, ErrorKind> {
    let preferred = match device_class {
        DeviceClass::Mobile => mobile.as_ref(),
        DeviceClass::Tablet => tablet.as_ref(),
        DeviceClass::Desktop => desktop.as_ref(),
    };

    preferred
        .or(desktop.as_ref())
        .or(mobile.as_ref())
        .ok_or_else(|| {
            ErrorKind::InvalidSource(
                "responsive source has neither mobile nor desktop slot".to_string(),
            )
        })
}
