//! Error types for image delivery.
//!
//! Errors are split by boundary: [`StoreError`] is what the keyed store
//! reports, [`FetchError`] is what a rendition fetch reports, and
//! [`ErrorKind`] is the user-visible taxonomy that reaches the render
//! state machine.

use thiserror::Error;

/// User-visible error taxonomy surfaced through `LoadState::Errored`.
///
/// `InvalidSource` and `Cancelled` are handled locally and never reach
/// presentation as errors; the remaining variants all surface as
/// `Errored(reason)` with the fallback URL engaged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    /// Caller contract violation (e.g. responsive source with neither
    /// mobile nor desktop slot populated). Detected without a network call.
    #[error("invalid image source: {0}")]
    InvalidSource(String),

    /// The keyed store could not produce a signed URL (missing key,
    /// access denied, or store failure).
    #[error("credential lookup failed for key '{key}': {message}")]
    CredentialLookupFailed { key: String, message: String },

    /// A rendition fetch was rejected for a non-timeout reason.
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// A bounded wait expired before the fetch completed.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The run was cancelled. Never user-visible; a cancelled run emits
    /// no further state.
    #[error("cancelled")]
    Cancelled,
}

impl ErrorKind {
    /// Returns true if this error should surface to presentation.
    pub fn is_presentable(&self) -> bool {
        !matches!(self, ErrorKind::InvalidSource(_) | ErrorKind::Cancelled)
    }
}

/// Errors reported by the keyed store when looking up a signed URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No record exists for the requested key.
    #[error("key not found: {0}")]
    NotFound(String),

    /// The store was reachable but the lookup failed transiently.
    #[error("transient store error: {0}")]
    Transient(String),
}

impl StoreError {
    /// Maps a store failure into the user-visible taxonomy.
    pub fn into_error_kind(self, key: &str) -> ErrorKind {
        ErrorKind::CredentialLookupFailed {
            key: key.to_string(),
            message: self.to_string(),
        }
    }
}

/// Errors reported by a rendition fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// HTTP-level failure (connect error, non-success status, body read).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The fetch did not complete within the configured stage timeout.
    #[error("fetch timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl From<FetchError> for ErrorKind {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Http(message) => ErrorKind::NetworkFailure(message),
            FetchError::Timeout(duration) => ErrorKind::Timeout(duration),
        }
    }
}
