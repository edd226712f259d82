//! imgstream - Adaptive image delivery and caching
//!
//! This library resolves abstract image references into concrete byte-source
//! URLs, manages time-limited signed URLs for private storage, and drives a
//! cancellable progressive-quality loading pipeline informed by live network
//! telemetry.
//!
//! # High-Level API
//!
//! For most use cases, the [`service`] module provides a simplified facade:
//!
//! ```ignore
//! use imgstream::service::{ImageDelivery, RenderSpec};
//! use imgstream::source::{DeviceClass, ImageSource};
//!
//! let delivery = ImageDelivery::new(store, fetcher, monitor, config);
//!
//! let handle = delivery.render(RenderSpec::new(
//!     ImageSource::logical_key("hero-homepage"),
//!     DeviceClass::Desktop,
//! ));
//!
//! let mut states = handle.subscribe();
//! while states.changed().await.is_ok() {
//!     // paint according to *states.borrow()
//! }
//! ```

pub mod cache;
pub mod config;
pub mod credential;
pub mod error;
pub mod network;
pub mod pipeline;
pub mod render;
pub mod service;
pub mod source;

/// Version of the imgstream library.
///
/// Defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
