//! Image source model and resolution.
//!
//! An [`ImageSource`] is an abstract reference to an image: a literal URL,
//! a responsive slot triple, or a logical key resolved indirectly through
//! the keyed store. The resolver is a pure decision function that turns a
//! source plus device class into either a ready URL or a delegation to the
//! credential manager; it never touches the network itself.

mod resolver;
mod types;

pub use resolver::{resolve, Candidate};
pub use types::{DeviceClass, ImageSource, ResolvedUrl, SizeTier};
