//! Browsing identities and their rotation
//!
//! - [`catalog`] - fixed device table and seedable fingerprint sampling
//! - [`manager`] - identity lifecycle under the configured rotation strategy

pub mod catalog;
pub mod manager;

pub use catalog::{sample_profile, DeviceFamily, FingerprintProfile, Viewport, DEVICE_CATALOG};
pub use manager::{Identity, IdentityManager, RotationReason, RotationStrategy};
