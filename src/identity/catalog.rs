//! Fixed device catalog for browsing identities
//!
//! Fingerprints are drawn from a small table of real phone models rather
//! than generated freely, so every viewport / pixel ratio / user agent
//! triple is one a real device would send. Selection takes the RNG as an
//! argument; seeding it reproduces the same sequence of devices.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

/// Operating-system family of a catalog device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceFamily {
    /// iPhone running mobile Safari
    Ios,
    /// Android phone running Chrome
    Android,
}

/// One catalog entry: logical resolution and pixel density of a real device
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceModel {
    pub name: &'static str,
    pub family: DeviceFamily,
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f32,
}

/// Devices an identity can impersonate
pub const DEVICE_CATALOG: &[DeviceModel] = &[
    DeviceModel {
        name: "iPhone 15/14/13 Pro",
        family: DeviceFamily::Ios,
        width: 390,
        height: 844,
        pixel_ratio: 3.0,
    },
    DeviceModel {
        name: "iPhone 15/14 Pro Max",
        family: DeviceFamily::Ios,
        width: 430,
        height: 932,
        pixel_ratio: 3.0,
    },
    DeviceModel {
        name: "Pixel 7",
        family: DeviceFamily::Android,
        width: 412,
        height: 915,
        pixel_ratio: 2.6,
    },
    DeviceModel {
        name: "Samsung Galaxy S23",
        family: DeviceFamily::Android,
        width: 360,
        height: 800,
        pixel_ratio: 3.0,
    },
    DeviceModel {
        name: "Xiaomi 13",
        family: DeviceFamily::Android,
        width: 393,
        height: 873,
        pixel_ratio: 3.0,
    },
];

const IOS_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_5 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";

/// Logical screen size in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// A concrete fingerprint sampled from the catalog
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FingerprintProfile {
    pub device: &'static str,
    pub family: DeviceFamily,
    pub viewport: Viewport,
    pub pixel_ratio: f32,
    pub user_agent: String,
}

impl FingerprintProfile {
    /// Build the fingerprint for a given device
    pub fn for_device<R: Rng + ?Sized>(model: &DeviceModel, rng: &mut R) -> Self {
        Self {
            device: model.name,
            family: model.family,
            viewport: Viewport {
                width: model.width,
                height: model.height,
            },
            pixel_ratio: model.pixel_ratio,
            user_agent: user_agent_for(model, rng),
        }
    }
}

/// Pick a device uniformly from the catalog and build its fingerprint
pub fn sample_profile<R: Rng + ?Sized>(rng: &mut R) -> FingerprintProfile {
    let model = DEVICE_CATALOG.choose(rng).unwrap_or(&DEVICE_CATALOG[0]);
    FingerprintProfile::for_device(model, rng)
}

/// User agent matching a device family
///
/// Android agents embed the model name and a sampled Chrome build.
fn user_agent_for<R: Rng + ?Sized>(model: &DeviceModel, rng: &mut R) -> String {
    match model.family {
        DeviceFamily::Ios => IOS_USER_AGENT.to_string(),
        DeviceFamily::Android => {
            let major = rng.gen_range(140..=146);
            let build = rng.gen_range(6000..=7000);
            format!(
                "Mozilla/5.0 (Linux; Android 14; {}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{major}.0.{build}.100 Mobile Safari/537.36",
                model.name
            )
        }
    }
}
