use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::shared::region::PixelRect;

use super::raster_surface::RasterSurface;

/// Obfuscation applied to each tracked face.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnonymizationMode {
    #[default]
    Blur,
    Pixelate,
    BlackBox,
}

impl AnonymizationMode {
    pub const ALL: &[AnonymizationMode] = &[
        AnonymizationMode::Blur,
        AnonymizationMode::Pixelate,
        AnonymizationMode::BlackBox,
    ];
}

impl fmt::Display for AnonymizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnonymizationMode::Blur => write!(f, "blur"),
            AnonymizationMode::Pixelate => write!(f, "pixelate"),
            AnonymizationMode::BlackBox => write!(f, "blackBox"),
        }
    }
}

impl FromStr for AnonymizationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "blur" => Ok(AnonymizationMode::Blur),
            "pixelate" => Ok(AnonymizationMode::Pixelate),
            "blackbox" => Ok(AnonymizationMode::BlackBox),
            other => Err(format!(
                "unknown anonymization mode '{other}' (expected blur, pixelate or black-box)"
            )),
        }
    }
}

/// Domain interface for painting an obfuscation effect onto one region.
///
/// `region` is in surface pixels and may reach past the surface edges;
/// implementations clamp it and treat an empty intersection as a no-op.
pub trait RegionEffect: Send {
    fn mode(&self) -> AnonymizationMode;

    fn apply(&self, surface: &mut dyn RasterSurface, region: PixelRect);
}
