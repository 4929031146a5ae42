use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Requested GPU texture compression for the `.ktx2` output of an image
/// conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ImageTarget {
    /// Universal ASTC (transcodable at load time). The default when a
    /// caller doesn't specify one.
    #[default]
    UASTC,
    /// ASTC 8x8 block size.
    ASTC,
    /// ASTC 4x4 block size (higher quality, larger output).
    #[serde(rename = "ASTC_HIGH")]
    AstcHigh,
}

impl ImageTarget {
    /// Short name used in cache keys and query parameters.
    pub fn name(self) -> &'static str {
        match self {
            ImageTarget::UASTC => "uastc",
            ImageTarget::ASTC => "astc",
            ImageTarget::AstcHigh => "astc_high",
        }
    }

    /// Integer encoding used in work-queue job payloads.
    pub fn as_code(self) -> u8 {
        match self {
            ImageTarget::UASTC => 0,
            ImageTarget::ASTC => 1,
            ImageTarget::AstcHigh => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ImageTarget::UASTC),
            1 => Some(ImageTarget::ASTC),
            2 => Some(ImageTarget::AstcHigh),
            _ => None,
        }
    }
}

impl fmt::Display for ImageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ImageTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "uastc" => Ok(ImageTarget::UASTC),
            "astc" => Ok(ImageTarget::ASTC),
            "astc_high" | "astchigh" => Ok(ImageTarget::AstcHigh),
            other => Err(format!("unrecognized image target: {other}")),
        }
    }
}
