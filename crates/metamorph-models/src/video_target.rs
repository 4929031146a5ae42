use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Requested video container/codec for a motion conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VideoTarget {
    /// H.264 in an MP4 container. The default when a caller doesn't
    /// specify one.
    #[default]
    MP4,
    /// Theora in an Ogg container.
    OGV,
}

impl VideoTarget {
    pub fn name(self) -> &'static str {
        match self {
            VideoTarget::MP4 => "mp4",
            VideoTarget::OGV => "ogv",
        }
    }

    /// File extension of the produced artifact, including the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            VideoTarget::MP4 => ".mp4",
            VideoTarget::OGV => ".ogv",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            VideoTarget::MP4 => "video/mp4",
            VideoTarget::OGV => "video/ogg",
        }
    }

    pub fn as_code(self) -> u8 {
        match self {
            VideoTarget::MP4 => 0,
            VideoTarget::OGV => 1,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(VideoTarget::MP4),
            1 => Some(VideoTarget::OGV),
            _ => None,
        }
    }
}

impl fmt::Display for VideoTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VideoTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mp4" => Ok(VideoTarget::MP4),
            "ogv" | "ogg" => Ok(VideoTarget::OGV),
            other => Err(format!("unrecognized video target: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_mp4() {
        assert_eq!(VideoTarget::default(), VideoTarget::MP4);
    }

    #[test]
    fn extensions_match_content_types() {
        assert_eq!(VideoTarget::MP4.extension(), ".mp4");
        assert_eq!(VideoTarget::MP4.content_type(), "video/mp4");
        assert_eq!(VideoTarget::OGV.extension(), ".ogv");
        assert_eq!(VideoTarget::OGV.content_type(), "video/ogg");
    }
}
