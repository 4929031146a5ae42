use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::image_target::ImageTarget;
use crate::video_target::VideoTarget;

/// Lowercase hex SHA-256 of a source URL. The stable identifier for
/// everything cached about that URL, independent of requested format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversionHash(String);

impl ConversionHash {
    /// Hash a source URL. Hashing operates on the URL string exactly as
    /// given; callers are responsible for any normalization they want
    /// reflected in the cache key.
    pub fn of_url(url: &str) -> Self {
        let digest = Sha256::digest(url.as_bytes());
        Self(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The tuple that identifies one possible cached conversion: a source URL
/// (represented by its hash) plus the two independent target formats a
/// caller can ask for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversionIdentity {
    pub hash: ConversionHash,
    pub image_target: ImageTarget,
    pub video_target: VideoTarget,
}

impl ConversionIdentity {
    pub fn new(url: &str, image_target: ImageTarget, video_target: VideoTarget) -> Self {
        Self {
            hash: ConversionHash::of_url(url),
            image_target,
            video_target,
        }
    }

    /// Suffix used inside the `converting:...` in-flight marker key:
    /// `{hash}-{image_target}-{video_target}`.
    pub fn marker_suffix(&self) -> String {
        format!("{}-{}-{}", self.hash, self.image_target, self.video_target)
    }
}

impl fmt::Display for ConversionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.marker_suffix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_lowercase_hex() {
        let a = ConversionHash::of_url("https://example.com/a.png");
        let b = ConversionHash::of_url("https://example.com/a.png");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn different_urls_hash_differently() {
        let a = ConversionHash::of_url("https://example.com/a.png");
        let b = ConversionHash::of_url("https://example.com/b.png");
        assert_ne!(a, b);
    }

    #[test]
    fn marker_suffix_embeds_both_targets() {
        let id = ConversionIdentity::new("https://example.com/a.png", ImageTarget::ASTC, VideoTarget::OGV);
        assert_eq!(id.marker_suffix(), format!("{}-astc-ogv", id.hash));
    }
}
