use crate::identity::{ConversionHash, ConversionIdentity};

/// The cache-keyspace version. Bumping this abandons every previously
/// cached record at once, since every key below embeds it.
pub const CACHE_KEY_VERSION: u32 = 1;

/// In-flight marker TTL (spec: 10 minutes).
pub const IN_FLIGHT_TTL_SECS: u64 = 600;

/// Derives the five KV key shapes for one `(hash, format)` pair from a
/// single place, so nothing can forget to embed the keyspace version.
#[derive(Debug, Clone)]
pub struct CacheKeys {
    hash: ConversionHash,
    format: String,
    version: u32,
}

impl CacheKeys {
    pub fn new(hash: ConversionHash, format: impl Into<String>, version: u32) -> Self {
        Self {
            hash,
            format: format.into(),
            version,
        }
    }

    fn base(&self) -> String {
        format!("{}_{}_{}", self.hash, self.format, self.version)
    }

    /// KV key holding the object-store key of the cached artifact.
    pub fn object_key(&self) -> String {
        self.base()
    }

    /// KV key holding the origin's ETag for the source URL.
    pub fn etag_key(&self) -> String {
        format!("etag:{}", self.base())
    }

    /// KV key whose presence (and TTL) marks the cached artifact as fresh.
    pub fn valid_key(&self) -> String {
        format!("valid:{}", self.base())
    }

    /// KV key holding the media-class tag, written once per hash
    /// (independent of format).
    pub fn filetype_key(&self) -> String {
        format!("filetype:{}_{}", self.hash, self.version)
    }
}

/// The in-flight marker key, keyed by the full conversion identity rather
/// than by format, since a conversion job is claimed before its output
/// format name is known.
pub fn in_flight_key(identity: &ConversionIdentity, version: u32) -> String {
    format!("converting:{}_{}", identity.marker_suffix(), version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_target::ImageTarget;
    use crate::video_target::VideoTarget;

    #[test]
    fn keys_embed_hash_format_and_version() {
        let hash = ConversionHash::of_url("https://example.com/a.png");
        let keys = CacheKeys::new(hash.clone(), "uastc", 1);
        assert_eq!(keys.object_key(), format!("{hash}_uastc_1"));
        assert_eq!(keys.etag_key(), format!("etag:{hash}_uastc_1"));
        assert_eq!(keys.valid_key(), format!("valid:{hash}_uastc_1"));
        assert_eq!(keys.filetype_key(), format!("filetype:{hash}_1"));
    }

    #[test]
    fn filetype_key_is_independent_of_format() {
        let hash = ConversionHash::of_url("https://example.com/a.png");
        let a = CacheKeys::new(hash.clone(), "uastc", 1);
        let b = CacheKeys::new(hash, "astc", 1);
        assert_eq!(a.filetype_key(), b.filetype_key());
    }

    #[test]
    fn in_flight_key_embeds_both_targets_and_version() {
        let id = ConversionIdentity::new("https://example.com/a.png", ImageTarget::UASTC, VideoTarget::MP4);
        let key = in_flight_key(&id, 1);
        assert!(key.starts_with("converting:"));
        assert!(key.ends_with("_1"));
    }
}
