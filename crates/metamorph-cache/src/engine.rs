use std::path::Path;
use std::sync::Arc;

use metamorph_kv::Kv;
use metamorph_models::{
    in_flight_key, CacheKeys, ConversionHash, ConversionIdentity, ImageTarget, MediaClass,
    RefreshRequest, VideoTarget, CACHE_KEY_VERSION,
};
use metamorph_storage::Store;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{CacheError, CacheResult};
use crate::record::CacheRecord;
use crate::refresh_sink::RefreshSink;
use crate::sanitize::sanitize_max_age;

/// Minimum acceptable freshness window (default: 5 minutes).
pub const DEFAULT_MIN_MAX_AGE_SECS: u64 = 300;

/// Configuration for [`CacheEngine`], passed through construction rather
/// than read ad hoc so the version integer and freshness floor stay fixed
/// for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct CacheEngineConfig {
    /// Public URL prefix the object key is appended to. Must end in `/`.
    pub endpoint: String,
    pub min_max_age_secs: u64,
    pub version: u32,
}

impl CacheEngineConfig {
    pub fn from_env() -> CacheResult<Self> {
        let endpoint = std::env::var("CACHE_ENDPOINT")
            .map_err(|_| CacheError::not_configured("CACHE_ENDPOINT not set"))?;
        let endpoint = if endpoint.ends_with('/') {
            endpoint
        } else {
            format!("{endpoint}/")
        };
        let min_max_age_secs = std::env::var("CACHE_MIN_MAX_AGE_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MIN_MAX_AGE_SECS);
        let version = std::env::var("CACHE_KEY_VERSION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(CACHE_KEY_VERSION);
        Ok(Self {
            endpoint,
            min_max_age_secs,
            version,
        })
    }
}

/// Content-type for an object key, chosen from the local file's extension.
fn content_type_for_extension(extension: &str) -> Option<&'static str> {
    match extension {
        ".ktx2" => Some("image/ktx2"),
        ".mp4" => Some("video/mp4"),
        ".ogv" => Some("video/ogg"),
        _ => None,
    }
}

/// Parses a `max-age=N` directive out of a `Cache-Control` header value.
/// `no-cache` and `no-store` are treated as `max-age=0` (sanitized back up
/// to the floor by the caller), matching the worker's download path.
fn parse_cache_control_max_age(value: &str) -> Option<u64> {
    if value.contains("no-cache") || value.contains("no-store") {
        return Some(0);
    }
    value.split(',').map(str::trim).find_map(|part| {
        let rest = part.strip_prefix("max-age=")?;
        rest.parse::<u64>().ok()
    })
}

/// The system of record for "does a fresh artifact exist for this
/// conversion, where is it, and is it due for revalidation?" Combines a
/// [`Kv`] metadata store with an optional [`Store`] object store; `store()`
/// fails with [`CacheError::NotConfigured`] when no object store is wired.
pub struct CacheEngine {
    kv: Arc<dyn Kv>,
    store: Option<Arc<dyn Store>>,
    refresh_sink: Arc<dyn RefreshSink>,
    http: reqwest::Client,
    config: CacheEngineConfig,
}

impl CacheEngine {
    pub fn new(
        kv: Arc<dyn Kv>,
        store: Option<Arc<dyn Store>>,
        refresh_sink: Arc<dyn RefreshSink>,
        config: CacheEngineConfig,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("revalidation HTTP client");
        Self {
            kv,
            store,
            refresh_sink,
            http,
            config,
        }
    }

    /// Exercises the KV connection for the readiness probe. A miss is as
    /// good a sign of connectivity as a hit; only the round trip itself
    /// is checked.
    pub async fn check_kv_connectivity(&self) -> CacheResult<()> {
        self.kv.get("__health_check__").await?;
        Ok(())
    }

    /// Exercises the object store connection for the readiness probe.
    /// `NotConfigured` when no store is wired (dev mode without one).
    pub async fn check_storage_connectivity(&self) -> CacheResult<()> {
        let store = self.store.as_ref().ok_or_else(|| CacheError::not_configured("no object store configured"))?;
        store.exists("__health_check__").await?;
        Ok(())
    }

    /// Uploads `local_path` as the artifact for `(hash, format_name)` and
    /// writes the associated cache-record keys. See module docs for the
    /// batching rules around the freshness marker.
    pub async fn store(
        &self,
        hash: &ConversionHash,
        format_name: &str,
        media_class: MediaClass,
        etag: Option<&str>,
        max_age: Option<u64>,
        local_path: &Path,
    ) -> CacheResult<()> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| CacheError::not_configured("object store"))?;

        let extension = local_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        let content_type = content_type_for_extension(&extension)
            .ok_or_else(|| CacheError::unsupported_extension(extension.clone()))?;

        let timestamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");
        let object_key = format!("{timestamp}-{hash}-{format_name}{extension}");

        let bytes = tokio::fs::read(local_path).await?;
        store.put(&object_key, bytes, content_type).await?;
        debug!(%hash, format_name, object_key, "stored conversion artifact");

        let sanitized = sanitize_max_age(max_age, etag, self.config.min_max_age_secs);
        let keys = CacheKeys::new(hash.clone(), format_name, self.config.version);

        let mut pairs = vec![
            (keys.object_key(), object_key),
            (keys.filetype_key(), media_class.as_tag().to_string()),
        ];
        if let Some(etag) = etag {
            pairs.push((keys.etag_key(), etag.to_string()));
        }
        if sanitized.is_none() {
            // Cache indefinitely: the freshness marker carries no TTL, so it
            // can join the same batch as the object key.
            pairs.push((keys.valid_key(), "1".to_string()));
        }
        self.kv.mset(&pairs).await?;

        if let Some(ttl) = sanitized {
            // A TTL'd marker needs its own write; the object key above is
            // already visible, so readers see a brief window where the
            // artifact exists but isn't yet marked fresh (documented in the
            // design notes as an accepted consequence of this ordering).
            self.kv.set_ex(&keys.valid_key(), "1", ttl).await?;
        }

        Ok(())
    }

    /// Reads whether a fresh (or stale-but-present) artifact exists for
    /// `hash` under whichever target matches the stored media class.
    /// `source_url`, when given, lets an expired or force-refreshed hit
    /// fire off an asynchronous revalidation without delaying the return.
    pub async fn lookup(
        &self,
        hash: &ConversionHash,
        image_target: ImageTarget,
        video_target: VideoTarget,
        force_refresh: bool,
        source_url: Option<&str>,
    ) -> CacheResult<Option<CacheRecord>> {
        let record = self.read_record(hash, image_target, video_target).await?;
        let Some(record) = record else {
            return Ok(None);
        };

        let should_refresh = (record.expired && !record.converting) || force_refresh;
        if should_refresh {
            if let Some(url) = source_url {
                let req = RefreshRequest {
                    hash: hash.clone(),
                    url: url.to_string(),
                    image_target,
                    video_target,
                    force: force_refresh,
                };
                let sink = self.refresh_sink.clone();
                // Fire-and-forget: the caller gets `record` back immediately.
                tokio::spawn(async move { sink.submit(req).await });
            }
        }

        Ok(Some(record))
    }

    /// Returns `true` iff the cached artifact may be considered fresh after
    /// this call. Unlike `lookup`, this never itself triggers a refresh
    /// request — it IS the thing the refresh pipeline calls.
    pub async fn revalidate(
        &self,
        hash: &ConversionHash,
        url: &str,
        image_target: ImageTarget,
        video_target: VideoTarget,
        force_refresh: bool,
        mut cancel: watch::Receiver<bool>,
    ) -> CacheResult<bool> {
        let Some(record) = self.read_record(hash, image_target, video_target).await? else {
            return Ok(false);
        };

        if !force_refresh && !record.expired {
            return Ok(true);
        }

        let mut request = self.http.head(url);
        if let Some(etag) = &record.etag {
            request = request.header(reqwest::header::IF_NONE_MATCH, etag.clone());
        }

        let response = tokio::select! {
            biased;
            _ = cancel.changed() => {
                debug!(%hash, "revalidation cancelled");
                return Ok(false);
            }
            result = request.send() => match result {
                Ok(response) => response,
                Err(e) => {
                    warn!(%hash, error = %e, "revalidation HEAD request failed");
                    return Ok(false);
                }
            },
        };

        if response.status() != reqwest::StatusCode::NOT_MODIFIED {
            return Ok(false);
        }

        let max_age = response
            .headers()
            .get(reqwest::header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_cache_control_max_age);
        let sanitized = sanitize_max_age(max_age, record.etag.as_deref(), self.config.min_max_age_secs);

        let keys = CacheKeys::new(hash.clone(), record.format.clone(), self.config.version);
        match sanitized {
            Some(ttl) => self.kv.set_ex(&keys.valid_key(), "1", ttl).await?,
            None => self.kv.set(&keys.valid_key(), "1").await?,
        }

        Ok(true)
    }

    /// Shared multi-GET underlying `lookup` and `revalidate`, without the
    /// refresh side effect that only `lookup` performs.
    async fn read_record(
        &self,
        hash: &ConversionHash,
        image_target: ImageTarget,
        video_target: VideoTarget,
    ) -> CacheResult<Option<CacheRecord>> {
        let probe_keys = CacheKeys::new(hash.clone(), "probe", self.config.version);
        let class_tag = self.kv.get(&probe_keys.filetype_key()).await?;
        let Some(class_tag) = class_tag else {
            return Ok(None);
        };

        let format_name = if class_tag == "Video" {
            video_target.name()
        } else {
            image_target.name()
        };
        let keys = CacheKeys::new(hash.clone(), format_name, self.config.version);
        let identity = ConversionIdentity {
            hash: hash.clone(),
            image_target,
            video_target,
        };

        let fetch = vec![
            keys.object_key(),
            keys.etag_key(),
            keys.valid_key(),
            in_flight_key(&identity, self.config.version),
        ];
        let values = self.kv.mget(&fetch).await?;
        let object_key = values[0].clone();
        let Some(object_key) = object_key else {
            return Ok(None);
        };
        let etag = values[1].clone();
        let expired = values[2].is_none();
        let converting = values[3].is_some();

        Ok(Some(CacheRecord {
            url: format!("{}{object_key}", self.config.endpoint),
            etag,
            expired,
            converting,
            format: format_name.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refresh_sink::NullRefreshSink;
    use metamorph_kv::LocalKv;
    use metamorph_storage::LocalStore;
    use tempfile::TempDir;

    fn config() -> CacheEngineConfig {
        CacheEngineConfig {
            endpoint: "https://cdn.example.com/".to_string(),
            min_max_age_secs: 300,
            version: 1,
        }
    }

    fn engine(kv_dir: &TempDir, store_dir: &TempDir) -> CacheEngine {
        CacheEngine::new(
            Arc::new(LocalKv::new(kv_dir.path())),
            Some(Arc::new(LocalStore::new(store_dir.path()))),
            Arc::new(NullRefreshSink),
            config(),
        )
    }

    #[tokio::test]
    async fn lookup_on_empty_cache_returns_none() {
        let kv_dir = TempDir::new().unwrap();
        let store_dir = TempDir::new().unwrap();
        let engine = engine(&kv_dir, &store_dir);
        let hash = ConversionHash::of_url("https://example.com/a.png");

        let result = engine
            .lookup(&hash, ImageTarget::UASTC, VideoTarget::MP4, false, None)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn store_then_lookup_is_fresh_within_max_age() {
        let kv_dir = TempDir::new().unwrap();
        let store_dir = TempDir::new().unwrap();
        let engine = engine(&kv_dir, &store_dir);
        let hash = ConversionHash::of_url("https://example.com/a.png");

        let artifact_dir = TempDir::new().unwrap();
        let artifact_path = artifact_dir.path().join("out.ktx2");
        tokio::fs::write(&artifact_path, b"fake ktx2 bytes").await.unwrap();

        engine
            .store(&hash, "uastc", MediaClass::StaticImage, None, Some(3600), &artifact_path)
            .await
            .unwrap();

        let result = engine
            .lookup(&hash, ImageTarget::UASTC, VideoTarget::MP4, false, None)
            .await
            .unwrap()
            .expect("record present");

        assert!(!result.expired);
        assert!(!result.converting);
        assert_eq!(result.format, "uastc");
        assert!(result.url.starts_with("https://cdn.example.com/"));
        assert!(result.url.ends_with(".ktx2"));
    }

    #[tokio::test]
    async fn store_without_max_age_or_etag_caches_indefinitely() {
        let kv_dir = TempDir::new().unwrap();
        let store_dir = TempDir::new().unwrap();
        let engine = engine(&kv_dir, &store_dir);
        let hash = ConversionHash::of_url("https://example.com/b.mp4");

        let artifact_dir = TempDir::new().unwrap();
        let artifact_path = artifact_dir.path().join("out.mp4");
        tokio::fs::write(&artifact_path, b"fake mp4 bytes").await.unwrap();

        engine
            .store(&hash, "mp4", MediaClass::MotionVideo, None, None, &artifact_path)
            .await
            .unwrap();

        let result = engine
            .lookup(&hash, ImageTarget::UASTC, VideoTarget::MP4, false, None)
            .await
            .unwrap()
            .expect("record present");
        assert!(!result.expired);
    }

    #[tokio::test]
    async fn store_rejects_unsupported_extension() {
        let kv_dir = TempDir::new().unwrap();
        let store_dir = TempDir::new().unwrap();
        let engine = engine(&kv_dir, &store_dir);
        let hash = ConversionHash::of_url("https://example.com/c.bin");

        let artifact_dir = TempDir::new().unwrap();
        let artifact_path = artifact_dir.path().join("out.bin");
        tokio::fs::write(&artifact_path, b"junk").await.unwrap();

        let err = engine
            .store(&hash, "uastc", MediaClass::StaticImage, None, None, &artifact_path)
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::UnsupportedExtension(_)));
    }

    #[tokio::test]
    async fn store_without_object_store_fails_not_configured() {
        let kv_dir = TempDir::new().unwrap();
        let engine = CacheEngine::new(
            Arc::new(LocalKv::new(kv_dir.path())),
            None,
            Arc::new(NullRefreshSink),
            config(),
        );
        let hash = ConversionHash::of_url("https://example.com/d.png");
        let artifact_dir = TempDir::new().unwrap();
        let artifact_path = artifact_dir.path().join("out.ktx2");
        tokio::fs::write(&artifact_path, b"bytes").await.unwrap();

        let err = engine
            .store(&hash, "uastc", MediaClass::StaticImage, None, None, &artifact_path)
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn revalidate_on_absent_record_returns_false() {
        let kv_dir = TempDir::new().unwrap();
        let store_dir = TempDir::new().unwrap();
        let engine = engine(&kv_dir, &store_dir);
        let hash = ConversionHash::of_url("https://example.com/e.png");
        let (_tx, rx) = watch::channel(false);

        let ok = engine
            .revalidate(&hash, "https://example.com/e.png", ImageTarget::UASTC, VideoTarget::MP4, false, rx.clone())
            .await
            .unwrap();
        assert!(!ok);
        drop(rx);
    }

    #[tokio::test]
    async fn revalidate_on_fresh_record_short_circuits_true() {
        let kv_dir = TempDir::new().unwrap();
        let store_dir = TempDir::new().unwrap();
        let engine = engine(&kv_dir, &store_dir);
        let hash = ConversionHash::of_url("https://example.com/f.png");

        let artifact_dir = TempDir::new().unwrap();
        let artifact_path = artifact_dir.path().join("out.ktx2");
        tokio::fs::write(&artifact_path, b"bytes").await.unwrap();
        engine
            .store(&hash, "uastc", MediaClass::StaticImage, None, Some(3600), &artifact_path)
            .await
            .unwrap();

        let (_tx, rx) = watch::channel(false);
        let ok = engine
            .revalidate(&hash, "https://example.com/f.png", ImageTarget::UASTC, VideoTarget::MP4, false, rx)
            .await
            .unwrap();
        assert!(ok);
    }

    #[tokio::test]
    async fn revalidate_restamps_freshness_on_304_and_is_idempotent() {
        use wiremock::matchers::{header, method};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(header("if-none-match", "\"abc\""))
            .respond_with(ResponseTemplate::new(304).insert_header("cache-control", "max-age=60"))
            .mount(&server)
            .await;

        let kv_dir = TempDir::new().unwrap();
        let store_dir = TempDir::new().unwrap();
        let engine = engine(&kv_dir, &store_dir);
        let url = format!("{}/a.png", server.uri());
        let hash = ConversionHash::of_url(&url);

        // Write the cache record directly through the KV layer with a
        // freshness marker that has already expired, bypassing the
        // sanitizer's 300s floor so the test doesn't need to sleep for
        // minutes to exercise the real HEAD round trip.
        let kv = LocalKv::new(kv_dir.path());
        let keys = CacheKeys::new(hash.clone(), "uastc", 1);
        kv.set(&keys.object_key(), "old-key.ktx2").await.unwrap();
        kv.set(&keys.etag_key(), "\"abc\"").await.unwrap();
        kv.set(&keys.filetype_key(), "Image").await.unwrap();
        kv.set_ex(&keys.valid_key(), "1", 0).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

        let (_tx, rx) = watch::channel(false);
        let first = engine
            .revalidate(&hash, &url, ImageTarget::UASTC, VideoTarget::MP4, false, rx.clone())
            .await
            .unwrap();
        assert!(first);

        // Sanitizer floors min_max_age to 300s in `config()`, so the
        // freshness marker written above is not yet expired; calling
        // revalidate again short-circuits via the `!expired` branch and
        // still returns true.
        let second = engine
            .revalidate(&hash, &url, ImageTarget::UASTC, VideoTarget::MP4, false, rx)
            .await
            .unwrap();
        assert!(second);
    }

    #[test]
    fn parses_max_age_directive() {
        assert_eq!(parse_cache_control_max_age("max-age=3600"), Some(3600));
        assert_eq!(parse_cache_control_max_age("public, max-age=60"), Some(60));
        assert_eq!(parse_cache_control_max_age("no-cache"), Some(0));
        assert_eq!(parse_cache_control_max_age("private"), None);
    }
}
