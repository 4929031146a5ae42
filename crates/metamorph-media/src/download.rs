//! Streams a source URL to a scratch file on disk, enforcing a hard byte
//! cap and surfacing the response's cache metadata for the caller to hand
//! to the cache engine at store time.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::error::{MediaError, MediaResult};

/// Default cap on a single downloaded source file (256 MiB).
pub const DEFAULT_MAX_DOWNLOAD_BYTES: u64 = 256 * 1024 * 1024;

/// Outcome of a successful download: where the bytes landed, and whatever
/// cache metadata the origin offered.
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub path: PathBuf,
    pub etag: Option<String>,
    pub max_age: Option<u64>,
}

/// Parses a `max-age=N` directive out of a `Cache-Control` header value.
/// `no-cache` and `no-store` map to `max-age=0`, left for the cache layer's
/// own floor to sanitize back up.
fn parse_cache_control_max_age(value: &str) -> Option<u64> {
    if value.contains("no-cache") || value.contains("no-store") {
        return Some(0);
    }
    value.split(',').map(str::trim).find_map(|part| {
        let rest = part.strip_prefix("max-age=")?;
        rest.parse::<u64>().ok()
    })
}

pub struct Downloader {
    http: reqwest::Client,
    max_bytes: u64,
}

impl Downloader {
    pub fn new(max_bytes: u64) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .expect("downloader HTTP client");
        Self { http, max_bytes }
    }

    /// Streams `url` into `dest_dir` under a name derived from the
    /// conversion hash, returning the path plus ETag/max-age metadata.
    /// The partial file is removed if the byte cap is exceeded or the
    /// request otherwise fails mid-stream.
    pub async fn download(&self, url: &str, dest_dir: &Path, hash: &str) -> MediaResult<DownloadedFile> {
        tokio::fs::create_dir_all(dest_dir).await?;
        let dest_path = dest_dir.join(format!("{hash}-source"));

        let response = self.http.get(url).send().await?;
        let response = response
            .error_for_status()
            .map_err(|e| MediaError::download_failed(e.to_string()))?;

        if let Some(content_length) = response.content_length() {
            if content_length > self.max_bytes {
                return Err(MediaError::DownloadTooLarge(self.max_bytes));
            }
        }

        let etag = response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let max_age = response
            .headers()
            .get(reqwest::header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_cache_control_max_age);

        let mut file = File::create(&dest_path).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    let _ = tokio::fs::remove_file(&dest_path).await;
                    return Err(MediaError::from(e));
                }
            };
            written += chunk.len() as u64;
            if written > self.max_bytes {
                drop(file);
                let _ = tokio::fs::remove_file(&dest_path).await;
                return Err(MediaError::DownloadTooLarge(self.max_bytes));
            }
            if let Err(e) = file.write_all(&chunk).await {
                let _ = tokio::fs::remove_file(&dest_path).await;
                return Err(MediaError::from(e));
            }
        }
        file.flush().await?;

        Ok(DownloadedFile {
            path: dest_path,
            etag,
            max_age,
        })
    }
}

impl Default for Downloader {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DOWNLOAD_BYTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn download_writes_file_and_captures_etag_and_max_age() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("etag", "\"v1\"")
                    .insert_header("cache-control", "max-age=120")
                    .set_body_bytes(b"hello world".to_vec()),
            )
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let downloader = Downloader::new(1024);
        let result = downloader
            .download(&server.uri(), dir.path(), "abc123")
            .await
            .unwrap();

        assert_eq!(result.etag.as_deref(), Some("\"v1\""));
        assert_eq!(result.max_age, Some(120));
        assert_eq!(tokio::fs::read(&result.path).await.unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn download_over_content_length_cap_is_rejected_without_writing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 2048]))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let downloader = Downloader::new(1024);
        let err = downloader
            .download(&server.uri(), dir.path(), "bigfile")
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::DownloadTooLarge(1024)));
        assert!(!dir.path().join("bigfile-source").exists());
    }

    #[tokio::test]
    async fn download_no_cache_maps_to_zero_max_age() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("cache-control", "no-cache")
                    .set_body_bytes(b"x".to_vec()),
            )
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let downloader = Downloader::new(1024);
        let result = downloader
            .download(&server.uri(), dir.path(), "nc")
            .await
            .unwrap();
        assert_eq!(result.max_age, Some(0));
    }

    #[tokio::test]
    async fn download_on_http_error_status_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let downloader = Downloader::new(1024);
        let err = downloader.download(&server.uri(), dir.path(), "missing").await;
        assert!(err.is_err());
    }
}
