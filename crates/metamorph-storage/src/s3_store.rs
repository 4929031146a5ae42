use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::store::Store;

/// Configuration for the S3-compatible object store client.
#[derive(Debug, Clone)]
pub struct S3StoreConfig {
    pub endpoint_url: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket_name: String,
    pub region: String,
    /// Public (typically CDN-fronted) host used to build artifact URLs.
    pub cdn_host: String,
}

impl S3StoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("OS_ENDPOINT_URL")
                .map_err(|_| StorageError::config_error("OS_ENDPOINT_URL not set"))?,
            access_key_id: std::env::var("OS_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("OS_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("OS_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("OS_SECRET_ACCESS_KEY not set"))?,
            bucket_name: std::env::var("OS_BUCKET_NAME")
                .map_err(|_| StorageError::config_error("OS_BUCKET_NAME not set"))?,
            region: std::env::var("OS_REGION").unwrap_or_else(|_| "auto".to_string()),
            cdn_host: std::env::var("OS_CDN_HOST")
                .map_err(|_| StorageError::config_error("OS_CDN_HOST not set"))?,
        })
    }
}

/// S3-API-compatible object storage client (Cloudflare R2, MinIO, or any
/// other `put_object`/`head_object`-speaking backend).
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
    cdn_host: String,
}

impl S3Store {
    pub async fn new(config: S3StoreConfig) -> StorageResult<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "metamorph",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket_name,
            cdn_host: config.cdn_host,
        })
    }

    pub async fn from_env() -> StorageResult<Self> {
        Self::new(S3StoreConfig::from_env()?).await
    }

    /// Head-bucket connectivity check for the readiness probe.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("connectivity check failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl Store for S3Store {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<()> {
        debug!(key, bytes = bytes.len(), "uploading object");

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!(key, "uploaded object");
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self.client.head_object().bucket(&self.bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("NotFound") || msg.contains("NoSuchKey") {
                    Ok(false)
                } else {
                    Err(StorageError::Backend(msg))
                }
            }
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://{}/{}", self.cdn_host, key)
    }
}
