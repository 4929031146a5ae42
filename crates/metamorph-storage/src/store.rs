use async_trait::async_trait;

use crate::error::StorageResult;

/// The object-storage operations the cache engine needs: upload a
/// converted artifact by key, and check whether a key already has one.
/// Two implementations exist: [`crate::s3_store::S3Store`] for
/// production (S3-API-compatible, e.g. Cloudflare R2 or MinIO) and
/// [`crate::local_store::LocalStore`] for single-node/dev use.
#[async_trait]
pub trait Store: Send + Sync {
    /// Upload `bytes` under `key` with the given content type.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<()>;

    /// Whether an object exists under `key`.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// A URL clients can fetch the object from directly (CDN-fronted in
    /// production, a local `file://`-adjacent path in dev).
    fn public_url(&self, key: &str) -> String;
}
