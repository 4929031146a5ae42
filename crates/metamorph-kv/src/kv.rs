use async_trait::async_trait;

use crate::error::KvResult;

/// The raw key-value operations the cache engine, conversion queue
/// façade, and refresh pipeline are built on. Two implementations exist:
/// [`crate::redis_kv::RedisKv`] for production and
/// [`crate::local_kv::LocalKv`] for single-node/dev use.
#[async_trait]
pub trait Kv: Send + Sync {
    /// Fetch a single value. `None` if the key is absent or expired.
    async fn get(&self, key: &str) -> KvResult<Option<String>>;

    /// Fetch several values in one round trip. The result vector has the
    /// same length and order as `keys`.
    async fn mget(&self, keys: &[String]) -> KvResult<Vec<Option<String>>>;

    /// Set a value with no expiry.
    async fn set(&self, key: &str, value: &str) -> KvResult<()>;

    /// Set several values with no expiry in one round trip. Used where the
    /// cache engine needs several keys to become visible together (object
    /// key, media-class tag, entity tag).
    async fn mset(&self, pairs: &[(String, String)]) -> KvResult<()>;

    /// Set a value that expires after `ttl_secs` seconds.
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> KvResult<()>;

    /// Set a value only if the key doesn't already exist, with an expiry.
    /// Returns `true` if the value was set (i.e. the caller won the race).
    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> KvResult<bool>;

    /// Remove a key. A no-op if the key is absent.
    async fn delete(&self, key: &str) -> KvResult<()>;
}
