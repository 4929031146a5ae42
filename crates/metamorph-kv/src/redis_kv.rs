use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::debug;

use crate::error::{KvError, KvResult};
use crate::kv::Kv;

/// Configuration for the Redis-backed KV client.
#[derive(Debug, Clone)]
pub struct RedisKvConfig {
    pub redis_url: String,
}

impl Default for RedisKvConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
        }
    }
}

impl RedisKvConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("KV_REDIS_URL")
                .or_else(|_| std::env::var("REDIS_URL"))
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
        }
    }
}

/// Redis-backed implementation of [`Kv`].
pub struct RedisKv {
    client: redis::Client,
}

impl RedisKv {
    pub fn new(config: RedisKvConfig) -> KvResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client })
    }

    pub fn from_env() -> KvResult<Self> {
        Self::new(RedisKvConfig::from_env())
    }

    async fn conn(&self) -> KvResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| KvError::connection_failed(e.to_string()))
    }
}

#[async_trait]
impl Kv for RedisKv {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let mut conn = self.conn().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn mget(&self, keys: &[String]) -> KvResult<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn().await?;
        // MGET with a single key returns a bare value rather than an
        // array under some redis-rs type inference paths; route it
        // through GET to keep the single-key case simple and correct.
        if keys.len() == 1 {
            return Ok(vec![self.get(&keys[0]).await?]);
        }
        let values: Vec<Option<String>> = conn.mget(keys).await?;
        Ok(values)
    }

    async fn set(&self, key: &str, value: &str) -> KvResult<()> {
        let mut conn = self.conn().await?;
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn mset(&self, pairs: &[(String, String)]) -> KvResult<()> {
        if pairs.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn().await?;
        conn.mset::<_, _, ()>(pairs).await?;
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> KvResult<()> {
        let mut conn = self.conn().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl_secs).await?;
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> KvResult<bool> {
        let mut conn = self.conn().await?;
        let acquired: bool = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await
            .unwrap_or(false);

        if acquired {
            debug!(key, "set_nx_ex acquired");
        }
        Ok(acquired)
    }

    async fn delete(&self, key: &str) -> KvResult<()> {
        let mut conn = self.conn().await?;
        conn.del::<_, ()>(key).await?;
        Ok(())
    }
}
