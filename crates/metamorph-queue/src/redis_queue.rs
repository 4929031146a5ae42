use async_trait::async_trait;
use redis::AsyncCommands;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::QueueBackend;
use crate::error::{QueueError, QueueResult};

/// Bounded long-poll wait for `XREADGROUP`, then loop and retry.
const BLOCK_MS: usize = 20_000;

/// Configuration for the Redis Streams conversion-job queue.
#[derive(Debug, Clone)]
pub struct RedisStreamQueueConfig {
    pub redis_url: String,
    pub stream_name: String,
    pub consumer_group: String,
}

impl RedisStreamQueueConfig {
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("KV_REDIS_URL")
                .or_else(|_| std::env::var("REDIS_URL"))
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            stream_name: std::env::var("QUEUE_STREAM")
                .unwrap_or_else(|_| "metamorph:conversions".to_string()),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or_else(|_| "metamorph:workers".to_string()),
        }
    }
}

/// Redis Streams-backed [`QueueBackend`]: `XADD` to enqueue, `XREADGROUP`
/// with a bounded `BLOCK` to long-poll, `XACK`+`XDEL` to delete before
/// handing the payload back to the caller.
pub struct RedisStreamQueue {
    client: redis::Client,
    stream_name: String,
    consumer_group: String,
    consumer_name: String,
}

impl RedisStreamQueue {
    pub fn new(config: RedisStreamQueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self {
            client,
            stream_name: config.stream_name,
            consumer_group: config.consumer_group,
            consumer_name: format!("worker-{}", Uuid::new_v4()),
        })
    }

    pub fn from_env() -> QueueResult<Self> {
        Self::new(RedisStreamQueueConfig::from_env())
    }

    /// Create the consumer group if it doesn't already exist.
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.stream_name)
            .arg(&self.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!(group = %self.consumer_group, "created consumer group"),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!(group = %self.consumer_group, "consumer group already exists");
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    async fn conn(&self) -> QueueResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::connection_failed(e.to_string()))
    }

    async fn read_once(&self) -> QueueResult<Option<(String, String)>> {
        let mut conn = self.conn().await?;

        let result: redis::streams::StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.consumer_group)
            .arg(&self.consumer_name)
            .arg("COUNT")
            .arg(1)
            .arg("BLOCK")
            .arg(BLOCK_MS)
            .arg("STREAMS")
            .arg(&self.stream_name)
            .arg(">")
            .query_async(&mut conn)
            .await?;

        for stream_key in result.keys {
            for entry in stream_key.ids {
                if let Some(redis::Value::BulkString(payload)) = entry.map.get("job") {
                    let payload = String::from_utf8_lossy(payload).to_string();
                    return Ok(Some((entry.id, payload)));
                }
            }
        }

        Ok(None)
    }

    async fn delete(&self, message_id: &str) -> QueueResult<()> {
        let mut conn = self.conn().await?;
        redis::cmd("XACK")
            .arg(&self.stream_name)
            .arg(&self.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;
        redis::cmd("XDEL")
            .arg(&self.stream_name)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl QueueBackend for RedisStreamQueue {
    async fn push(&self, payload: String) -> QueueResult<()> {
        let mut conn = self.conn().await?;
        let message_id: String = redis::cmd("XADD")
            .arg(&self.stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .query_async(&mut conn)
            .await?;
        debug!(message_id, "pushed conversion job");
        Ok(())
    }

    async fn pop(&self, cancel: &mut watch::Receiver<bool>) -> QueueResult<Option<String>> {
        loop {
            if *cancel.borrow() {
                return Ok(None);
            }

            tokio::select! {
                biased;
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        return Ok(None);
                    }
                }
                read = self.read_once() => {
                    match read? {
                        Some((message_id, payload)) => {
                            if let Err(e) = self.delete(&message_id).await {
                                warn!(message_id, error = %e, "failed to delete message after receive");
                            }
                            return Ok(Some(payload));
                        }
                        None => continue,
                    }
                }
            }
        }
    }
}
