use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue connection failed: {0}")]
    ConnectionFailed(String),

    #[error("queue message did not parse as a conversion job: {0}")]
    MalformedJob(String),

    #[error(transparent)]
    Kv(#[from] metamorph_kv::KvError),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueueError {
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::ConnectionFailed(msg.into())
    }
}
