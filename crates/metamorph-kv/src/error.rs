use thiserror::Error;

pub type KvResult<T> = Result<T, KvError>;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("KV connection failed: {0}")]
    ConnectionFailed(String),

    #[error("KV backend not configured: {0}")]
    NotConfigured(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl KvError {
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::ConnectionFailed(msg.into())
    }

    pub fn not_configured(msg: impl Into<String>) -> Self {
        Self::NotConfigured(msg.into())
    }
}
