use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::QueueResult;

/// The raw at-least-once FIFO-ish transport underneath the conversion
/// queue façade. Two implementations exist: [`crate::redis_queue::RedisStreamQueue`]
/// for production and [`crate::local_queue::InProcessQueue`] for single-node mode.
///
/// `pop` owns the "delete before returning" tradeoff: once a payload is
/// handed back here it has already been removed from the backend, so a
/// caller that crashes before finishing the job loses it (the in-flight
/// marker's TTL is the recovery window).
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Push a raw JSON payload onto the queue.
    async fn push(&self, payload: String) -> QueueResult<()>;

    /// Block until a payload is available or `cancel` fires, deleting the
    /// message from the backend before returning it. `None` means `cancel`
    /// fired while waiting.
    async fn pop(&self, cancel: &mut watch::Receiver<bool>) -> QueueResult<Option<String>>;
}
