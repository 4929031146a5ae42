//! The conversion work queue: a dedupe-on-enqueue façade (backed by the
//! KV in-flight marker) over an at-least-once FIFO-ish transport. Two
//! transports exist: [`redis_queue::RedisStreamQueue`] for production and
//! [`local_queue::InProcessQueue`] for single-node mode.

pub mod backend;
pub mod conversion;
pub mod error;
pub mod local_queue;
pub mod redis_queue;

pub use backend::QueueBackend;
pub use conversion::ConversionQueue;
pub use error::{QueueError, QueueResult};
pub use local_queue::InProcessQueue;
pub use redis_queue::{RedisStreamQueue, RedisStreamQueueConfig};
