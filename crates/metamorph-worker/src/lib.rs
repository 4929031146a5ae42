//! Conversion worker pool, refresh pipeline, and waiter service: the
//! collaborators that turn a cache miss into a stored artifact. Exposed as
//! a library so `metamorph-api` can host the refresh pipeline and waiter
//! service in-process alongside the cache, while this crate's own binary
//! only drains the conversion queue.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod pool;
pub mod refresh;
pub mod waiter;

pub use config::{RefreshConfig, WaiterConfig, WorkerConfig};
pub use error::{WorkerError, WorkerResult};
pub use pipeline::ConversionPipeline;
pub use pool::WorkerPool;
pub use refresh::RefreshPipeline;
pub use waiter::WaiterService;
