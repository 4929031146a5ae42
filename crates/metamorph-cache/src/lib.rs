//! The conversion cache: combines the KV metadata store with the object
//! store into a versioned keyed cache with TTL'd freshness, revalidation
//! metadata, and in-flight markers.

pub mod engine;
pub mod error;
pub mod record;
pub mod refresh_sink;
pub mod sanitize;

pub use engine::{CacheEngine, CacheEngineConfig, DEFAULT_MIN_MAX_AGE_SECS};
pub use error::{CacheError, CacheResult};
pub use record::CacheRecord;
pub use refresh_sink::{NullRefreshSink, RefreshSink};
pub use sanitize::sanitize_max_age;
