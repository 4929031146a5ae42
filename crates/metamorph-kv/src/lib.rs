//! Key-value abstraction used by the cache engine, conversion queue
//! façade, and refresh pipeline: `Get`/`MGet`/`Set`/`SetEx`/`SetNxEx`.

pub mod error;
pub mod kv;
pub mod local_kv;
pub mod redis_kv;

pub use error::{KvError, KvResult};
pub use kv::Kv;
pub use local_kv::LocalKv;
pub use redis_kv::{RedisKv, RedisKvConfig};
