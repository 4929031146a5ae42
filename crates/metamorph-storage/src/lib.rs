//! Object storage abstraction for cached conversion artifacts.

pub mod error;
pub mod local_store;
pub mod s3_store;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use local_store::LocalStore;
pub use s3_store::{S3Store, S3StoreConfig};
pub use store::Store;
