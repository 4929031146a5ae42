use thiserror::Error;

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache engine requires a configured object store: {0}")]
    NotConfigured(String),

    #[error("unsupported file extension: {0}")]
    UnsupportedExtension(String),

    #[error(transparent)]
    Kv(#[from] metamorph_kv::KvError),

    #[error(transparent)]
    Storage(#[from] metamorph_storage::StorageError),

    #[error("local file error: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    pub fn not_configured(msg: impl Into<String>) -> Self {
        Self::NotConfigured(msg.into())
    }

    pub fn unsupported_extension(ext: impl Into<String>) -> Self {
        Self::UnsupportedExtension(ext.into())
    }
}
