use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors a single conversion job can fail with. Every variant here is
/// logged and the job abandoned — no variant is retried within the same
/// job; the in-flight marker TTL is the recovery mechanism.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Media(#[from] metamorph_media::MediaError),

    #[error(transparent)]
    Cache(#[from] metamorph_cache::CacheError),

    #[error(transparent)]
    Queue(#[from] metamorph_queue::QueueError),

    #[error("no conversion pipeline for media class {0}")]
    UnsupportedMediaClass(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
