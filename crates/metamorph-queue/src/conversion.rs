use std::sync::Arc;

use metamorph_kv::Kv;
use metamorph_models::{in_flight_key, ConversionIdentity, ConversionJob, CACHE_KEY_VERSION, IN_FLIGHT_TTL_SECS};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::backend::QueueBackend;
use crate::error::{QueueError, QueueResult};

/// Single-flight enqueue of conversion jobs with at-least-once delivery to
/// workers. Dedupe is performed against the in-flight KV marker; when no KV
/// is wired (pure single-node dev mode) every `enqueue` call pushes a
/// message, since there is only one worker pool to race against.
pub struct ConversionQueue {
    backend: Arc<dyn QueueBackend>,
    kv: Option<Arc<dyn Kv>>,
    version: u32,
}

impl ConversionQueue {
    pub fn new(backend: Arc<dyn QueueBackend>, kv: Option<Arc<dyn Kv>>) -> Self {
        Self {
            backend,
            kv,
            version: CACHE_KEY_VERSION,
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Enqueue a conversion job, deduped via the in-flight marker. If the
    /// marker is already held, this logs and returns without enqueueing.
    pub async fn enqueue(&self, job: ConversionJob) -> QueueResult<()> {
        let identity = ConversionIdentity {
            hash: job.hash.clone(),
            image_target: job.image_target,
            video_target: job.video_target,
        };

        if let Some(kv) = &self.kv {
            let key = in_flight_key(&identity, self.version);
            let acquired = kv.set_nx_ex(&key, "1", IN_FLIGHT_TTL_SECS).await?;
            if !acquired {
                debug!(%identity, "conversion already in flight, skipping enqueue");
                return Ok(());
            }
        }

        let payload = serde_json::to_string(&job)?;
        self.backend.push(payload).await?;
        debug!(%identity, "enqueued conversion job");
        Ok(())
    }

    /// Block until a job is available or `cancel` fires. The underlying
    /// transport has already deleted the message by the time this returns —
    /// a crash between delete and processing loses the job, bounded by the
    /// in-flight marker's TTL, in exchange for not tracking visibility
    /// timeouts.
    pub async fn dequeue(&self, cancel: &mut watch::Receiver<bool>) -> QueueResult<Option<ConversionJob>> {
        let Some(payload) = self.backend.pop(cancel).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<ConversionJob>(&payload) {
            Ok(job) => Ok(Some(job)),
            Err(e) => {
                warn!(error = %e, payload, "dropping malformed conversion job");
                Err(QueueError::MalformedJob(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local_queue::InProcessQueue;
    use metamorph_kv::LocalKv;
    use metamorph_models::{ImageTarget, VideoTarget};
    use tempfile::TempDir;

    fn job() -> ConversionJob {
        ConversionJob::new("https://example.com/a.png", ImageTarget::UASTC, VideoTarget::MP4)
    }

    #[tokio::test]
    async fn enqueue_then_dequeue_round_trips_without_kv() {
        let queue = ConversionQueue::new(Arc::new(InProcessQueue::new()), None);
        queue.enqueue(job()).await.unwrap();

        let (_tx, mut rx) = watch::channel(false);
        let dequeued = queue.dequeue(&mut rx).await.unwrap().unwrap();
        assert_eq!(dequeued, job());
    }

    #[tokio::test]
    async fn concurrent_enqueues_with_kv_produce_exactly_one_message() {
        let kv_dir = TempDir::new().unwrap();
        let kv: Arc<dyn Kv> = Arc::new(LocalKv::new(kv_dir.path()));
        let backend = Arc::new(InProcessQueue::new());
        let queue = Arc::new(ConversionQueue::new(backend, Some(kv)));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let queue = Arc::clone(&queue);
            handles.push(tokio::spawn(async move { queue.enqueue(job()).await.unwrap() }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let (_tx, mut rx) = watch::channel(false);
        let first = queue.dequeue(&mut rx).await.unwrap();
        assert!(first.is_some());

        // No second message should have been pushed.
        let mut rx2 = rx.clone();
        tokio::select! {
            _ = tokio::time::sleep(std::time::Duration::from_millis(50)) => {}
            _ = queue.dequeue(&mut rx2) => panic!("unexpected second message"),
        }
    }

    #[tokio::test]
    async fn same_url_different_formats_both_enqueue() {
        let kv_dir = TempDir::new().unwrap();
        let kv: Arc<dyn Kv> = Arc::new(LocalKv::new(kv_dir.path()));
        let backend = Arc::new(InProcessQueue::new());
        let queue = ConversionQueue::new(backend, Some(kv));

        let a = ConversionJob::new("https://example.com/a.png", ImageTarget::UASTC, VideoTarget::MP4);
        let b = ConversionJob::new("https://example.com/a.png", ImageTarget::ASTC, VideoTarget::OGV);
        queue.enqueue(a.clone()).await.unwrap();
        queue.enqueue(b.clone()).await.unwrap();

        let (_tx, mut rx) = watch::channel(false);
        let first = queue.dequeue(&mut rx).await.unwrap().unwrap();
        let second = queue.dequeue(&mut rx).await.unwrap().unwrap();
        assert_ne!(first, second);
        assert!([&first, &second].contains(&&a) && [&first, &second].contains(&&b));
    }

    #[tokio::test]
    async fn malformed_payload_is_reported_without_blocking_the_queue() {
        let backend = Arc::new(InProcessQueue::new());
        backend.push("not json".to_string()).await.unwrap();
        let queue = ConversionQueue::new(backend, None);

        let (_tx, mut rx) = watch::channel(false);
        let err = queue.dequeue(&mut rx).await.unwrap_err();
        assert!(matches!(err, QueueError::MalformedJob(_)));
    }
}
