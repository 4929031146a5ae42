//! In-process refresh pipeline: [`CacheEngine::lookup`] submits a
//! [`RefreshRequest`] here via the [`RefreshSink`] trait whenever it
//! returns a stale-but-present or force-refreshed record; a single consumer
//! task revalidates and, on a cache miss, re-enqueues the conversion.
//!
//! Construction is split in two: [`RefreshPipeline::new`] builds the
//! sink half (no dependency on [`CacheEngine`]) so it can be handed to
//! `CacheEngine::new` before the engine exists; the caller then spawns
//! [`RefreshPipeline::run`] with the engine once it's built, breaking what
//! would otherwise be a construction cycle.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use metamorph_cache::{CacheEngine, RefreshSink};
use metamorph_models::{ConversionJob, RefreshRequest};
use metamorph_queue::ConversionQueue;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::config::RefreshConfig;

/// Submits deduplicated [`RefreshRequest`]s to a single background consumer.
/// A request already queued (tracked in `pending`) is dropped rather than
/// queued twice — concurrent lookups for the same conversion collapse into
/// one revalidation, same as the in-flight KV marker does for conversions.
pub struct RefreshPipeline {
    tx: mpsc::UnboundedSender<RefreshRequest>,
    pending: Mutex<HashSet<RefreshRequest>>,
}

impl RefreshPipeline {
    /// Builds the submission half. The returned receiver must be handed to
    /// [`Self::run`] for requests to actually be processed.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<RefreshRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                tx,
                pending: Mutex::new(HashSet::new()),
            }),
            rx,
        )
    }

    /// The single long-running consumer loop. Runs until `cancel` fires,
    /// then drains whatever arrived after that under a soft deadline.
    pub async fn run(
        self: Arc<Self>,
        mut rx: mpsc::UnboundedReceiver<RefreshRequest>,
        cache: Arc<CacheEngine>,
        queue: Arc<ConversionQueue>,
        config: RefreshConfig,
        mut cancel: watch::Receiver<bool>,
    ) {
        loop {
            let req = tokio::select! {
                biased;
                _ = cancel.changed() => break,
                req = rx.recv() => match req {
                    Some(req) => req,
                    None => break,
                },
            };

            self.pending.lock().unwrap().remove(&req);

            let fresh = cache
                .revalidate(
                    &req.hash,
                    &req.url,
                    req.image_target,
                    req.video_target,
                    req.force,
                    cancel.clone(),
                )
                .await;

            match fresh {
                Ok(true) => debug!(%req.hash, "revalidation confirmed freshness"),
                Ok(false) => {
                    let job = ConversionJob::new(req.url.clone(), req.image_target, req.video_target);
                    if let Err(e) = queue.enqueue(job).await {
                        warn!(%req.hash, error = %e, "failed to re-enqueue stale conversion");
                    }
                }
                Err(e) => warn!(%req.hash, error = %e, "revalidation failed"),
            }
        }

        // Drain whatever arrived after cancellation under a soft deadline,
        // best-effort: these are optimizations, not correctness-critical.
        let _ = tokio::time::timeout(config.shutdown_drain_deadline, async {
            while rx.recv().await.is_some() {}
        })
        .await;
    }
}

#[async_trait]
impl RefreshSink for RefreshPipeline {
    async fn submit(&self, req: RefreshRequest) {
        let mut pending = self.pending.lock().unwrap();
        if pending.contains(&req) {
            return;
        }
        pending.insert(req.clone());
        drop(pending);

        if self.tx.send(req.clone()).is_err() {
            self.pending.lock().unwrap().remove(&req);
        }
    }
}
