//! Worker pool: `N` concurrent consumers draining the conversion queue.
//! Each consumer is a single-threaded pipeline; workers share no mutable
//! state other than through the KV/OS/WQ collaborators.

use std::path::PathBuf;
use std::sync::Arc;

use metamorph_cache::CacheEngine;
use metamorph_media::Downloader;
use metamorph_queue::ConversionQueue;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::WorkerConfig;
use crate::pipeline::ConversionPipeline;

/// Long-running pool of worker loops. Construction clears `work_dir`,
/// assuming no other process shares it.
pub struct WorkerPool {
    config: WorkerConfig,
    queue: Arc<ConversionQueue>,
    cache: Arc<CacheEngine>,
    downloader: Arc<Downloader>,
}

impl WorkerPool {
    pub async fn new(config: WorkerConfig, queue: Arc<ConversionQueue>, cache: Arc<CacheEngine>) -> std::io::Result<Self> {
        let _ = tokio::fs::remove_dir_all(&config.work_dir).await;
        tokio::fs::create_dir_all(&config.work_dir).await?;

        let downloader = Arc::new(Downloader::new(config.max_download_bytes));
        Ok(Self {
            config,
            queue,
            cache,
            downloader,
        })
    }

    /// Spawns `worker_count` consumer loops and waits for `cancel` to fire
    /// before returning. Each loop finishes its current job (or a pending
    /// `Dequeue`, which returns promptly) before observing cancellation.
    pub async fn run(&self, cancel: watch::Receiver<bool>) {
        let mut handles = Vec::with_capacity(self.config.worker_count);
        for index in 0..self.config.worker_count {
            let queue = Arc::clone(&self.queue);
            let cache = Arc::clone(&self.cache);
            let downloader = Arc::clone(&self.downloader);
            let work_dir = PathBuf::from(&self.config.work_dir);
            let mut worker_cancel = cancel.clone();

            handles.push(tokio::spawn(async move {
                info!(worker = index, "worker loop started");
                loop {
                    let job = match queue.dequeue(&mut worker_cancel).await {
                        Ok(Some(job)) => job,
                        Ok(None) => break,
                        Err(e) => {
                            warn!(worker = index, error = %e, "dequeue failed, retrying");
                            continue;
                        }
                    };

                    let job_dir = work_dir.join(job.hash.as_str());
                    if let Err(e) = tokio::fs::create_dir_all(&job_dir).await {
                        error!(worker = index, %job.hash, error = %e, "failed to create job scratch dir");
                        continue;
                    }

                    let pipeline = ConversionPipeline::new(&downloader, &cache);
                    let result = pipeline.run(&job, &job_dir, worker_cancel.clone()).await;
                    metamorph_media::remove_dir_best_effort(&job_dir).await;

                    match result {
                        Ok(()) => info!(worker = index, %job.hash, "job done"),
                        Err(e) => warn!(worker = index, %job.hash, error = %e, "job failed, abandoning"),
                    }

                    if *worker_cancel.borrow() {
                        break;
                    }
                }
                info!(worker = index, "worker loop stopped");
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }
    }
}
