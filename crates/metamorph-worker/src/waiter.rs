//! Waiter service: the convert endpoint calls [`WaiterService::wait`]
//! after enqueueing a conversion with no cached hit. Concurrent callers for
//! the same `(hash, image_target, video_target)` share a single polling
//! task rather than each hammering the cache with their own poll loop.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use metamorph_cache::{CacheEngine, CacheRecord};
use metamorph_models::{ConversionHash, ConversionIdentity, ImageTarget, VideoTarget};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

use crate::config::WaiterConfig;

/// Polls the cache until a conversion becomes available or the wait times
/// out. One background task per in-flight identity; additional callers for
/// the same identity subscribe to the same `watch` channel instead of
/// starting their own poll loop.
pub struct WaiterService {
    cache: Arc<CacheEngine>,
    config: WaiterConfig,
    inflight: Arc<Mutex<HashMap<ConversionIdentity, watch::Receiver<Option<CacheRecord>>>>>,
}

impl WaiterService {
    pub fn new(cache: Arc<CacheEngine>, config: WaiterConfig) -> Self {
        Self {
            cache,
            config,
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Waits for a conversion to become ready, returning the cache record
    /// once non-null or `None` once `WaitTimeout` elapses.
    pub async fn wait(&self, hash: &ConversionHash, image_target: ImageTarget, video_target: VideoTarget) -> Option<CacheRecord> {
        let identity = ConversionIdentity {
            hash: hash.clone(),
            image_target,
            video_target,
        };

        let mut rx = {
            let mut inflight = self.inflight.lock().unwrap();
            if let Some(rx) = inflight.get(&identity) {
                rx.clone()
            } else {
                let rx = self.spawn_poller(identity.clone());
                inflight.insert(identity.clone(), rx.clone());
                rx
            }
        };

        let deadline = Instant::now() + self.config.wait_timeout;
        loop {
            if let Some(record) = rx.borrow().clone() {
                return Some(record);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            tokio::select! {
                _ = tokio::time::sleep(remaining) => return None,
                changed = rx.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                }
            }
        }
    }

    fn spawn_poller(&self, identity: ConversionIdentity) -> watch::Receiver<Option<CacheRecord>> {
        let (tx, rx) = watch::channel(None);
        let cache = Arc::clone(&self.cache);
        let inflight = Arc::clone(&self.inflight);
        let poll_interval = self.config.poll_interval;
        let wait_timeout = self.config.wait_timeout;

        tokio::spawn(async move {
            let deadline = Instant::now() + wait_timeout;
            loop {
                let found = cache
                    .lookup(&identity.hash, identity.image_target, identity.video_target, false, None)
                    .await
                    .ok()
                    .flatten();

                if let Some(record) = found {
                    let _ = tx.send(Some(record));
                    break;
                }
                if Instant::now() >= deadline {
                    break;
                }
                tokio::time::sleep(poll_interval).await;
            }
            inflight.lock().unwrap().remove(&identity);
            debug!(%identity, "waiter poller finished");
        });

        rx
    }
}
