//! Conversion worker binary: drains the conversion queue and runs the
//! per-job pipeline. Backend selection (Redis/S3 vs local filesystem)
//! mirrors `metamorph-api`'s so both processes agree on where state lives
//! in a given deployment.

use std::sync::Arc;

use metamorph_cache::{CacheEngine, CacheEngineConfig, NullRefreshSink};
use metamorph_kv::{Kv, LocalKv, RedisKv};
use metamorph_queue::{ConversionQueue, InProcessQueue, QueueBackend, RedisStreamQueue};
use metamorph_storage::{LocalStore, S3Store, Store};
use metamorph_worker::{WorkerConfig, WorkerPool};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// `METAMORPH_BACKEND=redis` selects Redis/Redis-Streams/S3; anything else
/// (including unset) runs entirely against the local filesystem as a
/// pure single-node, no-KV fallback.
fn backend_is_redis() -> bool {
    std::env::var("METAMORPH_BACKEND")
        .map(|v| v.eq_ignore_ascii_case("redis"))
        .unwrap_or(false)
}

#[tokio::main]
async fn main() {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("failed to install rustls crypto provider");

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::from_default_env().add_directive("metamorph=info".parse().unwrap()))
        .init();

    info!("starting metamorph-worker");

    let config = WorkerConfig::from_env();
    info!(?config, "worker config loaded");

    let redis = backend_is_redis();

    let kv: Option<Arc<dyn Kv>> = if redis {
        match RedisKv::from_env() {
            Ok(kv) => Some(Arc::new(kv)),
            Err(e) => {
                error!(error = %e, "failed to construct redis kv client");
                std::process::exit(1);
            }
        }
    } else {
        Some(Arc::new(LocalKv::new(
            std::env::var("LOCAL_KV_DIR").unwrap_or_else(|_| "/tmp/metamorph-kv".to_string()),
        )))
    };
    let kv = kv.expect("kv backend is always constructed above");

    let store: Arc<dyn Store> = if redis {
        match S3Store::from_env().await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                error!(error = %e, "failed to construct s3 store client");
                std::process::exit(1);
            }
        }
    } else {
        Arc::new(LocalStore::new(
            std::env::var("LOCAL_STORE_DIR").unwrap_or_else(|_| "/tmp/metamorph-store".to_string()),
        ))
    };

    let queue_backend: Arc<dyn QueueBackend> = if redis {
        match RedisStreamQueue::from_env() {
            Ok(backend) => {
                if let Err(e) = backend.init().await {
                    error!(error = %e, "failed to initialize redis stream consumer group");
                    std::process::exit(1);
                }
                Arc::new(backend)
            }
            Err(e) => {
                error!(error = %e, "failed to construct redis stream queue");
                std::process::exit(1);
            }
        }
    } else {
        Arc::new(InProcessQueue::new())
    };

    let cache_config = match CacheEngineConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to load cache engine config");
            std::process::exit(1);
        }
    };
    let cache = Arc::new(CacheEngine::new(Arc::clone(&kv), Some(store), Arc::new(NullRefreshSink), cache_config));
    let queue = Arc::new(ConversionQueue::new(queue_backend, Some(kv)));

    let pool = match WorkerPool::new(config, queue, cache).await {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, "failed to initialize worker pool");
            std::process::exit(1);
        }
    };

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let shutdown = tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal");
        let _ = cancel_tx.send(true);
    });

    pool.run(cancel_rx).await;
    shutdown.await.ok();

    info!("metamorph-worker shutdown complete");
}
