//! Convert-endpoint API server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use metamorph_api::{create_router, metrics, ApiConfig, AppState};
use metamorph_cache::{CacheEngine, CacheEngineConfig};
use metamorph_kv::{Kv, LocalKv, RedisKv};
use metamorph_queue::{ConversionQueue, InProcessQueue, QueueBackend, RedisStreamQueue};
use metamorph_storage::{LocalStore, S3Store, Store};
use metamorph_worker::{RefreshConfig, RefreshPipeline, WaiterConfig, WaiterService};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn backend_is_redis() -> bool {
    std::env::var("METAMORPH_BACKEND").map(|v| v.eq_ignore_ascii_case("redis")).unwrap_or(false)
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("failed to install rustls crypto provider");

    let use_json = std::env::var("LOG_FORMAT").map(|v| v.eq_ignore_ascii_case("json")).unwrap_or(false);
    let env_filter = EnvFilter::from_default_env().add_directive("metamorph=info".parse().unwrap());
    if use_json {
        tracing_subscriber::registry().with(fmt::layer().json()).with(env_filter).init();
    } else {
        tracing_subscriber::registry().with(fmt::layer().with_ansi(true)).with(env_filter).init();
    }

    info!("starting metamorph-api");

    let config = ApiConfig::from_env();
    info!(host = %config.host, port = config.port, "api config loaded");

    let redis = backend_is_redis();

    let kv: Arc<dyn Kv> = if redis {
        match RedisKv::from_env() {
            Ok(kv) => Arc::new(kv),
            Err(e) => {
                error!(error = %e, "failed to construct redis kv client");
                std::process::exit(1);
            }
        }
    } else {
        Arc::new(LocalKv::new(std::env::var("LOCAL_KV_DIR").unwrap_or_else(|_| "/tmp/metamorph-kv".to_string())))
    };

    let store: Arc<dyn Store> = if redis {
        match S3Store::from_env().await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                error!(error = %e, "failed to construct s3 store client");
                std::process::exit(1);
            }
        }
    } else {
        Arc::new(LocalStore::new(std::env::var("LOCAL_STORE_DIR").unwrap_or_else(|_| "/tmp/metamorph-store".to_string())))
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

    // `RefreshPipeline` is constructed in two steps to avoid a cycle with
    // `CacheEngine` (the sink half has no dependency on the engine; the
    // consumer half is spawned once the engine exists). See refresh.rs.
    let (refresh_sink, refresh_rx) = RefreshPipeline::new();
    let cache = Arc::new(CacheEngine::new(Arc::clone(&kv), Some(store), refresh_sink.clone(), cache_config));
    let queue = Arc::new(ConversionQueue::new(queue_backend, Some(kv)));
    let waiter = Arc::new(WaiterService::new(Arc::clone(&cache), WaiterConfig::from_env()));

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let refresh_handle = tokio::spawn(refresh_sink.run(refresh_rx, Arc::clone(&cache), Arc::clone(&queue), RefreshConfig::from_env(), cancel_rx));

    let state = AppState { config: config.clone(), cache, queue, waiter };

    let metrics_enabled = std::env::var("METRICS_ENABLED").map(|v| v == "true" || v == "1").unwrap_or(true);
    let metrics_handle = if metrics_enabled {
        info!("prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics())
    } else {
        None
    };

    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse().expect("invalid bind address");
    info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("received shutdown signal");
            let _ = cancel_tx.send(true);
        })
        .await
        .unwrap();

    refresh_handle.await.ok();
    info!("metamorph-api shutdown complete");
}
