use async_trait::async_trait;
use metamorph_models::RefreshRequest;

/// Where `Lookup` hands off a "this looks stale" hint. The cache engine
/// only needs to submit requests; the dedup/poll/revalidate machinery that
/// turns them into real work lives in the refresh pipeline (a separate
/// crate, to avoid a dependency cycle with the conversion queue).
#[async_trait]
pub trait RefreshSink: Send + Sync {
    async fn submit(&self, req: RefreshRequest);
}

/// A sink that drops every request. Useful where refresh is intentionally
/// disabled (tests, or a read-only cache inspection tool).
pub struct NullRefreshSink;

#[async_trait]
impl RefreshSink for NullRefreshSink {
    async fn submit(&self, _req: RefreshRequest) {}
}
