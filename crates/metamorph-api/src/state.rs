//! Application state shared across handlers.

use std::sync::Arc;

use metamorph_cache::CacheEngine;
use metamorph_queue::ConversionQueue;
use metamorph_worker::WaiterService;

use crate::config::ApiConfig;

/// Shared application state. The refresh pipeline is not held here: once
/// spawned by `main`, it is only ever reached through the `RefreshSink`
/// trait object wired into `cache`.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub cache: Arc<CacheEngine>,
    pub queue: Arc<ConversionQueue>,
    pub waiter: Arc<WaiterService>,
}
