//! Worker pool, refresh pipeline, and waiter configuration.

use std::time::Duration;

/// Worker pool configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of concurrent worker loops.
    pub worker_count: usize,
    /// Root scratch directory; each job gets a subdirectory named by hash.
    /// Cleared on startup — the service assumes no other process shares it.
    pub work_dir: String,
    /// Hard byte cap on a downloaded source file.
    pub max_download_bytes: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_count: 5,
            work_dir: "/tmp/metamorph".to_string(),
            max_download_bytes: metamorph_media::DEFAULT_MAX_DOWNLOAD_BYTES,
        }
    }
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            worker_count: std::env::var("WORKER_COUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.worker_count),
            work_dir: std::env::var("WORKER_WORK_DIR").unwrap_or(defaults.work_dir),
            max_download_bytes: std::env::var("MAX_DOWNLOAD_SIZE_MB")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(|mb| mb * 1024 * 1024)
                .unwrap_or(defaults.max_download_bytes),
        }
    }
}

/// Waiter service configuration.
#[derive(Debug, Clone, Copy)]
pub struct WaiterConfig {
    pub poll_interval: Duration,
    pub wait_timeout: Duration,
}

impl Default for WaiterConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            wait_timeout: Duration::from_secs(20),
        }
    }
}

impl WaiterConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            poll_interval: std::env::var("WAITER_POLL_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            wait_timeout: std::env::var("WAITER_WAIT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.wait_timeout),
        }
    }
}

/// Refresh pipeline configuration.
#[derive(Debug, Clone, Copy)]
pub struct RefreshConfig {
    /// Soft deadline the consumer drains remaining `pending` items under
    /// during shutdown; undrained items are dropped.
    pub shutdown_drain_deadline: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            shutdown_drain_deadline: Duration::from_secs(5),
        }
    }
}

impl RefreshConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            shutdown_drain_deadline: std::env::var("REFRESH_SHUTDOWN_DRAIN_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_drain_deadline),
        }
    }
}
