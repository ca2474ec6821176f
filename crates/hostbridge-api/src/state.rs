//! Application state.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use hostbridge_runloop::Bridge;

/// Application state shared across handlers.
pub struct AppState {
    pub bridge: Arc<Bridge>,
    start_time: Instant,
    request_count: AtomicU64,
}

impl AppState {
    pub fn new(bridge: Arc<Bridge>) -> Self {
        Self {
            bridge,
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
        }
    }

    /// Get uptime.
    pub fn uptime(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    /// Number of command submissions received.
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn increment_requests(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }
}
