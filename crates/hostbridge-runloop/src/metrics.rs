//! Execution pump metrics collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pump metrics.
#[derive(Debug)]
pub struct PumpMetrics {
    /// Drain ticks that ran.
    pub drains: AtomicU64,

    /// Ticks skipped because a drain was already in progress.
    pub skipped_drains: AtomicU64,

    /// Commands handed to a handler.
    pub executed: AtomicU64,

    pub succeeded: AtomicU64,

    pub failed: AtomicU64,

    /// Commands that never ran (cancelled while queued or discarded at shutdown).
    pub discarded: AtomicU64,

    /// Total time spent inside handlers (microseconds).
    pub handler_time_us: AtomicU64,

    start_time: Instant,
}

impl Default for PumpMetrics {
    fn default() -> Self {
        Self {
            drains: AtomicU64::new(0),
            skipped_drains: AtomicU64::new(0),
            executed: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
            handler_time_us: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }
}

impl PumpMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn record_drain(&self) {
        self.drains.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped_drain(&self) {
        self.skipped_drains.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one handler invocation and how long it took.
    pub fn record_execution(&self, success: bool, duration_us: u64) {
        self.executed.fetch_add(1, Ordering::Relaxed);
        self.handler_time_us.fetch_add(duration_us, Ordering::Relaxed);
        if success {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self, count: u64) {
        self.discarded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            uptime_secs: self.uptime_secs(),
            drains: self.drains.load(Ordering::Relaxed),
            skipped_drains: self.skipped_drains.load(Ordering::Relaxed),
            executed: self.executed.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            handler_time_us: self.handler_time_us.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub uptime_secs: u64,
    pub drains: u64,
    pub skipped_drains: u64,
    pub executed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub discarded: u64,
    pub handler_time_us: u64,
}

impl MetricsSnapshot {
    /// Average handler time in milliseconds.
    pub fn avg_handler_time_ms(&self) -> f64 {
        if self.executed == 0 {
            0.0
        } else {
            (self.handler_time_us as f64 / self.executed as f64) / 1000.0
        }
    }
}
