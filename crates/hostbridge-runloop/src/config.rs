//! Runtime configuration for the bridge core.

use std::time::Duration;

use hostbridge_config::{Config, ResultMode};

/// Bridge configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Interval between pump drains.
    pub pump_interval: Duration,

    /// Name given to the host thread.
    pub thread_name: String,

    /// Maximum queued commands (0 = unlimited).
    pub max_pending: usize,

    /// How blocking submissions correlate with results.
    pub result_mode: ResultMode,

    /// Default wait budget for blocking submissions.
    pub legacy_timeout: Duration,

    /// Queue length per event subscriber.
    pub subscriber_capacity: usize,

    /// Idle time before a keepalive event.
    pub keepalive: Duration,

    /// Maximum lifetime of an event stream.
    pub max_stream: Option<Duration>,

    /// How long finished tasks stay queryable.
    pub retention: Duration,

    /// How often finished tasks are swept.
    pub cleanup_interval: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for BridgeConfig {
    fn from(config: &Config) -> Self {
        Self {
            pump_interval: config.pump.interval(),
            thread_name: config.pump.thread_name.clone(),
            max_pending: config.queue.max_pending,
            result_mode: config.results.mode,
            legacy_timeout: config.results.legacy_timeout(),
            subscriber_capacity: config.broadcast.subscriber_capacity,
            keepalive: config.broadcast.keepalive(),
            max_stream: config.broadcast.max_stream(),
            retention: config.lifecycle.retention(),
            cleanup_interval: config.lifecycle.cleanup_interval(),
        }
    }
}

impl BridgeConfig {
    pub fn with_pump_interval(mut self, interval: Duration) -> Self {
        self.pump_interval = interval;
        self
    }

    pub fn with_result_mode(mut self, mode: ResultMode) -> Self {
        self.result_mode = mode;
        self
    }

    pub fn with_legacy_timeout(mut self, timeout: Duration) -> Self {
        self.legacy_timeout = timeout;
        self
    }

    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending;
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }
}
