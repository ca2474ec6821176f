//! Configuration schema definitions.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub pump: PumpConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub results: ResultsConfig,

    #[serde(default)]
    pub broadcast: BroadcastConfig,

    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// `host:port` string suitable for binding.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

/// Execution pump trigger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PumpConfig {
    /// Interval between drain ticks in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Name of the privileged host thread.
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            thread_name: default_thread_name(),
        }
    }
}

impl PumpConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

fn default_interval_ms() -> u64 {
    200
}

fn default_thread_name() -> String {
    "host-executor".to_string()
}

/// Task queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum number of commands waiting for the next drain.
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_pending: default_max_pending(),
        }
    }
}

fn default_max_pending() -> usize {
    1024
}

/// How blocking (legacy) callers correlate with their results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultMode {
    /// Every task id is its own result slot.
    #[default]
    PerTask,
    /// One shared slot, cleared before each submission.
    SingleSlot,
}

/// Result store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsConfig {
    #[serde(default)]
    pub mode: ResultMode,

    /// Wait budget for blocking submissions, in seconds.
    #[serde(default = "default_legacy_timeout_secs")]
    pub legacy_timeout_secs: u64,
}

impl Default for ResultsConfig {
    fn default() -> Self {
        Self {
            mode: ResultMode::default(),
            legacy_timeout_secs: default_legacy_timeout_secs(),
        }
    }
}

impl ResultsConfig {
    pub fn legacy_timeout(&self) -> Duration {
        Duration::from_secs(self.legacy_timeout_secs)
    }
}

fn default_legacy_timeout_secs() -> u64 {
    10
}

/// Event broadcaster configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Bounded queue length per subscriber.
    #[serde(default = "default_subscriber_capacity")]
    pub subscriber_capacity: usize,

    /// Idle interval after which a keepalive event is emitted.
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,

    /// Maximum lifetime of one event stream (0 = unlimited).
    #[serde(default)]
    pub max_stream_secs: u64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            subscriber_capacity: default_subscriber_capacity(),
            keepalive_secs: default_keepalive_secs(),
            max_stream_secs: 0,
        }
    }
}

impl BroadcastConfig {
    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }

    pub fn max_stream(&self) -> Option<Duration> {
        (self.max_stream_secs > 0).then(|| Duration::from_secs(self.max_stream_secs))
    }
}

fn default_subscriber_capacity() -> usize {
    256
}

fn default_keepalive_secs() -> u64 {
    1
}

/// Task lifecycle retention configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// How long terminal tasks stay queryable.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,

    /// How often the sweeper runs.
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            retention_secs: default_retention_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

impl LifecycleConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

fn default_retention_secs() -> u64 {
    300
}

fn default_cleanup_interval_secs() -> u64 {
    60
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit console logs as JSON lines.
    #[serde(default)]
    pub json: bool,

    /// Directory for daily-rotated log files. Unset = console only.
    #[serde(default)]
    pub file_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            file_dir: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.addr(), "127.0.0.1:5000");
        assert_eq!(config.pump.interval(), Duration::from_millis(200));
        assert_eq!(config.pump.thread_name, "host-executor");
        assert_eq!(config.queue.max_pending, 1024);
        assert_eq!(config.results.mode, ResultMode::PerTask);
        assert_eq!(config.results.legacy_timeout(), Duration::from_secs(10));
        assert_eq!(config.broadcast.subscriber_capacity, 256);
        assert!(config.broadcast.max_stream().is_none());
        assert_eq!(config.lifecycle.retention(), Duration::from_secs(300));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_result_mode_serde() {
        let mode: ResultMode = serde_json::from_str("\"single_slot\"").unwrap();
        assert_eq!(mode, ResultMode::SingleSlot);
        assert_eq!(serde_json::to_string(&ResultMode::PerTask).unwrap(), "\"per_task\"");
    }

    #[test]
    fn test_max_stream_enabled() {
        let config = BroadcastConfig {
            max_stream_secs: 60,
            ..Default::default()
        };
        assert_eq!(config.max_stream(), Some(Duration::from_secs(60)));
    }
}
