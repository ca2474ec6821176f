use super::*;

#[test]
fn test_validate_default_config() {
    let config = Config::default();
    let result = ConfigValidator::validate(&config).unwrap();
    assert!(result.is_valid());
    assert!(result.warnings.is_empty());
}

#[test]
fn test_validate_invalid_port() {
    let mut config = Config::default();
    config.server.port = 0;

    let result = ConfigValidator::validate(&config).unwrap();
    assert!(!result.is_valid());
    assert!(result.errors.iter().any(|e| e.path == "server.port"));
}

#[test]
fn test_validate_empty_host() {
    let mut config = Config::default();
    config.server.host.clear();

    let result = ConfigValidator::validate(&config).unwrap();
    assert!(result.errors.iter().any(|e| e.path == "server.host"));
}

#[test]
fn test_validate_zero_interval() {
    let mut config = Config::default();
    config.pump.interval_ms = 0;

    let result = ConfigValidator::validate(&config).unwrap();
    assert!(result.errors.iter().any(|e| e.path == "pump.interval_ms"));
}

#[test]
fn test_validate_slow_interval_warning() {
    let mut config = Config::default();
    config.pump.interval_ms = 10_000;

    let result = ConfigValidator::validate(&config).unwrap();
    assert!(result.is_valid());
    assert!(result.warnings.iter().any(|w| w.path == "pump.interval_ms"));
}

#[test]
fn test_validate_zero_capacity() {
    let mut config = Config::default();
    config.broadcast.subscriber_capacity = 0;
    config.queue.max_pending = 0;

    let result = ConfigValidator::validate(&config).unwrap();
    assert_eq!(result.errors.len(), 2);
}

#[test]
fn test_validate_short_retention_warning() {
    let mut config = Config::default();
    config.lifecycle.retention_secs = 1;
    config.results.legacy_timeout_secs = 30;

    let result = ConfigValidator::validate(&config).unwrap();
    assert!(result.is_valid());
    assert!(result.warnings.iter().any(|w| w.path == "lifecycle.retention_secs"));
}

#[test]
fn test_validate_stream_shorter_than_keepalive() {
    let mut config = Config::default();
    config.broadcast.keepalive_secs = 10;
    config.broadcast.max_stream_secs = 5;

    let result = ConfigValidator::validate(&config).unwrap();
    assert!(result.warnings.iter().any(|w| w.path == "broadcast.max_stream_secs"));
}

#[test]
fn test_validation_result_default() {
    let result = ValidationResult::default();
    assert!(result.is_valid());
    assert!(result.errors.is_empty());
    assert!(result.warnings.is_empty());
}

#[test]
fn test_validation_error_new() {
    let err = ValidationError::new("queue.max_pending", "must be positive");
    assert_eq!(err.path, "queue.max_pending");
    assert_eq!(err.message, "must be positive");
}
