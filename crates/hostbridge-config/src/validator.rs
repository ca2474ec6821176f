//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::Config;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> Result<ValidationResult, ConfigError> {
        let mut result = ValidationResult::default();

        Self::validate_server(config, &mut result);
        Self::validate_pump(config, &mut result);
        Self::validate_queue(config, &mut result);
        Self::validate_results(config, &mut result);
        Self::validate_broadcast(config, &mut result);
        Self::validate_lifecycle(config, &mut result);

        Ok(result)
    }

    fn validate_server(config: &Config, result: &mut ValidationResult) {
        if config.server.port == 0 {
            result.add_error(ValidationError::new("server.port", "Port cannot be 0"));
        }

        if config.server.host.is_empty() {
            result.add_error(ValidationError::new("server.host", "Host cannot be empty"));
        }
    }

    fn validate_pump(config: &Config, result: &mut ValidationResult) {
        if config.pump.interval_ms == 0 {
            result.add_error(ValidationError::new(
                "pump.interval_ms",
                "interval_ms must be greater than 0",
            ));
        } else if config.pump.interval_ms > 5_000 {
            result.add_warning(ValidationWarning::new(
                "pump.interval_ms",
                "interval_ms above 5s makes every command wait that long before running",
            ));
        }

        if config.pump.thread_name.is_empty() {
            result.add_error(ValidationError::new(
                "pump.thread_name",
                "thread_name cannot be empty",
            ));
        }
    }

    fn validate_queue(config: &Config, result: &mut ValidationResult) {
        if config.queue.max_pending == 0 {
            result.add_error(ValidationError::new(
                "queue.max_pending",
                "max_pending must be greater than 0",
            ));
        }
    }

    fn validate_results(config: &Config, result: &mut ValidationResult) {
        if config.results.legacy_timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "results.legacy_timeout_secs",
                "legacy_timeout_secs must be greater than 0",
            ));
        }
    }

    fn validate_broadcast(config: &Config, result: &mut ValidationResult) {
        if config.broadcast.subscriber_capacity == 0 {
            result.add_error(ValidationError::new(
                "broadcast.subscriber_capacity",
                "subscriber_capacity must be greater than 0",
            ));
        }

        if config.broadcast.keepalive_secs == 0 {
            result.add_error(ValidationError::new(
                "broadcast.keepalive_secs",
                "keepalive_secs must be greater than 0",
            ));
        }

        if config.broadcast.max_stream_secs > 0
            && config.broadcast.max_stream_secs <= config.broadcast.keepalive_secs
        {
            result.add_warning(ValidationWarning::new(
                "broadcast.max_stream_secs",
                "streams close before the first keepalive would be sent",
            ));
        }
    }

    fn validate_lifecycle(config: &Config, result: &mut ValidationResult) {
        if config.lifecycle.cleanup_interval_secs == 0 {
            result.add_error(ValidationError::new(
                "lifecycle.cleanup_interval_secs",
                "cleanup_interval_secs must be greater than 0",
            ));
        }

        if config.lifecycle.retention_secs < config.results.legacy_timeout_secs {
            result.add_warning(ValidationWarning::new(
                "lifecycle.retention_secs",
                "retention is shorter than the blocking wait budget; results may be swept before they are read",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
