//! Configuration loader.

use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::schema::Config;
use crate::validator::ConfigValidator;

/// Configuration loader with environment variable substitution.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    /// Load configuration from a string.
    pub fn load_str(content: &str) -> Result<Config, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        let config: Config = toml::from_str(&expanded)?;
        Ok(config)
    }

    /// Load a file and reject it if validation reports errors.
    ///
    /// A missing file yields the default configuration; the boolean tells the
    /// caller whether the file was actually read.
    pub fn load_validated(path: &Path) -> Result<(Config, bool), ConfigError> {
        let (config, from_file) = match Self::load(path) {
            Ok(config) => (config, true),
            Err(ConfigError::NotFound(_)) => (Config::default(), false),
            Err(e) => return Err(e),
        };

        let report = ConfigValidator::validate(&config)?;
        if !report.is_valid() {
            let joined = report
                .errors
                .iter()
                .map(|e| format!("{}: {}", e.path, e.message))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ConfigError::Rejected(joined));
        }

        Ok((config, from_file))
    }

    /// Expand environment variables in the format `${VAR}`.
    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        let mut result = content.to_string();
        let re = regex::Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| ConfigError::Rejected(e.to_string()))?;

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let var_value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotSet(var_name.to_string()))?;
            result = result.replace(&cap[0], &var_value);
        }

        Ok(result)
    }

    /// Expand shell-style paths (e.g., `~/.hostbridge/logs`).
    pub fn expand_path(path: &str) -> String {
        shellexpand::tilde(path).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ResultMode;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_empty_config() {
        let config = ConfigLoader::load_str("").unwrap();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.pump.interval_ms, 200);
    }

    #[test]
    fn test_load_full_config() {
        let content = r#"
            [server]
            host = "0.0.0.0"
            port = 12121

            [pump]
            interval_ms = 50
            thread_name = "cad-main"

            [queue]
            max_pending = 16

            [results]
            mode = "single_slot"
            legacy_timeout_secs = 3

            [broadcast]
            subscriber_capacity = 8
            keepalive_secs = 5
            max_stream_secs = 60

            [lifecycle]
            retention_secs = 30
            cleanup_interval_secs = 5

            [logging]
            level = "debug"
            json = true
        "#;
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.server.addr(), "0.0.0.0:12121");
        assert_eq!(config.pump.thread_name, "cad-main");
        assert_eq!(config.queue.max_pending, 16);
        assert_eq!(config.results.mode, ResultMode::SingleSlot);
        assert_eq!(config.broadcast.subscriber_capacity, 8);
        assert_eq!(config.lifecycle.retention_secs, 30);
        assert!(config.logging.json);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[server]").unwrap();
        writeln!(file, "port = 5001").unwrap();

        let config = ConfigLoader::load(file.path()).unwrap();
        assert_eq!(config.server.port, 5001);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = ConfigLoader::load(Path::new("/nonexistent/path/hostbridge.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_validated_missing_file_uses_defaults() {
        let (config, from_file) =
            ConfigLoader::load_validated(Path::new("/nonexistent/hostbridge.toml")).unwrap();
        assert!(!from_file);
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_load_validated_rejects_invalid() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[pump]").unwrap();
        writeln!(file, "interval_ms = 0").unwrap();

        let result = ConfigLoader::load_validated(file.path());
        match result {
            Err(ConfigError::Rejected(msg)) => assert!(msg.contains("pump.interval_ms")),
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_load_invalid_toml() {
        let content = "invalid = [unclosed";
        let result = ConfigLoader::load_str(content);
        assert!(result.is_err());
    }

    #[test]
    fn test_expand_env_vars() {
        // SAFETY: This test runs in isolation and sets a unique test-only env var
        unsafe {
            std::env::set_var("HOSTBRIDGE_TEST_CONFIG_VAR", "test_value");
        }
        let content = "value = \"${HOSTBRIDGE_TEST_CONFIG_VAR}\"";
        let expanded = ConfigLoader::expand_env_vars(content).unwrap();
        assert!(expanded.contains("test_value"));
        unsafe {
            std::env::remove_var("HOSTBRIDGE_TEST_CONFIG_VAR");
        }
    }

    #[test]
    fn test_expand_env_vars_not_set() {
        let content = "value = \"${NONEXISTENT_HOSTBRIDGE_VAR_12345}\"";
        let result = ConfigLoader::expand_env_vars(content);
        assert!(result.is_err());
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let expanded = ConfigLoader::expand_path("~/test");
        assert!(!expanded.starts_with('~'));
        assert!(expanded.ends_with("/test"));
    }
}
