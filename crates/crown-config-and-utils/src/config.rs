//! Configuration management for the client.

use crate::{CoreError, CoreResult, Paths};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default backend API base URL (can be overridden at compile time via CROWN_API_BASE_URL).
pub const DEFAULT_API_BASE_URL: &str = match option_env!("CROWN_API_BASE_URL") {
    Some(url) => url,
    None => "https://flow.madras.p-e.kr/api",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Path the OAuth provider redirects to with `accessToken` in the query.
pub const DEFAULT_CALLBACK_PATH: &str = "/oauth-success";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CALLBACK_PORT: u16 = 5173;
const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 120;

/// Main client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Base URL every backend path is resolved against.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Upper bound for every remote call (identity probe, revoke, ...).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Path of the OAuth redirect target.
    #[serde(default = "default_callback_path")]
    pub callback_path: String,
    /// Loopback port the callback listener binds to.
    #[serde(default = "default_callback_port")]
    pub callback_port: u16,
    /// How long the callback listener waits for the redirect.
    #[serde(default = "default_callback_timeout_secs")]
    pub callback_timeout_secs: u64,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_callback_path() -> String {
    DEFAULT_CALLBACK_PATH.to_string()
}

fn default_callback_port() -> u16 {
    DEFAULT_CALLBACK_PORT
}

fn default_callback_timeout_secs() -> u64 {
    DEFAULT_CALLBACK_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            api_base_url: default_api_base_url(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            callback_path: default_callback_path(),
            callback_port: DEFAULT_CALLBACK_PORT,
            callback_timeout_secs: DEFAULT_CALLBACK_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file, falling back to defaults,
    /// then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Override configuration from environment variables.
    fn load_from_env(&mut self) {
        if let Some(level) = env_value("CROWN_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(url) = env_value("CROWN_API_BASE_URL") {
            self.api_base_url = url;
        }
        if let Some(secs) = env_value("CROWN_REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.request_timeout_secs = secs;
        }
        if let Some(port) = env_value("CROWN_CALLBACK_PORT").and_then(|v| v.parse().ok()) {
            self.callback_port = port;
        }
    }

    /// Reject values that would make the client misbehave silently.
    pub fn validate(&self) -> CoreResult<()> {
        self.api_base_url()?;
        if self.request_timeout_secs == 0 {
            return Err(CoreError::InvalidSetting {
                key: "request_timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if !self.callback_path.starts_with('/') {
            return Err(CoreError::InvalidSetting {
                key: "callback_path",
                reason: format!("must start with '/', got {:?}", self.callback_path),
            });
        }
        Ok(())
    }

    /// Get the API base URL as a parsed URL.
    pub fn api_base_url(&self) -> CoreResult<Url> {
        Url::parse(&self.api_base_url).map_err(CoreError::from)
    }

    /// Timeout applied to each remote call.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Timeout for the loopback callback listener.
    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.callback_timeout_secs)
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.callback_path, DEFAULT_CALLBACK_PATH);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_load_from_file_fills_missing_fields() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");

        std::fs::write(
            &config_path,
            r#"{ "log_level": "debug", "api_base_url": "http://localhost:8080/api" }"#,
        )
        .unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.api_base_url, "http://localhost:8080/api");
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(config.callback_path, DEFAULT_CALLBACK_PATH);
    }

    #[test]
    fn test_config_load_nonexistent_uses_defaults() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config::load(&paths).unwrap();
        assert_eq!(config.callback_path, DEFAULT_CALLBACK_PATH);
    }

    #[test]
    fn test_config_invalid_url() {
        let mut config = Config::default();
        config.api_base_url = "not a valid url".to_string();

        assert!(config.api_base_url().is_err());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_rejects_zero_timeout() {
        let mut config = Config::default();
        config.request_timeout_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(CoreError::InvalidSetting { key: "request_timeout_secs", .. })
        ));
    }

    #[test]
    fn test_config_rejects_relative_callback_path() {
        let mut config = Config::default();
        config.callback_path = "oauth-success".to_string();
        assert!(matches!(
            config.validate(),
            Err(CoreError::InvalidSetting { key: "callback_path", .. })
        ));
    }
}
