//! Configuration loading and persistence.

use super::Config;
use crate::env::{self, vars};
use crate::error::ConfigError;
use crate::paths;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound for a single remote request.
const MAX_REQUEST_TIMEOUT_SECS: u64 = 60;

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = paths::config_file()?;
        Self::load(&path)
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        json5::from_str(content).map_err(|e| ConfigError::Json5(e.to_string()))
    }

    /// Save configuration to a file path.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_json5()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write atomically
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Serialize to JSON5 string.
    pub fn to_json5(&self) -> Result<String, ConfigError> {
        // json5 has no serializer; plain JSON is valid JSON5
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validate the configuration, collecting all errors before returning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if let Err(e) = url::Url::parse(&self.remote.api_base) {
            errors.push(format!(
                "remote.api_base '{}' is not a valid URL: {}",
                self.remote.api_base, e
            ));
        }

        if self.remote.namespace_title.trim().is_empty() {
            errors.push("remote.namespace_title must not be empty".to_string());
        }

        if self.remote.request_timeout_secs == 0
            || self.remote.request_timeout_secs > MAX_REQUEST_TIMEOUT_SECS
        {
            errors.push(format!(
                "remote.request_timeout_secs must be 1-{}, got {}",
                MAX_REQUEST_TIMEOUT_SECS, self.remote.request_timeout_secs
            ));
        }

        if self.retry.max_attempts == 0 {
            errors.push("retry.max_attempts must be at least 1".to_string());
        }

        if self.ssh.key_name.trim().is_empty() {
            errors.push("ssh.key_name must not be empty".to_string());
        } else if self.ssh.key_name.chars().any(char::is_whitespace) {
            errors.push(format!(
                "ssh.key_name '{}' must not contain whitespace",
                self.ssh.key_name
            ));
        }

        if let Err(e) = url::Url::parse(&self.providers.hetzner_api_base) {
            errors.push(format!(
                "providers.hetzner_api_base '{}' is not a valid URL: {}",
                self.providers.hetzner_api_base, e
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors.join("; ")))
        }
    }

    /// Load configuration from the default path, falling back to defaults if
    /// no file exists. Environment overrides are applied in both cases.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        let config = match Self::load_default() {
            Ok(config) => config,
            Err(ConfigError::NotFound(_)) => Self::default(),
            Err(e) => return Err(e),
        };
        Ok(config.with_env_overrides())
    }

    /// Apply `XANTHUS_API_BASE` and `XANTHUS_REQUEST_TIMEOUT` on top of this config.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(base) = env::get_var(vars::XANTHUS_API_BASE) {
            self.remote.api_base = base;
        }
        if let Some(timeout) = env::get_u64(vars::XANTHUS_REQUEST_TIMEOUT) {
            self.remote.request_timeout_secs = timeout;
        }
        self
    }

    /// Resolved local SSH key directory.
    pub fn ssh_key_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.ssh.key_dir {
            Some(dir) => Ok(paths::expand_tilde(&dir.to_string_lossy())),
            None => paths::ssh_dir(),
        }
    }

    /// Per-request timeout for remote calls.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.request_timeout_secs)
    }

    /// Delay between read attempts.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry.delay_ms)
    }
}

/// Configuration builder for creating configs programmatically.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new config builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the remote API base URL.
    pub fn api_base(mut self, url: impl Into<String>) -> Self {
        self.config.remote.api_base = url.into();
        self
    }

    /// Set the namespace title.
    pub fn namespace_title(mut self, title: impl Into<String>) -> Self {
        self.config.remote.namespace_title = title.into();
        self
    }

    /// Set the per-request timeout.
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.remote.request_timeout_secs = secs;
        self
    }

    /// Set the retry attempts and delay.
    pub fn retry(mut self, max_attempts: u32, delay_ms: u64) -> Self {
        self.config.retry.max_attempts = max_attempts;
        self.config.retry.delay_ms = delay_ms;
        self
    }

    /// Set the local SSH key directory.
    pub fn ssh_key_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.ssh.key_dir = Some(dir.into());
        self
    }

    /// Set the SSH key name.
    pub fn ssh_key_name(mut self, name: impl Into<String>) -> Self {
        self.config.ssh.key_name = name.into();
        self
    }

    /// Set the Hetzner API base URL.
    pub fn hetzner_api_base(mut self, url: impl Into<String>) -> Self {
        self.config.providers.hetzner_api_base = url.into();
        self
    }

    /// Build the config.
    pub fn build(self) -> Config {
        self.config
    }

    /// Validate and build the config, returning an error if validation fails.
    pub fn build_validated(self) -> Result<Config, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
