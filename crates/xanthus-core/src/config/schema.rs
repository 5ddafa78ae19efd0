//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default Cloudflare v4 API base.
pub const DEFAULT_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default title of the platform namespace in the remote store.
pub const DEFAULT_NAMESPACE_TITLE: &str = "Xanthus";

/// Default Hetzner Cloud API base, used to validate provider tokens.
pub const DEFAULT_HETZNER_API_BASE: &str = "https://api.hetzner.cloud/v1";

/// Main Xanthus configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Remote key-value store settings.
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Read-after-write retry settings.
    #[serde(default)]
    pub retry: RetryConfig,

    /// SSH key cache settings.
    #[serde(default)]
    pub ssh: SshConfig,

    /// Third-party provider endpoints.
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// Remote store configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// API base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Namespace title, one per account.
    #[serde(default = "default_namespace_title")]
    pub namespace_title: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            namespace_title: default_namespace_title(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_namespace_title() -> String {
    DEFAULT_NAMESPACE_TITLE.to_string()
}

fn default_request_timeout() -> u64 {
    10
}

/// Retry policy for reads that may race remote propagation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts, in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_delay_ms() -> u64 {
    2000
}

/// SSH key cache configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SshConfig {
    /// Local key directory. Defaults to `~/.xanthus/ssh`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_dir: Option<PathBuf>,

    /// Name recorded in the key metadata and the public key comment.
    #[serde(default = "default_key_name")]
    pub key_name: String,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            key_dir: None,
            key_name: default_key_name(),
        }
    }
}

fn default_key_name() -> String {
    "xanthus-key".to_string()
}

/// Provider endpoints used for credential validation probes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Hetzner Cloud API base URL.
    #[serde(default = "default_hetzner_api_base")]
    pub hetzner_api_base: String,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            hetzner_api_base: default_hetzner_api_base(),
        }
    }
}

fn default_hetzner_api_base() -> String {
    DEFAULT_HETZNER_API_BASE.to_string()
}
