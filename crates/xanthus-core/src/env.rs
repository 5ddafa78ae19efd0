//! Environment variable handling.

use std::env;

/// Get an environment variable, returning None if not set or empty.
pub fn get_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
pub fn get_var_or(name: &str, default: &str) -> String {
    get_var(name).unwrap_or_else(|| default.to_string())
}

/// Get an environment variable as a boolean.
pub fn get_bool(name: &str) -> bool {
    get_var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// Get an environment variable as a u64 (e.g., for timeouts).
pub fn get_u64(name: &str) -> Option<u64> {
    get_var(name).and_then(|v| v.parse().ok())
}

/// Common environment variable names.
pub mod vars {
    /// Xanthus home directory override.
    pub const XANTHUS_HOME: &str = "XANTHUS_HOME";

    /// Xanthus config file override.
    pub const XANTHUS_CONFIG: &str = "XANTHUS_CONFIG";

    /// Remote store API base URL override.
    pub const XANTHUS_API_BASE: &str = "XANTHUS_API_BASE";

    /// Remote store request timeout override, in seconds.
    pub const XANTHUS_REQUEST_TIMEOUT: &str = "XANTHUS_REQUEST_TIMEOUT";

    /// Cloudflare API token. Authorizes remote store calls and derives the
    /// encryption key.
    pub const XANTHUS_CF_TOKEN: &str = "XANTHUS_CF_TOKEN";

    /// Cloudflare account identifier.
    pub const XANTHUS_ACCOUNT_ID: &str = "XANTHUS_ACCOUNT_ID";

    /// Xanthus log filter.
    pub const XANTHUS_LOG: &str = "XANTHUS_LOG";
}
