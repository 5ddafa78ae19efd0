//! CLI command implementations.

pub mod config;
pub mod secrets;
pub mod ssh;

use std::path::Path;
use std::sync::Arc;

use clap::Args;
use xanthus_core::Config;
use xanthus_secrets::{AccountContext, CredentialService, SecretError, TempSecretCache};

/// Cloudflare account and token identifying the session.
#[derive(Args, Debug, Clone)]
pub struct AccountArgs {
    /// Cloudflare account id
    #[arg(long, env = "XANTHUS_ACCOUNT_ID")]
    pub account: String,

    /// Cloudflare API token (also the encryption passphrase)
    #[arg(long, env = "XANTHUS_CF_TOKEN", hide_env_values = true)]
    pub token: String,
}

impl AccountArgs {
    pub fn context(&self) -> AccountContext {
        AccountContext::new(self.token.as_str(), self.account.as_str())
    }
}

/// Load the config at `path`, or the default location, and validate it.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)?.with_env_overrides(),
        None => Config::load_or_default()?,
    };
    config.validate()?;
    Ok(config)
}

/// Build a credential service against the configured remote store.
pub fn service(config: &Config) -> anyhow::Result<CredentialService> {
    CredentialService::from_config(config, Arc::new(TempSecretCache::new())).map_err(user_error)
}

/// Convert a secrets error into an operator-facing error.
pub fn user_error(err: SecretError) -> anyhow::Error {
    tracing::debug!(error = %err, "command failed");
    anyhow::anyhow!(err.user_message())
}
