//! Third-party credential validation.
//!
//! A credential is probed against its own provider with a lightweight
//! authenticated request before it is stored. A rejected credential never
//! reaches the remote store.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;
use xanthus_core::SecretString;

use crate::error::{Result, SecretError};

/// Timeout for a single validation probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Checks a credential against the provider that issued it.
#[async_trait]
pub trait CredentialValidator: Send + Sync {
    /// Provider name, used for the logical key and error messages.
    fn provider(&self) -> &str;

    /// Succeed if the provider accepts `credential`.
    async fn validate(&self, credential: &SecretString) -> Result<()>;
}

fn probe_client() -> Result<Client> {
    Client::builder()
        .timeout(PROBE_TIMEOUT)
        .build()
        .map_err(|e| SecretError::Config(format!("failed to create HTTP client: {e}")))
}

/// Map a probe response status for `provider`.
fn check_status(provider: &str, status: StatusCode) -> Result<()> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SecretError::validation(
            provider,
            format!("HTTP {}", status.as_u16()),
        )),
        s => Err(SecretError::remote(
            format!("validate {provider}"),
            format!("HTTP {}", s.as_u16()),
        )),
    }
}

/// Validates Hetzner Cloud API tokens with a one-item server listing.
pub struct HetznerValidator {
    client: Client,
    api_base: String,
}

impl HetznerValidator {
    pub fn new(api_base: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: probe_client()?,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl CredentialValidator for HetznerValidator {
    fn provider(&self) -> &str {
        "hetzner"
    }

    async fn validate(&self, credential: &SecretString) -> Result<()> {
        if credential.is_empty() {
            return Err(SecretError::validation("hetzner", "token is empty"));
        }

        let response = self
            .client
            .get(format!("{}/servers", self.api_base))
            .query(&[("per_page", "1")])
            .bearer_auth(credential.expose_secret())
            .send()
            .await
            .map_err(|e| SecretError::remote("validate hetzner", e.to_string()))?;

        check_status("hetzner", response.status())?;
        debug!("hetzner token accepted");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TokenVerify {
    #[serde(default)]
    success: bool,
    result: Option<TokenStatus>,
}

#[derive(Debug, Deserialize)]
struct TokenStatus {
    status: String,
}

/// Validates Cloudflare API tokens via the token verification endpoint.
pub struct CloudflareTokenValidator {
    client: Client,
    api_base: String,
}

impl CloudflareTokenValidator {
    pub fn new(api_base: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: probe_client()?,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl CredentialValidator for CloudflareTokenValidator {
    fn provider(&self) -> &str {
        "cloudflare"
    }

    async fn validate(&self, credential: &SecretString) -> Result<()> {
        if credential.is_empty() {
            return Err(SecretError::validation("cloudflare", "token is empty"));
        }

        let response = self
            .client
            .get(format!("{}/user/tokens/verify", self.api_base))
            .bearer_auth(credential.expose_secret())
            .send()
            .await
            .map_err(|e| SecretError::remote("validate cloudflare", e.to_string()))?;

        check_status("cloudflare", response.status())?;

        let body: TokenVerify = response
            .json()
            .await
            .map_err(|e| SecretError::remote("validate cloudflare", e.to_string()))?;

        match body.result {
            Some(token) if body.success && token.status == "active" => Ok(()),
            Some(token) => Err(SecretError::validation(
                "cloudflare",
                format!("token status is '{}'", token.status),
            )),
            None => Err(SecretError::validation("cloudflare", "token could not be verified")),
        }
    }
}
