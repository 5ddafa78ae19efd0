//! The credential facade used by the rest of the platform.
//!
//! Reads check the [`TempSecretCache`] before going to the remote store, so a
//! value written by this process is readable immediately even while the
//! store is still propagating it.

use std::sync::Arc;

use tracing::{debug, info};
use xanthus_core::{Config, SecretString};

use crate::cache::TempSecretCache;
use crate::crypto;
use crate::error::{Result, SecretError};
use crate::retry::{ConsistencyRetrier, RetryPolicy};
use crate::ssh::SshKeyManager;
use crate::store::{CloudflareKv, KvStore, NamespaceResolver};
use crate::types::{AccountContext, EncryptedSecret, SshKeyAcquisition};
use crate::validate::CredentialValidator;

/// Encrypts, persists, retrieves and caches platform secrets.
pub struct CredentialService {
    store: Arc<dyn KvStore>,
    resolver: Arc<NamespaceResolver>,
    retrier: ConsistencyRetrier,
    cache: Arc<TempSecretCache>,
    ssh: SshKeyManager,
}

impl CredentialService {
    /// Assemble a service from its parts. The cache is injected so the
    /// composition root decides its lifetime.
    pub fn new(
        store: Arc<dyn KvStore>,
        resolver: Arc<NamespaceResolver>,
        policy: RetryPolicy,
        cache: Arc<TempSecretCache>,
        ssh: SshKeyManager,
    ) -> Self {
        Self {
            retrier: ConsistencyRetrier::new(store.clone(), policy),
            store,
            resolver,
            cache,
            ssh,
        }
    }

    /// Wire a service against `store` using the settings in `config`.
    pub fn with_store(
        config: &Config,
        store: Arc<dyn KvStore>,
        cache: Arc<TempSecretCache>,
    ) -> Result<Self> {
        let resolver = Arc::new(NamespaceResolver::new(
            store.clone(),
            config.remote.namespace_title.clone(),
        ));
        let key_dir = config
            .ssh_key_dir()
            .map_err(|e| SecretError::Config(e.to_string()))?;
        let ssh = SshKeyManager::new(
            store.clone(),
            resolver.clone(),
            key_dir,
            config.ssh.key_name.clone(),
        );
        let policy = RetryPolicy::fixed(config.retry.max_attempts, config.retry_delay());

        Ok(Self::new(store, resolver, policy, cache, ssh))
    }

    /// Wire a service against Cloudflare Workers KV.
    pub fn from_config(config: &Config, cache: Arc<TempSecretCache>) -> Result<Self> {
        let store = CloudflareKv::new(&config.remote.api_base, config.request_timeout())?;
        Self::with_store(config, Arc::new(store), cache)
    }

    pub fn cache(&self) -> &Arc<TempSecretCache> {
        &self.cache
    }

    pub fn ssh(&self) -> &SshKeyManager {
        &self.ssh
    }

    /// Read and decrypt the secret stored under `key`.
    ///
    /// Fails with [`SecretError::NotConfigured`] when nothing is stored after
    /// retries and [`SecretError::DecryptionFailed`] when the record exists
    /// but cannot be decrypted with this token.
    pub async fn get_secret(&self, ctx: &AccountContext, key: &str) -> Result<SecretString> {
        if let Some(value) = self.cache.get(ctx.account_id(), key) {
            debug!(account = ctx.account_id(), key, "temp cache hit");
            return Ok(value);
        }

        let namespace_id = self
            .resolver
            .ensure(ctx)
            .await
            .map_err(|e| e.with_key(key))?;
        let bytes = self
            .retrier
            .get(ctx, &namespace_id, key)
            .await
            .map_err(|e| match e {
                SecretError::NotFound { .. } => SecretError::NotConfigured {
                    key: key.to_string(),
                },
                other => other.with_key(key),
            })?;

        let plaintext = EncryptedSecret::from_bytes(&bytes)
            .and_then(|secret| crypto::decrypt(&secret.ciphertext, ctx.token()))
            .map_err(|e| match e {
                SecretError::DecryptionFailed(reason) => {
                    SecretError::DecryptionFailed(format!("{key}: {reason}"))
                }
                other => SecretError::DecryptionFailed(format!("{key}: {other}")),
            })?;

        debug!(account = ctx.account_id(), key, "read secret from remote store");
        Ok(SecretString::new(plaintext))
    }

    /// Encrypt and store `value` under `key`, then cache the plaintext so an
    /// immediate read does not depend on propagation.
    pub async fn set_secret(
        &self,
        ctx: &AccountContext,
        key: &str,
        value: &SecretString,
    ) -> Result<()> {
        let ciphertext = crypto::encrypt(value.expose_secret(), ctx.token())?;
        let record = EncryptedSecret::new(ciphertext).to_bytes()?;

        let namespace_id = self
            .resolver
            .ensure(ctx)
            .await
            .map_err(|e| e.with_key(key))?;
        self.store
            .put(ctx, &namespace_id, key, &record)
            .await
            .map_err(|e| e.with_key(key))?;

        self.cache.set(ctx.account_id(), key, value.clone());
        info!(account = ctx.account_id(), key, "stored secret");
        Ok(())
    }

    /// Validate `value` with its provider, then store it under
    /// `config:<provider>:api_key`. Returns the logical key used.
    pub async fn set_validated_secret(
        &self,
        ctx: &AccountContext,
        value: &SecretString,
        validator: &dyn CredentialValidator,
    ) -> Result<String> {
        validator.validate(value).await?;

        let key = crate::keys::provider_api_key(validator.provider());
        self.set_secret(ctx, &key, value).await?;
        Ok(key)
    }

    /// Return the platform SSH keypair from local disk, the remote store, or
    /// fresh generation.
    pub async fn get_or_create_ssh_key(&self, ctx: &AccountContext) -> Result<SshKeyAcquisition> {
        self.ssh.get_or_create(ctx).await
    }

    /// Drop this account's cached plaintext and the local SSH key copy.
    /// Remote records are kept.
    pub async fn logout(&self, ctx: &AccountContext) -> Result<()> {
        self.cache.clear(ctx.account_id());
        self.resolver.forget(ctx.account_id());
        self.ssh.delete_local().await?;
        info!(account = ctx.account_id(), "logged out");
        Ok(())
    }
}
