//! Platform SSH keypair acquisition.
//!
//! The keypair is looked up in three tiers:
//! 1. the local key directory (no network),
//! 2. the remote store, decrypting the private half and writing it through
//!    to the local directory,
//! 3. a freshly generated Ed25519 key, persisted to both tiers on a
//!    best-effort basis.
//!
//! Only a failure to generate key material fails the call. Persistence
//! results are reported through [`PersistOutcome`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use rand::rngs::OsRng;
use ssh_key::{Algorithm, HashAlg, LineEnding, PrivateKey, PublicKey};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use xanthus_core::SecretString;

use crate::crypto;
use crate::error::{Result, SecretError};
use crate::keys;
use crate::store::{KvStore, NamespaceResolver};
use crate::types::{
    AccountContext, EncryptedSecret, KeySource, PersistOutcome, SshKeyAcquisition, SshKeyMetadata,
    SshKeyPair, SshKeyRecord,
};

pub const PRIVATE_KEY_FILE: &str = "id_ed25519";
pub const PUBLIC_KEY_FILE: &str = "id_ed25519.pub";
pub const METADATA_FILE: &str = "metadata.json";

/// Outcome of the remote tier.
enum RemoteLookup {
    Found(SshKeyPair),
    /// Nothing stored yet; a generated key may be persisted.
    Missing,
    /// Something is stored but could not be used. A generated key must not
    /// overwrite it.
    Unreadable(String),
}

/// Acquires the platform SSH keypair from local disk, the remote store, or
/// fresh generation.
pub struct SshKeyManager {
    store: Arc<dyn KvStore>,
    resolver: Arc<NamespaceResolver>,
    key_dir: PathBuf,
    key_name: String,
}

impl SshKeyManager {
    pub fn new(
        store: Arc<dyn KvStore>,
        resolver: Arc<NamespaceResolver>,
        key_dir: PathBuf,
        key_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            resolver,
            key_dir,
            key_name: key_name.into(),
        }
    }

    pub fn key_dir(&self) -> &Path {
        &self.key_dir
    }

    pub fn private_key_path(&self) -> PathBuf {
        self.key_dir.join(PRIVATE_KEY_FILE)
    }

    pub fn public_key_path(&self) -> PathBuf {
        self.key_dir.join(PUBLIC_KEY_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.key_dir.join(METADATA_FILE)
    }

    /// Return the platform keypair, generating one if no tier has it.
    pub async fn get_or_create(&self, ctx: &AccountContext) -> Result<SshKeyAcquisition> {
        if let Some(key_pair) = self.load_local().await {
            debug!(fingerprint = %key_pair.fingerprint, "using local SSH key");
            return Ok(SshKeyAcquisition {
                key_pair,
                source: KeySource::Local,
                remote: PersistOutcome::Skipped("served from local cache".to_string()),
                local: PersistOutcome::Skipped("already cached".to_string()),
            });
        }

        let remote_block = match self.fetch_remote(ctx).await {
            RemoteLookup::Found(key_pair) => {
                debug!(fingerprint = %key_pair.fingerprint, "using remote SSH key");
                let local = self.write_through(&key_pair).await;
                return Ok(SshKeyAcquisition {
                    key_pair,
                    source: KeySource::Remote,
                    remote: PersistOutcome::Skipped("already stored remotely".to_string()),
                    local,
                });
            }
            RemoteLookup::Missing => None,
            RemoteLookup::Unreadable(reason) => {
                warn!(%reason, "remote SSH key unusable; generating a local-only key");
                Some(reason)
            }
        };

        let key_pair = generate_key_pair(&self.key_name)?;
        info!(fingerprint = %key_pair.fingerprint, key_name = %key_pair.key_name, "generated SSH key");

        let remote = match remote_block {
            Some(reason) => PersistOutcome::Skipped(format!("existing remote key unreadable: {reason}")),
            None => match self.persist_remote(ctx, &key_pair).await {
                Ok(()) => PersistOutcome::Persisted,
                Err(e) => {
                    warn!(error = %e, "failed to store SSH key remotely");
                    PersistOutcome::Failed(e.to_string())
                }
            },
        };
        let local = self.write_through(&key_pair).await;

        Ok(SshKeyAcquisition {
            key_pair,
            source: KeySource::Generated,
            remote,
            local,
        })
    }

    /// Load the local keypair, treating any unreadable state as a miss.
    pub async fn load_local(&self) -> Option<SshKeyPair> {
        match self.read_local().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(dir = %self.key_dir.display(), error = %e, "ignoring unreadable local SSH key cache");
                None
            }
        }
    }

    /// `Ok(None)` if any file is missing; an error if files exist but do not
    /// form a consistent keypair.
    async fn read_local(&self) -> Result<Option<SshKeyPair>> {
        let Some(private_pem) = read_optional(&self.private_key_path()).await? else {
            return Ok(None);
        };
        let Some(public_line) = read_optional(&self.public_key_path()).await? else {
            return Ok(None);
        };
        let Some(metadata) = read_optional(&self.metadata_path()).await? else {
            return Ok(None);
        };

        let metadata: SshKeyMetadata = serde_json::from_str(&metadata)?;
        let private_key = SecretString::new(private_pem);
        parse_pair(&private_key, Some(&public_line), Some(metadata), &self.key_name).map(Some)
    }

    /// Write the keypair to the local directory with owner-only permissions
    /// on the directory and the private key.
    pub async fn save_local(&self, key_pair: &SshKeyPair) -> Result<()> {
        tokio::fs::create_dir_all(&self.key_dir).await?;
        set_mode(&self.key_dir, 0o700).await?;

        let metadata = serde_json::to_string_pretty(&key_pair.metadata())?;

        write_file(
            &self.private_key_path(),
            key_pair.private_key.as_bytes(),
            0o600,
        )
        .await?;
        write_file(
            &self.public_key_path(),
            format!("{}\n", key_pair.public_key).as_bytes(),
            0o644,
        )
        .await?;
        write_file(&self.metadata_path(), metadata.as_bytes(), 0o644).await?;

        debug!(dir = %self.key_dir.display(), "wrote local SSH key");
        Ok(())
    }

    /// Remove the local copy (logout). Remote copies are left in place.
    pub async fn delete_local(&self) -> Result<()> {
        for path in [
            self.private_key_path(),
            self.public_key_path(),
            self.metadata_path(),
        ] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!(path = %path.display(), "removed local key file"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn write_through(&self, key_pair: &SshKeyPair) -> PersistOutcome {
        match self.save_local(key_pair).await {
            Ok(()) => PersistOutcome::Persisted,
            Err(e) => {
                warn!(dir = %self.key_dir.display(), error = %e, "failed to cache SSH key locally");
                PersistOutcome::Failed(e.to_string())
            }
        }
    }

    async fn fetch_remote(&self, ctx: &AccountContext) -> RemoteLookup {
        // A failed listing says nothing about what is stored, so it must
        // block persistence like any other unreadable remote state.
        let namespace_id = match self.resolver.lookup(ctx).await {
            Ok(Some(id)) => id,
            Ok(None) => return RemoteLookup::Missing,
            Err(e) => {
                warn!(error = %e, "could not resolve namespace for SSH key lookup");
                return RemoteLookup::Unreadable(e.to_string());
            }
        };

        let private_bytes = match self
            .store
            .get(ctx, &namespace_id, keys::SSH_PRIVATE_KEY)
            .await
        {
            Ok(bytes) => bytes,
            Err(SecretError::NotFound { .. }) => return RemoteLookup::Missing,
            Err(e) => return RemoteLookup::Unreadable(e.to_string()),
        };

        let record = match self
            .store
            .get(ctx, &namespace_id, keys::SSH_PUBLIC_KEY)
            .await
        {
            Ok(bytes) => match SshKeyRecord::from_bytes(&bytes) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "ignoring malformed remote public key record");
                    None
                }
            },
            Err(SecretError::NotFound { .. }) => None,
            Err(e) => return RemoteLookup::Unreadable(e.to_string()),
        };

        let private_key = match EncryptedSecret::from_bytes(&private_bytes)
            .and_then(|secret| crypto::decrypt(&secret.ciphertext, ctx.token()))
        {
            Ok(pem) => SecretString::new(pem),
            Err(e) => return RemoteLookup::Unreadable(e.to_string()),
        };

        let (public_line, metadata) = match record {
            Some(record) => (Some(record.public_key), Some(record.metadata)),
            None => (None, None),
        };

        match parse_pair(&private_key, public_line.as_deref(), metadata, &self.key_name) {
            Ok(pair) => RemoteLookup::Found(pair),
            Err(e) => RemoteLookup::Unreadable(e.to_string()),
        }
    }

    /// Encrypt and store both halves. The private half goes first so a
    /// partial write still leaves a recoverable key.
    async fn persist_remote(&self, ctx: &AccountContext, key_pair: &SshKeyPair) -> Result<()> {
        let namespace_id = self.resolver.ensure(ctx).await?;

        let ciphertext = crypto::encrypt(key_pair.private_key.expose_secret(), ctx.token())?;
        let secret = EncryptedSecret::new(ciphertext);
        self.store
            .put(ctx, &namespace_id, keys::SSH_PRIVATE_KEY, &secret.to_bytes()?)
            .await?;

        self.store
            .put(
                ctx,
                &namespace_id,
                keys::SSH_PUBLIC_KEY,
                &key_pair.record().to_bytes()?,
            )
            .await?;

        debug!(namespace = %namespace_id, "stored SSH key remotely");
        Ok(())
    }
}

/// Generate a new Ed25519 keypair named `key_name`.
pub fn generate_key_pair(key_name: &str) -> Result<SshKeyPair> {
    let private = PrivateKey::random(&mut OsRng, Algorithm::Ed25519)
        .map_err(|e| SecretError::KeyGeneration(e.to_string()))?;
    let pem = private
        .to_openssh(LineEnding::LF)
        .map_err(|e| SecretError::KeyGeneration(e.to_string()))?;

    let public = PublicKey::new(private.public_key().key_data().clone(), key_name);
    let public_key = public
        .to_openssh()
        .map_err(|e| SecretError::KeyGeneration(e.to_string()))?;

    Ok(SshKeyPair {
        private_key: SecretString::new(pem.as_str()),
        public_key,
        fingerprint: public.fingerprint(HashAlg::Sha256).to_string(),
        key_name: key_name.to_string(),
        created_at: Utc::now(),
    })
}

/// Rebuild a keypair from its stored parts, checking that they agree.
///
/// A missing public line or metadata is derived from the private key.
fn parse_pair(
    private_key: &SecretString,
    public_line: Option<&str>,
    metadata: Option<SshKeyMetadata>,
    default_key_name: &str,
) -> Result<SshKeyPair> {
    let private = PrivateKey::from_openssh(private_key.as_bytes())
        .map_err(|e| SecretError::Storage(format!("invalid private key: {e}")))?;
    let key_data = private.public_key().key_data();

    let key_name = metadata
        .as_ref()
        .map(|m| m.key_name.clone())
        .unwrap_or_else(|| default_key_name.to_string());

    let public = match public_line {
        Some(line) => {
            let public = PublicKey::from_openssh(line.trim())
                .map_err(|e| SecretError::Storage(format!("invalid public key: {e}")))?;
            if public.key_data() != key_data {
                return Err(SecretError::Storage(
                    "public key does not match private key".to_string(),
                ));
            }
            public
        }
        None => PublicKey::new(key_data.clone(), key_name.as_str()),
    };

    let fingerprint = public.fingerprint(HashAlg::Sha256).to_string();
    if let Some(metadata) = &metadata {
        if metadata.fingerprint != fingerprint {
            return Err(SecretError::Storage(format!(
                "fingerprint mismatch: recorded {}, computed {}",
                metadata.fingerprint, fingerprint
            )));
        }
    }

    let public_key = public
        .to_openssh()
        .map_err(|e| SecretError::Storage(format!("invalid public key: {e}")))?;

    Ok(SshKeyPair {
        private_key: private_key.clone(),
        public_key,
        fingerprint,
        key_name,
        created_at: metadata.map(|m| m.created_at).unwrap_or_else(Utc::now),
    })
}

async fn read_optional(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write `data` to `path` with `mode` on Unix. New files are created with the
/// mode; an existing file is tightened afterwards since `mode` only applies on
/// creation.
async fn write_file(path: &Path, data: &[u8], mode: u32) -> Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(mode);

    let mut file = options.open(path).await?;
    file.write_all(data).await?;
    file.flush().await?;
    set_mode(path, mode).await
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
