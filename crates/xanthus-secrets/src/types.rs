//! Core types for credential and key distribution.
//!
//! The remote store only moves bytes. [`EncryptedSecret`] and
//! [`SshKeyRecord`] own their wire format and convert to and from those bytes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use xanthus_core::SecretString;

use crate::error::{Result, SecretError};

/// The caller's bearer token together with the remote account it belongs to.
///
/// The token authorizes every remote store call and is also the passphrase
/// source the cipher key is derived from.
#[derive(Clone)]
pub struct AccountContext {
    token: SecretString,
    account_id: String,
}

impl AccountContext {
    /// Create a new context.
    pub fn new(token: impl Into<SecretString>, account_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            account_id: account_id.into(),
        }
    }

    /// The bearer token.
    pub fn token(&self) -> &SecretString {
        &self.token
    }

    /// The remote account identifier.
    pub fn account_id(&self) -> &str {
        &self.account_id
    }
}

impl fmt::Debug for AccountContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountContext")
            .field("account_id", &self.account_id)
            .field("token", &self.token)
            .finish()
    }
}

/// A logical partition of the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    pub id: String,
    pub title: String,
}

/// An encrypted secret as stored remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedSecret {
    /// `base64(nonce || ciphertext || tag)`.
    pub ciphertext: String,

    /// When this value was written.
    pub updated_at: DateTime<Utc>,
}

impl EncryptedSecret {
    /// Wrap a ciphertext produced by [`crate::crypto::encrypt`].
    pub fn new(ciphertext: String) -> Self {
        Self {
            ciphertext,
            updated_at: Utc::now(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse a stored record. Unparseable bytes mean the record is corrupted,
    /// which callers must treat the same as a failed decryption.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| SecretError::DecryptionFailed(format!("malformed secret record: {e}")))
    }
}

/// Local metadata stored next to the key files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshKeyMetadata {
    pub fingerprint: String,
    pub key_name: String,
    pub created_at: DateTime<Utc>,
}

/// The public half of the platform keypair as stored remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshKeyRecord {
    /// `authorized_keys` line.
    pub public_key: String,

    #[serde(flatten)]
    pub metadata: SshKeyMetadata,
}

impl SshKeyRecord {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// The platform SSH keypair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshKeyPair {
    /// OpenSSH PEM private key.
    pub private_key: SecretString,

    /// `authorized_keys` line, including the key name as comment.
    pub public_key: String,

    /// `SHA256:` fingerprint of the public key.
    pub fingerprint: String,

    pub key_name: String,
    pub created_at: DateTime<Utc>,
}

impl SshKeyPair {
    pub fn metadata(&self) -> SshKeyMetadata {
        SshKeyMetadata {
            fingerprint: self.fingerprint.clone(),
            key_name: self.key_name.clone(),
            created_at: self.created_at,
        }
    }

    pub fn record(&self) -> SshKeyRecord {
        SshKeyRecord {
            public_key: self.public_key.clone(),
            metadata: self.metadata(),
        }
    }
}

/// Which tier satisfied an SSH key request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Local,
    Remote,
    Generated,
}

/// Result of a best-effort persistence step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    /// The write succeeded.
    Persisted,
    /// The write was intentionally not attempted.
    Skipped(String),
    /// The write was attempted and failed; the caller still has a usable key.
    Failed(String),
}

impl PersistOutcome {
    pub fn is_persisted(&self) -> bool {
        matches!(self, Self::Persisted)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// What [`crate::ssh::SshKeyManager::get_or_create`] did to produce a key.
#[derive(Debug, Clone)]
pub struct SshKeyAcquisition {
    pub key_pair: SshKeyPair,
    pub source: KeySource,
    /// Remote persistence of a generated key.
    pub remote: PersistOutcome,
    /// Write to the local key cache.
    pub local: PersistOutcome,
}
