//! Error types for credential and key distribution.

use thiserror::Error;

/// Errors that can occur during secret operations.
#[derive(Debug, Error)]
pub enum SecretError {
    /// A third-party provider rejected the credential. Never stored.
    #[error("{provider} rejected the credential: {message}")]
    Validation { provider: String, message: String },

    /// No record exists for the key, even after retries.
    #[error("Secret not configured: {key}")]
    NotConfigured { key: String },

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// The remote store has no value under this key (possibly not yet visible).
    #[error("Key not found in remote store: {key}")]
    NotFound { key: String },

    /// Transport or server-side failure talking to the remote store.
    #[error("Remote store error during {operation}: {message}")]
    Remote { operation: String, message: String },

    /// The remote store refused the request as malformed.
    #[error("Invalid remote request during {operation}: {message}")]
    InvalidRequest { operation: String, message: String },

    /// The bearer token was not accepted by the remote store.
    #[error("Unauthorized during {operation}: {message}")]
    Unauthorized { operation: String, message: String },

    /// Key material could not be synthesized. No partial key is ever returned.
    #[error("SSH key generation failed: {0}")]
    KeyGeneration(String),

    /// Local key cache could not be read or written.
    #[error("Local storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SecretError {
    /// Create a remote transport error.
    pub fn remote(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a validation error.
    pub fn validation(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Append the logical `key` to the operation of a remote-store error.
    /// Other variants are returned unchanged.
    pub fn with_key(self, key: &str) -> Self {
        match self {
            Self::Remote { operation, message } => Self::Remote {
                operation: format!("{operation} {key}"),
                message,
            },
            Self::InvalidRequest { operation, message } => Self::InvalidRequest {
                operation: format!("{operation} {key}"),
                message,
            },
            Self::Unauthorized { operation, message } => Self::Unauthorized {
                operation: format!("{operation} {key}"),
                message,
            },
            other => other,
        }
    }

    /// Whether a read that failed with this error may succeed if repeated.
    ///
    /// Only missing keys (propagation lag) and transport failures qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Remote { .. })
    }

    /// Message suitable for showing to an operator.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { provider, message } => {
                format!("The {provider} credential was rejected ({message}). Nothing was saved.")
            }
            Self::NotConfigured { key } => {
                format!("'{key}' has not been configured yet. Run first-time setup to store it.")
            }
            Self::DecryptionFailed(_) => "A stored secret could not be decrypted. The API token \
                 may differ from the one used to save it, or the record is corrupted."
                .to_string(),
            Self::Unauthorized { .. } => {
                "The remote store rejected the API token. Check its permissions.".to_string()
            }
            Self::Remote { .. } | Self::NotFound { .. } => {
                "The remote store is unreachable right now. Try again shortly.".to_string()
            }
            Self::KeyGeneration(_) => "Could not generate an SSH key.".to_string(),
            other => other.to_string(),
        }
    }
}

/// Convenience result alias for secret operations.
pub type Result<T> = std::result::Result<T, SecretError>;
