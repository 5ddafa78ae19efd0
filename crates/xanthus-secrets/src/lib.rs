//! Credential and SSH key distribution for Xanthus.
//!
//! Secrets are encrypted with AES-256-GCM under a key derived from the
//! caller's bearer token and persisted to an eventually-consistent remote
//! key-value store. There is no separate master key.
//!
//! [`CredentialService`] is the entry point. It layers a process-local
//! [`TempSecretCache`] and bounded read retries over the store, and delegates
//! SSH key acquisition to [`SshKeyManager`].

pub mod cache;
pub mod crypto;
pub mod error;
pub mod keys;
pub mod retry;
pub mod service;
pub mod ssh;
pub mod store;
pub mod types;
pub mod validate;

pub use cache::TempSecretCache;
pub use error::{Result, SecretError};
pub use retry::{ConsistencyRetrier, RetryPolicy};
pub use service::CredentialService;
pub use ssh::SshKeyManager;
pub use store::{CloudflareKv, KvStore, MemoryKvStore, NamespaceResolver};
pub use types::{
    AccountContext, EncryptedSecret, KeySource, Namespace, PersistOutcome, SshKeyAcquisition,
    SshKeyPair, SshKeyRecord,
};
pub use validate::{CloudflareTokenValidator, CredentialValidator, HetznerValidator};
