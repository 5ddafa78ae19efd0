//! Shared fixtures for the Xanthus integration tests.

use std::sync::Arc;

use tempfile::TempDir;
use xanthus_core::config::{Config, ConfigBuilder};
use xanthus_secrets::{AccountContext, CredentialService, MemoryKvStore, TempSecretCache};

/// One process's view of a shared in-memory remote store.
pub struct Node {
    pub service: CredentialService,
    /// Keeps the node's local key directory alive.
    pub home: TempDir,
}

/// Config pointing the SSH key cache into `home`.
pub fn node_config(home: &TempDir) -> Config {
    ConfigBuilder::new()
        .ssh_key_dir(home.path().join("ssh"))
        .build()
}

/// A fresh node (own cache, own key directory) over `store`.
pub fn node(store: &Arc<MemoryKvStore>) -> Node {
    let home = TempDir::new().expect("tempdir");
    let service = CredentialService::with_store(
        &node_config(&home),
        store.clone(),
        Arc::new(TempSecretCache::new()),
    )
    .expect("service");
    Node { service, home }
}

pub fn account() -> AccountContext {
    AccountContext::new("tok-abc", "acct-1")
}
