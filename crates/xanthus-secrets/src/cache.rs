//! In-memory plaintext cache for freshly written secrets.
//!
//! Bridges the window between a local write to the remote store and that
//! write becoming visible to reads. Entries never expire on their own; they
//! are replaced by the next write and dropped on logout.

use std::collections::HashMap;

use parking_lot::RwLock;
use xanthus_core::SecretString;

/// Plaintext cache keyed by `(account_id, logical_key)`.
///
/// One coarse lock guards the whole map. It is held only for the map access
/// itself, never across I/O.
#[derive(Default)]
pub struct TempSecretCache {
    entries: RwLock<HashMap<(String, String), SecretString>>,
}

impl TempSecretCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an entry. Last write wins.
    pub fn set(&self, account_id: &str, key: &str, value: SecretString) {
        self.entries
            .write()
            .insert((account_id.to_string(), key.to_string()), value);
    }

    pub fn get(&self, account_id: &str, key: &str) -> Option<SecretString> {
        self.entries
            .read()
            .get(&(account_id.to_string(), key.to_string()))
            .cloned()
    }

    /// Drop every entry belonging to `account_id`.
    pub fn clear(&self, account_id: &str) {
        self.entries.write().retain(|(acct, _), _| acct != account_id);
    }

    /// Drop a single entry.
    pub fn clear_key(&self, account_id: &str, key: &str) {
        self.entries
            .write()
            .remove(&(account_id.to_string(), key.to_string()));
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
