//! Logical key naming.
//!
//! Keys are flat colon-delimited strings. The structure is a convention only;
//! the store does not enforce it.

/// Encrypted OpenSSH private key of the platform keypair.
pub const SSH_PRIVATE_KEY: &str = "config:ssh:private_key";

/// Public key record of the platform keypair.
pub const SSH_PUBLIC_KEY: &str = "config:ssh:public_key";

/// Logical key for a cloud provider's API key, e.g. `config:hetzner:api_key`.
pub fn provider_api_key(provider: &str) -> String {
    format!("config:{}:api_key", provider.to_ascii_lowercase())
}
