//! # xanthus-core
//!
//! Shared plumbing used across the Xanthus crates:
//!
//! - **Configuration**: Loading, validation, and persistence of `xanthus.json5`
//! - **Secrets**: [`SecretString`], a zero-on-drop string for tokens and keys
//! - **Utilities**: Path resolution and environment variable handling

pub mod config;
pub mod env;
pub mod error;
pub mod paths;
pub mod secret;

// Re-exports for convenience
pub use config::Config;
pub use error::ConfigError;
pub use secret::SecretString;
