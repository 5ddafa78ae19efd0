//! Config save/load roundtrip integration tests.

use std::path::Path;

use tempfile::TempDir;
use xanthus_core::config::{Config, ConfigBuilder};

#[test]
fn test_config_save_and_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("xanthus.json5");

    let config = Config::default();
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_config_modify_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("xanthus.json5");

    let config = ConfigBuilder::new()
        .namespace_title("Staging")
        .retry(5, 250)
        .ssh_key_name("ops-key")
        .build_validated()
        .unwrap();
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.remote.namespace_title, "Staging");
    assert_eq!(loaded.retry.max_attempts, 5);
    assert_eq!(loaded.retry.delay_ms, 250);
    assert_eq!(loaded.ssh.key_name, "ops-key");
}

#[test]
fn test_load_missing_file() {
    let result = Config::load(Path::new("/nonexistent/xanthus.json5"));
    assert!(result.is_err());
}

#[test]
fn test_hand_written_json5_with_comments() {
    let config = Config::parse(
        r#"{
            // shared staging account
            remote: { namespace_title: 'Staging', },
            retry: { max_attempts: 4 },
        }"#,
    )
    .unwrap();
    assert_eq!(config.remote.namespace_title, "Staging");
    assert_eq!(config.retry.max_attempts, 4);
    assert_eq!(config.retry.delay_ms, 2000);
}
