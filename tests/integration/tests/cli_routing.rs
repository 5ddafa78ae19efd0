//! CLI routing tests.
//!
//! Commands are parsed with the real `Cli` definition and dispatched
//! in-process, so no compiled binary or network access is needed.

use clap::Parser;
use tempfile::TempDir;
use xanthus_cli::{run, Cli, Commands};
use xanthus_core::config::Config;

fn parse(args: &[&str]) -> Cli {
    let mut argv = vec!["xanthus"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).expect("arguments should parse")
}

#[tokio::test]
async fn test_version_routes() {
    let cli = parse(&["version"]);
    assert!(matches!(cli.command, Commands::Version));
    run(cli).await.unwrap();
}

#[test]
fn test_unknown_command_rejected() {
    assert!(Cli::try_parse_from(["xanthus", "nonexistent-command"]).is_err());
}

#[test]
fn test_secrets_set_requires_provider() {
    assert!(Cli::try_parse_from(["xanthus", "secrets", "set"]).is_err());
}

#[tokio::test]
async fn test_config_init_set_get() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("xanthus.json5");
    let path_arg = path.to_str().unwrap();

    run(parse(&["--config", path_arg, "config", "init"]))
        .await
        .unwrap();
    run(parse(&[
        "--config",
        path_arg,
        "config",
        "set",
        "remote.namespace_title",
        "Staging",
    ]))
    .await
    .unwrap();
    run(parse(&["--config", path_arg, "config", "get", "remote.namespace_title"]))
        .await
        .unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.remote.namespace_title, "Staging");
    assert_eq!(loaded.retry, Config::default().retry);
}

#[tokio::test]
async fn test_config_set_rejects_invalid_value() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("xanthus.json5");
    let path_arg = path.to_str().unwrap();

    run(parse(&["--config", path_arg, "config", "init"]))
        .await
        .unwrap();
    let result = run(parse(&[
        "--config",
        path_arg,
        "config",
        "set",
        "retry.max_attempts",
        "0",
    ]))
    .await;

    assert!(result.is_err());
    assert_eq!(Config::load(&path).unwrap().retry.max_attempts, 3);
}

#[tokio::test]
async fn test_config_get_unknown_key_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing.json5");

    let result = run(parse(&[
        "--config",
        path.to_str().unwrap(),
        "config",
        "get",
        "remote.nope",
    ]))
    .await;
    assert!(result.is_err());
}
