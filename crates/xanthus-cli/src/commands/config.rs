//! Configuration management commands.

use std::path::Path;

use clap::Args;
use serde_json::Value;
use xanthus_core::config::Config;
use xanthus_core::paths;

/// Config command arguments.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(clap::Subcommand)]
pub enum ConfigCommand {
    /// Show configuration
    Show,

    /// Get a configuration value
    Get {
        /// Configuration key (dot-separated path, e.g. retry.max_attempts)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,

        /// Value to set
        value: String,
    },

    /// Write a default configuration file
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Show configuration file path
    Path,

    /// Validate configuration
    Validate,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => paths::config_file()?,
    };

    match args.command {
        ConfigCommand::Show => {
            let config = load_or_default(&path)?;
            println!("{}", config.to_json5()?);
        }

        ConfigCommand::Get { key } => {
            let json = serde_json::to_value(load_or_default(&path)?)?;
            match get_path(&json, &key) {
                Some(v) => println!("{}", serde_json::to_string_pretty(v)?),
                None => anyhow::bail!("Key not found: {}", key),
            }
        }

        ConfigCommand::Set { key, value } => {
            let updated = set_path(&load_or_default(&path)?, &key, &value)?;
            updated.validate()?;
            updated.save(&path)?;
            println!("Set {} = {}", key, value);
        }

        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists: {:?}. Use --force to overwrite.",
                    path
                );
            }
            Config::default().save(&path)?;
            println!("Created config file: {:?}", path);
        }

        ConfigCommand::Path => {
            println!("{}", path.display());
        }

        ConfigCommand::Validate => match Config::load(&path) {
            Ok(config) => match config.with_env_overrides().validate() {
                Ok(()) => println!("Configuration is valid"),
                Err(e) => anyhow::bail!("Configuration error: {}", e),
            },
            Err(e) => anyhow::bail!("Failed to load config: {}", e),
        },
    }

    Ok(())
}

/// Load the file at `path`, falling back to defaults when it does not exist.
/// Environment overrides are not applied so `set` never persists them.
fn load_or_default(path: &Path) -> anyhow::Result<Config> {
    match Config::load(path) {
        Ok(config) => Ok(config),
        Err(xanthus_core::ConfigError::NotFound(_)) => Ok(Config::default()),
        Err(e) => Err(e.into()),
    }
}

fn get_path<'a>(json: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.').try_fold(json, |acc, k| acc.get(k))
}

/// Set `key` to `value` on a copy of `config`. The value is parsed as JSON
/// first (numbers, bools, null) and falls back to a plain string.
fn set_path(config: &Config, key: &str, value: &str) -> anyhow::Result<Config> {
    let mut json = serde_json::to_value(config)?;

    let parts: Vec<&str> = key.split('.').collect();
    let mut current = &mut json;
    for (i, part) in parts.iter().enumerate() {
        if i == parts.len() - 1 {
            let parsed: Value = serde_json::from_str(value)
                .unwrap_or_else(|_| Value::String(value.to_string()));
            current[part] = parsed;
        } else {
            if !current.get(part).map_or(false, |v| v.is_object()) {
                current[part] = serde_json::json!({});
            }
            current = &mut current[part];
        }
    }

    serde_json::from_value(json)
        .map_err(|e| anyhow::anyhow!("Invalid configuration after set: {}", e))
}
