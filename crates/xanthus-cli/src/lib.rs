//! Xanthus command-line interface.

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Xanthus - encrypted credentials and SSH keys for the platform
#[derive(Parser)]
#[command(name = "xanthus")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file
    #[arg(short, long, env = "XANTHUS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Manage encrypted provider credentials
    Secrets(commands::secrets::SecretsArgs),

    /// Manage the platform SSH key
    Ssh(commands::ssh::SshArgs),

    /// Forget this session's cached secrets and local SSH key
    Logout(commands::AccountArgs),

    /// Configuration management
    Config(commands::config::ConfigArgs),

    /// Show version information
    Version,
}

/// Run the CLI with the given arguments.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config;
    match cli.command {
        Commands::Secrets(args) => commands::secrets::run(args, config_path.as_deref()).await,
        Commands::Ssh(args) => commands::ssh::run(args, config_path.as_deref()).await,
        Commands::Logout(account) => commands::ssh::logout(account, config_path.as_deref()).await,
        Commands::Config(args) => commands::config::run(args, config_path.as_deref()).await,
        Commands::Version => {
            println!("xanthus {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
