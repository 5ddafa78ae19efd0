//! SSH key commands.

use std::path::Path;

use clap::Args;
use xanthus_secrets::{KeySource, PersistOutcome};

use super::{load_config, service, user_error, AccountArgs};

/// SSH command arguments.
#[derive(Args)]
pub struct SshArgs {
    #[command(subcommand)]
    pub command: SshCommand,
}

#[derive(clap::Subcommand)]
pub enum SshCommand {
    /// Show the platform SSH key, creating it if needed
    Show {
        #[command(flatten)]
        account: AccountArgs,
    },

    /// Print the local key directory
    Path,
}

/// Run the ssh command.
pub async fn run(args: SshArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    match args.command {
        SshCommand::Show { account } => {
            let svc = service(&config)?;
            let acquired = svc
                .get_or_create_ssh_key(&account.context())
                .await
                .map_err(user_error)?;

            let key = &acquired.key_pair;
            println!("{}", key.public_key);
            println!("  Fingerprint: {}", key.fingerprint);
            println!("  Source:      {}", source_label(acquired.source));
            if acquired.source != KeySource::Local {
                println!("  Remote:      {}", outcome_label(&acquired.remote));
                println!("  Local:       {}", outcome_label(&acquired.local));
            }
        }

        SshCommand::Path => {
            println!("{}", config.ssh_key_dir()?.display());
        }
    }

    Ok(())
}

/// Drop cached secrets and the local SSH key copy.
pub async fn logout(account: AccountArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let svc = service(&config)?;
    svc.logout(&account.context()).await.map_err(user_error)?;

    println!("Removed local SSH key from {}", svc.ssh().key_dir().display());
    Ok(())
}

fn source_label(source: KeySource) -> &'static str {
    match source {
        KeySource::Local => "local cache",
        KeySource::Remote => "remote store",
        KeySource::Generated => "newly generated",
    }
}

fn outcome_label(outcome: &PersistOutcome) -> String {
    match outcome {
        PersistOutcome::Persisted => "saved".to_string(),
        PersistOutcome::Skipped(reason) => format!("skipped ({reason})"),
        PersistOutcome::Failed(reason) => format!("FAILED ({reason})"),
    }
}
