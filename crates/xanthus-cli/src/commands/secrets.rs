//! Secret management commands.
//!
//! Provides `xanthus secrets set|get` for provider API keys stored through
//! the `xanthus-secrets` crate.

use std::path::Path;

use clap::Args;
use xanthus_core::{Config, SecretString};
use xanthus_secrets::{keys, CloudflareTokenValidator, CredentialValidator, HetznerValidator};

use super::{load_config, service, user_error, AccountArgs};

/// Secrets command arguments.
#[derive(Args)]
pub struct SecretsArgs {
    #[command(subcommand)]
    pub command: SecretsCommand,
}

#[derive(clap::Subcommand)]
pub enum SecretsCommand {
    /// Validate and store a provider API key (prompts for value)
    Set {
        /// Provider name, e.g. hetzner
        provider: String,

        #[command(flatten)]
        account: AccountArgs,

        /// Key value (if omitted, prompts for hidden input)
        #[arg(long)]
        value: Option<String>,

        /// Store without probing the provider
        #[arg(long)]
        no_validate: bool,
    },

    /// Retrieve a provider API key
    Get {
        /// Provider name
        provider: String,

        #[command(flatten)]
        account: AccountArgs,

        /// Print the full value instead of a masked preview
        #[arg(long)]
        reveal: bool,
    },
}

/// Run the secrets command.
pub async fn run(args: SecretsArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let svc = service(&config)?;

    match args.command {
        SecretsCommand::Set {
            provider,
            account,
            value,
            no_validate,
        } => {
            let value = match value {
                Some(v) => v,
                None => {
                    let prompt = format!("Enter {provider} API key: ");
                    rpassword::prompt_password(prompt)
                        .map_err(|e| anyhow::anyhow!("Failed to read secret: {}", e))?
                }
            };
            if value.is_empty() {
                anyhow::bail!("Secret value must not be empty");
            }
            let value = SecretString::new(value);
            let ctx = account.context();

            let key = if no_validate {
                let key = keys::provider_api_key(&provider);
                svc.set_secret(&ctx, &key, &value).await.map_err(user_error)?;
                key
            } else {
                let validator = validator_for(&provider, &config)?;
                svc.set_validated_secret(&ctx, &value, validator.as_ref())
                    .await
                    .map_err(user_error)?
            };

            println!("Stored '{}'.", key);
        }

        SecretsCommand::Get {
            provider,
            account,
            reveal,
        } => {
            let key = keys::provider_api_key(&provider);
            let value = svc
                .get_secret(&account.context(), &key)
                .await
                .map_err(user_error)?;

            if reveal {
                println!("{}", value.expose_secret());
            } else {
                println!("{} = {}", key, mask(value.expose_secret()));
            }
        }
    }

    Ok(())
}

/// Validator for a provider this CLI knows how to probe.
fn validator_for(provider: &str, config: &Config) -> anyhow::Result<Box<dyn CredentialValidator>> {
    let validator: Box<dyn CredentialValidator> = match provider.to_ascii_lowercase().as_str() {
        "hetzner" => Box::new(
            HetznerValidator::new(config.providers.hetzner_api_base.as_str()).map_err(user_error)?,
        ),
        "cloudflare" => Box::new(
            CloudflareTokenValidator::new(config.remote.api_base.as_str()).map_err(user_error)?,
        ),
        other => anyhow::bail!(
            "No validator for provider '{}'. Pass --no-validate to store it anyway.",
            other
        ),
    };
    Ok(validator)
}

/// Show the first four characters of a secret.
fn mask(value: &str) -> String {
    let prefix: String = value.chars().take(4).collect();
    if value.chars().count() <= 8 {
        "********".to_string()
    } else {
        format!("{prefix}********")
    }
}
