//! Xanthus CLI entry point.

use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use xanthus_cli::{run, Cli};
use xanthus_core::env::vars;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "xanthus=info",
        1 => "xanthus=debug",
        _ => "xanthus=trace",
    };

    // XANTHUS_LOG takes precedence over -v
    let registry = tracing_subscriber::registry().with(
        EnvFilter::try_from_env(vars::XANTHUS_LOG).unwrap_or_else(|_| default_level.into()),
    );
    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }

    run(cli).await
}
