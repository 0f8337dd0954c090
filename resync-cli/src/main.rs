use anyhow::Result;
use clap::Parser;
use resync_cli::cli::Cli;
use resync_cli::{commands, wiring::Runtime};
use resync_config::ResyncConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing();

    let config = match &cli.config {
        Some(path) => ResyncConfig::load_from(path)?,
        None => ResyncConfig::load()?,
    };

    let runtime = Runtime::build(config).await?;
    commands::execute(cli.command, &runtime).await
}

/// Tracing goes to stderr so stdout stays clean for command output
/// (e.g. `resync chat "..." > reply.txt 2> debug.log`).
fn setup_tracing() {
    use std::io;
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}
