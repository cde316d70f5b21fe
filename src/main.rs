use anyhow::Result;
use clap::Parser;
use mailcast::cli::{Cli, CliHandler};
use tracing::Level;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(log_level)
        .init();

    if cli.debug {
        tracing::debug!("Debug logging enabled");
    }

    let cli_handler = CliHandler::new(cli.config_dir).await?;
    cli_handler.handle_command(cli.command, cli.dry_run).await
}
