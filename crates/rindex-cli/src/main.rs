use clap::Parser;
use tracing::Level;

mod cli;
mod commands;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    // check-config installs the configured level during bootstrap unless
    // --verbose already pinned DEBUG.
    if cli.verbose {
        rindex_runtime::init_logging(Level::DEBUG);
    } else if !matches!(cli.command, cli::Command::CheckConfig(_)) {
        rindex_runtime::init_logging(Level::WARN);
    }
    commands::run_command(cli).await
}
