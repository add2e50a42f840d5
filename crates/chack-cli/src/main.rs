mod cli;
mod commands;
mod console;
mod error;
mod setup;

use anyhow::Result;
use chack_core::config::{ChackConfig, resolve_config_path};
use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error::handle_error(err);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let path = cli.config.clone().unwrap_or_else(resolve_config_path);
    let config = ChackConfig::load(&path)?;

    let _guard = setup::init_logging(&config.logging, &config.config_dir, cli.verbose)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => commands::run::run(config).await,
        Commands::Check => commands::check::run(&config),
        Commands::Memory { command } => commands::memory::run(&config, command),
    }
}
