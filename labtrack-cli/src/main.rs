//! labtrack-cli: spreadsheet import and reconciliation for specimen tracking

mod cli;
mod config;
mod import;
mod staging;
mod store;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Import(args) => cli::commands::handle_import_command(args, &config).await,
        Commands::Stage(args) => cli::commands::handle_stage_command(args, &config),
        Commands::Staged => cli::commands::handle_staged_command(&config),
        Commands::Sweep => cli::commands::handle_sweep_command(&config),
    }
}
