use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.global.log_level)?;

    match &cli.command {
        Commands::Migrate(args) => commands::migrate(args, &cli.global),
        Commands::Status(source) => commands::status(source, &cli.global),
        Commands::UpdateConfig(args) => commands::update_config(args, &cli.global),
        Commands::Get { key } => commands::get(key, &cli.global),
        Commands::Set { key, value } => commands::set(key, value, &cli.global),
        Commands::List { json } => commands::list(*json, &cli.global),
    }
}

/// Logs go to stderr so `get` and `list` output stays scriptable.
fn init_tracing(level: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(level)?)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
    Ok(())
}

fn log_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(level).with_context(|| format!("invalid log level {level:?}"))
}
