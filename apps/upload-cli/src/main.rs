//! Oseh content uploader entry point.

mod app;
mod cli;
mod config;
mod render;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<ExitCode> {
    let cli = cli::Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = config::Config::load()?;
    tracing::debug!(api_url = %config.api_url, "configuration loaded");

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(app::run(cli.command, config))?;
    Ok(outcome.exit_code())
}
