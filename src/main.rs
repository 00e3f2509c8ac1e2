mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use pixbox::config::Config;
use pixbox::manager::build_dispatcher;
use pixbox::observability::{Metrics, init_tracing};
use std::sync::Arc;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    let metrics = Arc::new(Metrics::new());
    let dispatcher = Arc::new(build_dispatcher(&config, Arc::clone(&metrics))?);

    match cli.command {
        Commands::Load(args) => commands::load(dispatcher, args).await?,
        Commands::Route(args) => commands::route(&dispatcher, args)?,
    }

    debug!(metrics = ?metrics.snapshot(), "Done");
    Ok(())
}
