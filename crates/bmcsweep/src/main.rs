//! bmcsweep
//!
//! Finds BMCs on the network, crawls their Redfish inventory and forwards it
//! to an inventory service.

use clap::Parser;
use color_eyre::Result;
use tracing::{debug, warn};

mod cli;
mod commands;
mod config;
mod logging;

use cli::{Cli, Commands};
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let config_path = cli.config.clone().or_else(Config::locate);
    let config = match &config_path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    logging::init(level, cli.log_format)?;

    match &config_path {
        Some(path) => debug!(path = %path.display(), "loaded config"),
        None => warn!("no config file found, using defaults"),
    }

    match cli.command {
        Commands::Scan(args) => commands::scan::run(args, &config).await,
        Commands::Collect(args) => commands::collect::run(args, &config).await,
        Commands::Crawl(args) => commands::crawl::run(args, &config).await,
        Commands::Secrets(command) => commands::secrets::run(command, &config),
    }
}
