//! CLI driving validator and delegator stake through the staking saga.

mod cli;
mod config;
mod handlers;

use anyhow::{Error, Result};
use clap::Parser;
use stakeflow_common::logging::{self, LoggerConfig};
use tracing::debug;

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<(), Error> {
    logging::init(LoggerConfig::from_env("stakeflow-cli"))?;

    let cli = cli::Cli::parse();
    let config = Config::load(&cli.config)?;
    debug!(config_path = %cli.config.display(), "loaded config");

    handlers::handle(cli.command, config).await
}
