pub mod cli;
pub mod core;
pub mod providers;

use crate::core::QuoteSession;
use crate::core::config::AppConfig;
use crate::providers::awesome_api::AwesomeApiProvider;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    Show,
    Watch,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("fxwatch starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let provider = Arc::new(AwesomeApiProvider::new(
        &config.provider.base_url,
        config.provider.timeout(),
    ));
    let session = QuoteSession::start(provider, config.pairs);

    match command {
        AppCommand::Show => cli::quotes::show(session).await,
        AppCommand::Watch => cli::quotes::watch(session).await,
    }
}
