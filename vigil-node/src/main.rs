use anyhow::Context;
use clap::Parser;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vigil_config::ConfigWarnings;
use vigil_node::{
    cli::{Cli, Command},
    node,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let load = cli
        .config
        .loader()
        .load()
        .context("failed to load configuration")?;

    if cli.command == Some(Command::CheckConfig) {
        let report = json!({
            "warnings": load.warnings,
            "config": load.config,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load.config;
    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    log_warnings(&load.warnings);

    info!(
        chain_id = config.chain.id,
        cadence = config.inspection.cadence,
        local_mode = config.local_mode.enable,
        "starting vigil node"
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(node::cancel_on_ctrl_c(shutdown.clone()));

    node::run(config, shutdown).await
}

fn log_warnings(warnings: &ConfigWarnings) {
    for warning in &warnings.items {
        match &warning.hint {
            Some(hint) => {
                warn!(message = %warning.message, hint = %hint, "configuration warning")
            }
            None => warn!(message = %warning.message, "configuration warning"),
        }
    }
}
