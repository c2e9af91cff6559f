//! FIFU - inter-architecture resource gateway

mod cli;

use anyhow::Context;
use clap::Parser;
use cli::Cli;
use fifu_runtime::{Gateway, GatewayConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let catalog = fifu_plugins::builtin_catalog();
    if cli.list_plugins {
        println!("protocols:  {}", catalog.protocol_kinds().join(", "));
        println!("converters: {}", catalog.converter_kinds().join(", "));
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => GatewayConfig::from_file_with_env(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => GatewayConfig::default(),
    };
    cli.apply(&mut config);

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_filter(&config)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let gateway = Gateway::from_config(&config, catalog).context("failed to start gateway")?;
    gateway.start()?;
    info!(
        schemes = ?gateway.router().registry().schemes(),
        mappings = gateway.router().mapping_count(),
        "gateway running, press Ctrl-C to stop"
    );

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(tokio::signal::ctrl_c())?;

    info!("interrupt received, shutting down");
    gateway.shutdown();
    Ok(())
}
