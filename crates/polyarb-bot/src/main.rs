//! polyarb bot - Entry Point
//!
//! Starts the live dashboard; the trading engine writes into
//! `Application::state()`.

use std::path::Path;

use anyhow::Result;
use clap::Parser;
use polyarb_bot::{AppConfig, Application};
use tracing::{info, warn};

/// polyarb bot with live dashboard
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via POLYARB_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Dashboard port (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is loaded before logging: the dashboard log layer needs the state it sizes.
    let config_path = AppConfig::resolve_path(args.config);
    let config_found = Path::new(&config_path).exists();
    let mut config = if config_found {
        AppConfig::from_file(&config_path)?
    } else {
        AppConfig::default()
    };
    if let Some(port) = args.port {
        config.dashboard.port = port;
    }

    let app = Application::new(config)?;
    app.init_logging()?;

    info!("Starting polyarb v{}", env!("CARGO_PKG_VERSION"));
    if config_found {
        info!(config_path = %config_path, "Configuration loaded");
    } else {
        warn!(path = %config_path, "Config file not found, using defaults");
    }

    app.run().await?;

    Ok(())
}
