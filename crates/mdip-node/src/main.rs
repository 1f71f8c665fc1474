//! MDIP Gatekeeper node: entry point.
//!
//! Starts the node with configuration from a TOML file or defaults.

mod api;
mod config;
mod node;
mod state;
mod storage;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use config::NodeConfig;
use node::GatekeeperNode;

/// MDIP Gatekeeper node
#[derive(Parser, Debug)]
#[command(name = "mdip-node", version, about = "MDIP Gatekeeper node")]
struct Args {
    /// Path to the configuration file (TOML).
    #[arg(short, long, default_value = "mdip.toml")]
    config: PathBuf,

    /// Override the API port.
    #[arg(long)]
    api_port: Option<u16>,

    /// Override the data directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override the DID prefix.
    #[arg(long)]
    did_prefix: Option<String>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Override the log format (text, json).
    #[arg(long)]
    log_format: Option<String>,

    /// Generate a default config file and exit.
    #[arg(long)]
    init: bool,
}

fn init_tracing(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("received shutdown signal");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Handle --init flag
    if args.init {
        let config = NodeConfig::default();
        config.save(&args.config)?;
        println!("wrote default config to {}", args.config.display());
        return Ok(());
    }

    // Load configuration
    let mut config = NodeConfig::load(&args.config)?;

    // Apply CLI overrides
    if let Some(api_port) = args.api_port {
        config.api.port = api_port;
    }
    if let Some(ref data_dir) = args.data_dir {
        config.storage.data_dir = data_dir.clone();
    }
    if let Some(prefix) = args.did_prefix {
        config.gatekeeper.did_prefix = prefix;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    if let Some(format) = args.log_format {
        config.logging.format = format;
    }

    config.validate()?;

    init_tracing(&config.logging.level, &config.logging.format);
    tracing::info!("MDIP Gatekeeper node v{}", env!("CARGO_PKG_VERSION"));

    let mut node = GatekeeperNode::new(config);
    node.start().await?;

    shutdown_signal().await;

    node.shutdown().await?;
    tracing::info!("Gatekeeper node exited cleanly");
    Ok(())
}
