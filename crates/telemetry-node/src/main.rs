//! Telemetry Node - Main Entry Point
//!
//! Usage: `telemetry-node [CONFIG]` (defaults to `telemetry-node.toml`).
//! Records are streamed to stdout; logs go to stderr.

use std::time::Duration;
use telemetry_node::config::DEFAULT_CONFIG_FILE;
use telemetry_node::{init_logging, run_node, NodeConfig};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());
    let config = NodeConfig::load(&path)?;
    init_logging(&config.log)?;

    info!("=== Telemetry Node v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Configuration: {:?}", config);

    let run_seconds = config.run_seconds;
    let shutdown = async move {
        let limit = async {
            if run_seconds > 0 {
                tokio::time::sleep(Duration::from_secs(run_seconds)).await;
            } else {
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => info!("Interrupt received, shutting down"),
                Err(e) => warn!("Failed to listen for interrupt, shutting down: {}", e),
            },
            _ = limit => info!("Run time of {} s reached", run_seconds),
        }
    };

    let stdout = std::io::stdout();
    let summary = run_node(&config, stdout.lock(), shutdown).await?;

    if summary.peer.malformed > 0 {
        warn!("Peer saw {} malformed lines", summary.peer.malformed);
    }

    Ok(())
}
