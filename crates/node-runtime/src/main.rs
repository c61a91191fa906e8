//! Node entry point.
//!
//! Usage: `node-runtime [config.json]`. Runs until interrupted, then
//! shuts the engine down with a bounded deadline.

use anyhow::{Context, Result};
use node_runtime::config::NodeConfig;
use node_runtime::NodeRuntime;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => NodeConfig::load(path)?,
        None => {
            warn!("[node] no config given, using defaults with an ephemeral identity");
            NodeConfig::default()
        }
    };

    let node = NodeRuntime::start(config).await?;
    info!("[node] running, press ctrl-c to stop");

    tokio::signal::ctrl_c()
        .await
        .context("waiting for interrupt")?;
    node.shutdown(SHUTDOWN_DEADLINE).await?;
    info!("[node] bye");
    Ok(())
}
