//! MCP server binary entry point.

use anyhow::Result;
use relicta_mcp::{config::ServerConfig, server::ReleaseServer};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!(
        "Starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let config = ServerConfig::from_env()?;
    info!(transport = ?config.transport, log_level = %config.log_level.as_str(), "Configuration loaded");

    let server = ReleaseServer::builder().config(config).build()?;
    warn!("No release adapter attached; relicta.* tools will report it as not configured.");

    info!("MCP server ready, waiting for connections...");

    server.run().await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("relicta_mcp=info,warn"));

    // stdout carries the protocol, so logs go to stderr
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .json()
        .init();
}
