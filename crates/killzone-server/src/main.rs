//! Killzone match server.

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod protocol;
mod room;
mod server;

use server::{ServerConfig, ServerState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse address from env or use default
    let addr: SocketAddr = std::env::var("SERVER_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".into())
        .parse()?;

    let mut config = ServerConfig::default();
    if let Ok(seed) = std::env::var("KILLZONE_SEED") {
        config.base_seed = Some(seed.parse().context("KILLZONE_SEED must be a u64")?);
    }
    if let Ok(max_rooms) = std::env::var("KILLZONE_MAX_ROOMS") {
        config.max_rooms = max_rooms
            .parse()
            .context("KILLZONE_MAX_ROOMS must be a positive integer")?;
    }

    info!(?config, "Starting Killzone server...");

    let state = Arc::new(ServerState::new(config));

    server::run_server(addr, state).await
}
