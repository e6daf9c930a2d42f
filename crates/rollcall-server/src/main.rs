//! # rollcall-server
//!
//! HTTP server for the rollcall attendance system.
//!
//! ## Running
//!
//! ```bash
//! ROLLCALL__AUTH__JWT_SECRET=change-me cargo run --package rollcall-server
//! ```
//!
//! Configuration is read from `ROLLCALL_CONFIG` (or the platform config
//! directory) and `ROLLCALL__SECTION__KEY` environment overrides.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::sync::Arc;

use anyhow::Context;
use rollcall_core::Config;
use rollcall_server::api::create_router;
use rollcall_server::logging;
use rollcall_server::state::AppState;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    logging::init(config.server.production)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        production = config.server.production,
        "Starting rollcall-server"
    );

    let bind_address = config.server.bind_address.clone();
    let state = Arc::new(AppState::from_config(config).await?);
    let app = create_router(state);

    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;

    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Shutdown signal received");
}
