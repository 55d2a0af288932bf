//! `roofd`: the HTTP/SSE daemon that exposes a [`roof_controller::RoofController`]
//! over the network.

#![deny(clippy::unwrap_used)]
#![warn(missing_docs, missing_debug_implementations)]

pub mod api;
pub mod config;
pub mod error;

use std::sync::Arc;

use anyhow::{Context, Result};
use roof_controller::{ControllerConfig, RoofController};
use roof_hal::HatPort;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub use config::ServiceConfig;

/// Build the default `HatPort` backend for this build: the in-memory
/// simulator unless the `hardware` feature is enabled, in which case a
/// real MCP23017-class HAT is opened.
#[cfg(not(feature = "hardware"))]
fn default_hat(_config: &ControllerConfig) -> Arc<dyn HatPort> {
    use std::time::Duration;
    Arc::new(roof_hal::sim::SimulatedHat::new(3, Duration::from_millis(5)))
}

#[cfg(feature = "hardware")]
fn default_hat(config: &ControllerConfig) -> Result<Arc<dyn HatPort>> {
    let rpi_config = roof_hal::rpi::RpiHatConfig {
        bus: 1,
        address: 0x20,
        max_attempts: config.max_relay_retry_attempts,
        retry_delay: config.relay_retry_delay,
        poll_interval: config.poll_interval,
    };
    let hat = roof_hal::rpi::Mcp23017Hat::open(rpi_config).context("opening Raspberry Pi HAT")?;
    Ok(Arc::new(hat))
}

/// Construct the controller, initialize it, and serve the HTTP/SSE API
/// until `shutdown` resolves.
pub async fn run(config: ServiceConfig, shutdown: impl std::future::Future<Output = ()>) -> Result<()> {
    #[cfg(not(feature = "hardware"))]
    let hat = default_hat(&config.controller);
    #[cfg(feature = "hardware")]
    let hat = default_hat(&config.controller)?;

    let controller = RoofController::new(hat, config.controller)
        .map_err(|e| anyhow::anyhow!("invalid controller configuration: {e}"))?;

    let cancel = CancellationToken::new();
    controller
        .initialize(cancel.clone())
        .await
        .map_err(|e| anyhow::anyhow!("controller initialization failed: {e}"))?;
    info!("roof controller initialized");

    let router = api::router(controller.clone());
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "roofd listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server error")?;

    cancel.cancel();
    let _ = controller.dispose().await;
    info!("roofd stopped");
    Ok(())
}
