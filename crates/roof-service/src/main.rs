//! Observatory Roof Service Daemon (roofd)

use roof_service::ServiceConfig;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("roof_service=debug,info")
        .init();

    info!("Starting Observatory Roof Service v{}", env!("CARGO_PKG_VERSION"));

    let config = ServiceConfig::load().await?;

    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C signal handler");
        info!("received shutdown signal");
    };

    if let Err(e) = roof_service::run(config, shutdown_signal).await {
        error!("service error: {e}");
        return Err(e.into());
    }

    info!("roofd stopped");
    Ok(())
}
