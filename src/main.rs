//! pollcast-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use pollcast_gateway::config::GatewayConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = GatewayConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        addr = %config.listen_addr,
        persistence = config.persistence_enabled,
        "starting pollcast-gateway"
    );

    pollcast_gateway::server::run(config).await
}
