//! Portal server binary.
//!
//! load config → init tracing → wire subsystems → install shutdown watcher → serve

use portal_core::bootstrap::AppContext;
use portal_core::config::AppConfig;
use portal_core::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    telemetry::init_tracing(&config.server, &config.features);

    let context = AppContext::init(config)?;
    // Installed before serving so an early signal is not lost.
    let _watcher = context.shutdown_watcher()?.spawn();

    let addr = context.config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        environment = %context.config.server.environment,
        realtime = context.hub.is_some(),
        "Portal server listening"
    );

    axum::serve(listener, context.router()).await?;
    Ok(())
}
