use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use mavericks_server::config::Settings;
use mavericks_server::event_bus::SystemClock;
use mavericks_server::{api, AgentSystem, MavericksError};

// ============================================================================
// Server
// ============================================================================

async fn run(settings: Settings) -> mavericks_server::Result<()> {
    let system = Arc::new(AgentSystem::new(&settings.bus, Arc::new(SystemClock)));
    if system.start_background_tasks().is_some() {
        info!(
            interval_secs = settings.bus.sweep_interval_secs,
            "Dead-letter sweeper started"
        );
    }

    let addr = format!("{}:{}", &settings.basic.host, &settings.basic.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| MavericksError::Bind {
            addr: addr.clone(),
            source,
        })?;
    info!("Starting server on http://{}", addr);

    axum::serve(listener, api::router(system.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    system.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::new()
        .map_err(MavericksError::from)
        .context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log.level)),
        )
        .init();

    info!("Starting Mavericks agent server");

    run(settings).await.map_err(|e| {
        error!("Server error: {}", e);
        e.into()
    })
}
