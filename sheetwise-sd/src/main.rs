//! sheetwise-sd - Sheet-to-Digital Conversion Service
//!
//! Accepts uploaded sheet music images, runs the external OMR engine to
//! produce MusicXML, optionally encodes a MIDI rendition, and serves the
//! packaged results for download.

use anyhow::Result;
use sheetwise_sd::services::{cleanup, omr_engine::OmrEngine};
use sheetwise_sd::{build_router, AppState, ServiceConfig};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Log build identification immediately after tracing init
    info!(
        "Starting Sheetwise Sheet-to-Digital (sheetwise-sd) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    // Resolve configuration and bootstrap the data folder
    let config = Arc::new(ServiceConfig::load());
    info!("Data folder: {}", config.dirs.data.display());
    config
        .dirs
        .ensure_exist()
        .map_err(|e| anyhow::anyhow!("Failed to initialize data folder: {}", e))?;

    // Readiness probe for the OMR engine; the service starts regardless
    let engine = OmrEngine::new(config.omr.clone());
    if engine.is_available().await {
        info!("OMR engine '{}' is available", config.omr.binary);
    } else {
        warn!(
            "OMR engine '{}' not found; sheet music processing will fail until it is installed",
            config.omr.binary
        );
    }

    // Start the stale-entry sweeper for temp and download directories
    let _sweeper = cleanup::spawn_sweeper(
        vec![config.dirs.temp.clone(), config.dirs.downloads.clone()],
        config.sweep_max_age,
        config.sweep_interval,
    );
    info!("Cleanup sweeper started");

    let bind_address = config.bind_address.clone();
    let state = AppState::new(config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("sheetwise-sd listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
