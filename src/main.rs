//! Yamaha Bridge
//!
//! Bridges Yamaha Extended Control receivers to an HTTP device API.

use yamaha_bridge::adapters::yamaha::YamahaAdapter;
use yamaha_bridge::adapters::Startable;
use yamaha_bridge::{api, bus, config};

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "yamaha_bridge=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Starting Yamaha Bridge v{} ({})",
        env!("YAMAHA_BRIDGE_VERSION"),
        env!("YAMAHA_BRIDGE_GIT_SHA")
    );

    // Load configuration
    let config = config::load_config()?;
    tracing::info!(
        "Configuration loaded, port: {}, poll interval: {:?}",
        config.port,
        config.poll_interval()
    );

    // Create event bus
    let bus = bus::create_bus();
    tracing::info!("Event bus initialized");

    // Initialize Yamaha adapter (SSDP discovery)
    let yamaha = Arc::new(YamahaAdapter::new(bus.clone(), (&config).into()));
    if let Err(e) = yamaha.start().await {
        tracing::warn!("Failed to start Yamaha adapter: {}", e);
    } else {
        tracing::info!("Yamaha adapter started (SSDP discovery active)");
    }

    let state = api::AppState::new(yamaha.clone(), bus.clone());

    let app = api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    // Start server with graceful shutdown
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Cleanup: stop discovery and polling
    tracing::info!("Shutting down adapters...");
    yamaha.stop().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
