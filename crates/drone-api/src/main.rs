//! # Drone Fleet API Server
//!
//! Main entry point for the drone fleet simulation service.
//! Wires the document store, the simulation engine and the WebSocket hub
//! together and exposes the REST control surface.

mod config;
mod demo;
mod error;
mod handlers;
mod routes;
mod state;

use crate::config::ApiConfig;
use crate::routes::create_router;
use crate::state::AppState;

use std::net::SocketAddr;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    init_logging();

    info!("🚁 Starting Drone Fleet Simulation Server v{}", env!("CARGO_PKG_VERSION"));
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // Load configuration
    let config = ApiConfig::load()?;
    info!("Configuration loaded");
    info!("   API Port: {}", config.api_port);
    info!("   WebSocket Port: {}", config.ws_port);
    info!("   Store: {:?}", config.store);
    info!("   Tick interval: {} ms", config.simulation.tick_interval_ms);

    // Initialize application state
    info!("Initializing application state...");
    let state = AppState::new(config.clone()).await?;
    info!("Application state initialized ({} store)", state.store_backend);

    // Create router
    let app = create_router(state.clone());
    info!("Routes configured");

    // Start WebSocket server in background
    let ws_hub = state.ws_hub.clone();
    let ws_port = config.ws_port;
    tokio::spawn(async move {
        info!("Starting WebSocket server on port {}...", ws_port);
        if let Err(e) = drone_websocket::start_server(ws_hub, ws_port).await {
            error!("WebSocket server error: {}", e);
        }
    });

    if config.simulation.autostart {
        let response = state.engine.start().await;
        if response.success {
            info!("{}", response.message);
        } else {
            warn!("Autostart failed: {}", response.message);
        }
    }

    // Start API server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.api_port));
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("🚀 API server listening on http://{}", addr);
    info!("WebSocket server on ws://0.0.0.0:{}", config.ws_port);
    info!("Metrics available at http://{}/metrics", addr);
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.engine.stop().await;
    info!("🛑 Server shutdown complete");
    Ok(())
}

/// Initialize logging with tracing. `LOG_FORMAT=json` selects JSON lines.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,drone_api=debug,drone_sim=debug,drone_websocket=debug")
    });

    let json = std::env::var("LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(true))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down...");
        }
    }
}
