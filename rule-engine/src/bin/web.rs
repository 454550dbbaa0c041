//! Sigflow Web Server - rule synthesis over HTTP.
//!
//! This binary provides a thin web server that:
//! - Synthesizes rule plans and scripts on `POST /synthesize`
//! - Serves the standalone cleanup script on `GET /cleanup`
//! - Verifies request signatures when a signing key is configured
//!
//! Applying the scripts to the mail platform happens elsewhere.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use tokio::{net::TcpListener, signal};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sigflow::web::{cleanup, health, synthesize_rules, AppState};
use sigflow::{Config, SynthesisOptions};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        signing_configured = config.signing_key.is_some(),
        tracking_endpoint_set = config.tracking_endpoint.is_some(),
        marker_scheme = ?config.marker_scheme,
        "config_loaded"
    );

    // Fail fast on a configuration every request would reject
    SynthesisOptions::from_config(&config).context("Invalid configuration")?;

    let port = config.port;
    let state = AppState::new(config);

    // Build the router
    let app = Router::new()
        .route("/health", get(health))
        .route("/synthesize", post(synthesize_rules))
        .route("/cleanup", get(cleanup))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
