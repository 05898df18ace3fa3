//! applepay-server HTTP Gateway
//!
//! Axum-based relay between the Apple Pay sheet, Apple's merchant
//! validation service and the card processor. Also serves the storefront
//! bundle and the domain-association file from `STATIC_DIR`.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use applepay_gateway::{GatewayConfig, Relay};

use crate::handlers::{health_check, pay, validate_session};
use crate::state::AppState;

/// Build the router: relay endpoints first, static files for everything else
pub fn app(state: AppState, static_dir: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/validateSession", post(validate_session))
        .route("/pay", post(pay))
        // Storefront + /.well-known/apple-developer-merchantid-domain-association
        .fallback_service(ServeDir::new(static_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let config = GatewayConfig::from_env()?;
    tracing::debug!(?config, "Gateway configuration loaded");

    let relay = Relay::from_config(&config)?;
    if relay.validation_configured() {
        tracing::info!("✓ Merchant certificate loaded for {}", config.merchant.merchant_identifier);
    } else {
        tracing::warn!("⚠ Merchant certificate not loaded - /validateSession disabled");
        tracing::warn!("  Set APPLE_PAY_CERT_PATH and APPLE_PAY_KEY_PATH in .env");
    }
    tracing::info!("✓ Processor: {} ({})", relay.processor_name(), config.processor_base_url);

    let state = AppState {
        relay: Arc::new(relay),
    };

    let static_dir = std::env::var("STATIC_DIR").unwrap_or_else(|_| "static".into());
    let app = app(state, &static_dir);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 applepay-server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health          - Health check");
    tracing::info!("  POST /validateSession - Merchant validation relay");
    tracing::info!("  POST /pay             - Tokenize and charge");
    tracing::info!("  GET  /*               - Static files from {}", static_dir);
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
