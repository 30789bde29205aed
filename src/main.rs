// Crowdcast Consensus Market - Main Entry Point
// Commit-reveal crowd estimation with wager-weighted consensus

use axum::{
    routing::{get, post},
    Router,
};
use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crowdcast_consensus_market::app_state::{AppState, SharedState};
use crowdcast_consensus_market::handlers::*;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    info!("🎲 Crowdcast Consensus Market starting");

    // Initialize application state
    let state: SharedState = Arc::new(Mutex::new(AppState::new()));

    // Clone state for shutdown handler before moving into router
    let shutdown_state = state.clone();

    let app = Router::new()
        // ===== MARKET ENDPOINTS =====
        .route("/markets", get(get_markets))
        .route("/markets", post(create_market))
        .route("/markets/:id", get(get_market))
        // ===== LIFECYCLE ENDPOINTS =====
        .route("/markets/:id/commit", post(commit))
        .route("/markets/:id/commitments/:cid/reveal", post(reveal))
        .route("/markets/:id/resolve", post(resolve))
        .route("/markets/:id/commitments/:cid/claim", post(claim))
        .route("/markets/:id/winnings", post(add_winnings))
        // ===== COMMITMENT QUERIES =====
        .route("/markets/:id/commitments/:cid", get(get_commitment))
        .route("/markets/:id/owners/:owner", get(get_owner_commitments))
        // ===== VAULT ENDPOINTS =====
        .route("/deposit", post(deposit))
        .route("/balance/:account", get(get_balance))
        // ===== OBSERVABILITY =====
        .route("/events", get(get_events))
        .route("/activity", get(get_activity))
        .route("/stats", get(get_stats))
        // ===== ADMIN =====
        .route("/admin/params", post(update_params))
        // ===== HEALTH CHECK =====
        .route("/", get(health_check))
        .route("/health", get(health_check))
        // Apply CORS and state
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1234);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("🚀 server listening on http://{}", addr);

    // Setup graceful shutdown
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", addr, e));

    // Spawn shutdown handler
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            error!("failed to install CTRL+C handler");
            return;
        }

        info!("🛑 shutdown signal received, saving state");
        if let Ok(app_state) = shutdown_state.lock() {
            if let Err(e) = app_state.save_to_disk() {
                error!("failed to save state: {}", e);
            }
        }
        std::process::exit(0);
    });

    if let Err(e) = axum::serve(listener, app).await {
        error!("server error: {}", e);
    }
}

async fn health_check() -> &'static str {
    "Crowdcast Consensus Market - Online ✅"
}
