// Routes module - wires every HTTP endpoint to its handler

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::app_state::SharedState;
use crate::handlers::*;

pub fn router(state: SharedState) -> Router {
    Router::new()
        // ===== MARKET ENDPOINTS =====
        .route("/api/markets", get(get_markets).post(create_market))
        .route("/api/markets/:id", get(get_market))
        .route("/api/markets/:id/resolve", post(resolve_market))
        .route("/api/markets/:id/quote", get(quote))

        // ===== BETTING ENDPOINTS =====
        .route("/api/bet", post(place_bet))
        .route("/api/claim/:market_id", post(claim_winnings))

        // ===== ACCOUNT ENDPOINTS =====
        .route("/api/positions", get(get_positions))
        .route("/api/balance", get(get_balance))

        // ===== HEALTH CHECK =====
        .route("/", get(health_check))
        .route("/health", get(health_check))

        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
