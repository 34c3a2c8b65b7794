// Routes module - assembles every HTTP endpoint
// Each sub-module handles a specific domain

pub mod admin;
pub mod payments;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::app_state::SharedState;
use crate::handlers::*;

pub fn create_router(state: SharedState) -> Router {
    Router::new()
        // ===== PUBLIC MARKET ENDPOINTS =====
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/markets", get(get_markets))
        .route("/markets/:id", get(get_market))
        .route("/categories", get(get_categories))
        .route("/packages", get(get_packages))

        // ===== USER ENDPOINTS (bearer token) =====
        .route("/bets", post(place_bet))
        .route("/me", get(get_me))
        .route("/me/bets", get(get_my_bets))
        .route("/me/transactions", get(get_my_transactions))
        .route("/payments/checkout", post(payments::create_checkout))
        .route("/payments/verify", post(payments::verify_payment))
        .route("/withdrawals", post(payments::withdraw))

        // ===== ADMIN ENDPOINTS =====
        .route("/admin/markets", get(admin::list_all_markets).post(admin::create_market))
        .route("/admin/markets/:id", put(admin::update_market).delete(admin::delete_market))
        .route("/admin/markets/:id/resolve", post(admin::resolve_market))
        .route("/admin/bets", get(admin::list_bets))
        .route("/admin/bets/:id", put(admin::update_bet).delete(admin::delete_bet))
        .route("/admin/activity", get(admin::get_activity))

        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
