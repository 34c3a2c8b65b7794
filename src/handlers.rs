// HTTP request handlers for markets, bets and the caller's account

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{json, Value};

use crate::app_state::SharedState;
use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::ledger::brl_value;
use crate::market_resolve::decimal_odd;
use crate::models::*;

/// A market with the odds currently paid on each side
#[derive(Debug, Serialize)]
pub struct MarketView {
    #[serde(flatten)]
    pub market: Market,
    pub yes_odd: Option<Decimal>,
    pub no_odd: Option<Decimal>,
}

impl From<Market> for MarketView {
    fn from(market: Market) -> Self {
        Self {
            yes_odd: decimal_odd(true, market.yes_percentage),
            no_odd: decimal_odd(false, market.yes_percentage),
            market,
        }
    }
}

pub async fn health_check() -> &'static str {
    "Credit Prediction Market - Online ✅"
}

// ===== MARKET ENDPOINTS =====

pub async fn get_markets(
    State(state): State<SharedState>,
    Query(query): Query<MarketQuery>,
) -> AppResult<Json<Value>> {
    let markets = state.ledger.lock()?.list_markets(&query)?;
    let markets: Vec<MarketView> = markets.into_iter().map(MarketView::from).collect();
    Ok(Json(json!({ "markets": markets })))
}

pub async fn get_market(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> AppResult<Json<MarketView>> {
    let market = state.ledger.lock()?.market(&id)?.clone();
    Ok(Json(MarketView::from(market)))
}

pub async fn get_categories(State(state): State<SharedState>) -> AppResult<Json<Value>> {
    let counts = state.ledger.lock()?.category_counts();
    Ok(Json(json!({ "categories": counts })))
}

pub async fn get_packages(State(state): State<SharedState>) -> Json<Value> {
    Json(json!({ "packages": state.config.credit_packages }))
}

// ===== BETTING =====

pub async fn place_bet(
    State(state): State<SharedState>,
    user: AuthUser,
    Json(request): Json<PlaceBetRequest>,
) -> AppResult<Json<BetReceipt>> {
    let receipt = state.ledger.lock()?.place_bet(
        &user.user_id,
        &request.market_id,
        request.prediction,
        request.amount,
        Utc::now(),
    )?;
    Ok(Json(receipt))
}

// ===== ACCOUNT =====

pub async fn get_me(State(state): State<SharedState>, user: AuthUser) -> AppResult<Json<Value>> {
    let profile = state.ledger.lock()?.profile(&user.user_id)?.clone();
    let brl = brl_value(profile.balance, state.config.credit_to_brl);
    Ok(Json(json!({
        "profile": profile,
        "balance": profile.balance,
        "brl_value": format!("{:.2}", brl),
    })))
}

pub async fn get_my_bets(State(state): State<SharedState>, user: AuthUser) -> AppResult<Json<Value>> {
    let bets = state.ledger.lock()?.user_bets(&user.user_id);
    Ok(Json(json!({ "bets": bets })))
}

pub async fn get_my_transactions(
    State(state): State<SharedState>,
    user: AuthUser,
) -> AppResult<Json<Value>> {
    let transactions = state.ledger.lock()?.transactions_for(&user.user_id);
    Ok(Json(json!({ "transactions": transactions })))
}
