// Administrative routes: market lifecycle and bet corrections

use axum::{
    extract::{Path, State},
    response::Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use crate::app_state::SharedState;
use crate::auth::AdminUser;
use crate::error::AppResult;
use crate::handlers::MarketView;
use crate::models::*;

pub async fn list_all_markets(State(state): State<SharedState>, _admin: AdminUser) -> AppResult<Json<Value>> {
    let query = MarketQuery { status: Some("all".into()), ..Default::default() };
    let markets: Vec<MarketView> = state
        .ledger
        .lock()?
        .list_markets(&query)?
        .into_iter()
        .map(MarketView::from)
        .collect();
    Ok(Json(json!({ "markets": markets })))
}

pub async fn create_market(
    State(state): State<SharedState>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<NewMarket>,
) -> AppResult<Json<Value>> {
    let mut ledger = state.ledger.lock()?;
    let market = ledger.create_market(payload)?;
    ledger.log_activity("🛡️", "ADMIN", &format!("{} created market {}", admin.user_id, market.id));
    Ok(Json(json!({ "success": true, "market_id": market.id, "market": market })))
}

pub async fn update_market(
    State(state): State<SharedState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(payload): Json<MarketUpdate>,
) -> AppResult<Json<Value>> {
    let market = state.ledger.lock()?.update_market(&id, payload)?;
    Ok(Json(json!({ "success": true, "market": market })))
}

pub async fn delete_market(
    State(state): State<SharedState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let refunded = state.ledger.lock()?.delete_market(&id)?;
    Ok(Json(json!({ "success": true, "refunded_bets": refunded })))
}

pub async fn resolve_market(
    State(state): State<SharedState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    Json(payload): Json<ResolveMarketRequest>,
) -> AppResult<Json<Value>> {
    let mut ledger = state.ledger.lock()?;
    let summary = ledger.resolve_market(&id, payload.result, Utc::now())?;
    ledger.log_activity("🛡️", "ADMIN", &format!("{} resolved market {}", admin.user_id, id));
    Ok(Json(json!({ "success": true, "resolution": summary })))
}

pub async fn list_bets(State(state): State<SharedState>, _admin: AdminUser) -> AppResult<Json<Value>> {
    let bets = state.ledger.lock()?.all_bets();
    Ok(Json(json!({ "bets": bets })))
}

pub async fn update_bet(
    State(state): State<SharedState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(payload): Json<BetUpdate>,
) -> AppResult<Json<Value>> {
    let bet = state.ledger.lock()?.update_bet(&id, payload)?;
    Ok(Json(json!({ "success": true, "bet": bet })))
}

pub async fn delete_bet(
    State(state): State<SharedState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let bet = state.ledger.lock()?.delete_bet(&id)?;
    Ok(Json(json!({ "success": true, "bet": bet })))
}

pub async fn get_activity(State(state): State<SharedState>, _admin: AdminUser) -> AppResult<Json<Value>> {
    let activity: Vec<String> = state.ledger.lock()?.activity.iter().cloned().collect();
    Ok(Json(json!({ "activity": activity })))
}
