// Credit purchase and withdrawal routes

use axum::{
    extract::State,
    http::{header::ORIGIN, HeaderMap},
    response::Json,
};
use serde_json::{json, Value};
use tracing::info;

use crate::app_state::SharedState;
use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::{CheckoutRequest, PurchaseOutcome, VerifyPaymentRequest, WithdrawRequest, WithdrawalReceipt};
use crate::payments::CheckoutSession;

/// POST /payments/checkout
/// Opens a gateway checkout for one credit package. The browser is sent
/// back to `<origin>/?payment=success&session_id=...` when it is paid.
pub async fn create_checkout(
    State(state): State<SharedState>,
    user: AuthUser,
    headers: HeaderMap,
    Json(request): Json<CheckoutRequest>,
) -> AppResult<Json<CheckoutSession>> {
    let price_id = request
        .price_id
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::Validation("Price ID is required".into()))?;
    let package = state
        .config
        .package(&price_id)
        .ok_or_else(|| AppError::Validation(format!("Invalid price ID: {}", price_id)))?;
    let origin = headers
        .get(ORIGIN)
        .and_then(|o| o.to_str().ok())
        .ok_or_else(|| AppError::Validation("Origin header is required".into()))?;

    info!("Creating checkout for {} ({} credits)", user.email, package.credits);
    let session = state
        .payments
        .create_checkout(&user.user_id, &user.email, package, origin)
        .await?;
    Ok(Json(session))
}

/// POST /payments/verify
/// Credits a paid session once; replays report "already processed".
pub async fn verify_payment(
    State(state): State<SharedState>,
    user: AuthUser,
    Json(request): Json<VerifyPaymentRequest>,
) -> AppResult<Json<Value>> {
    let session_id = request
        .session_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation("Session ID is required".into()))?;

    info!("Verifying payment for session {}", session_id);
    let session = state.payments.retrieve_session(&session_id).await?;

    if let Some(owner) = session.user_id.as_deref() {
        if owner != user.user_id {
            return Err(AppError::Validation("Payment session belongs to another user".into()));
        }
    }

    if !session.is_paid() {
        info!("Session {} status: {}", session_id, session.payment_status);
        return Ok(Json(json!({ "success": false, "message": "Payment not completed" })));
    }

    let outcome = state.ledger.lock()?.credit_purchase(
        &user.user_id,
        session.credits,
        &session.id,
        session.payment_id.clone(),
    )?;

    Ok(Json(match outcome {
        PurchaseOutcome::AlreadyProcessed => {
            json!({ "success": true, "message": "Payment already processed" })
        }
        PurchaseOutcome::Credited { credits, new_balance } => json!({
            "success": true,
            "message": "Payment processed successfully",
            "credits": credits,
            "new_balance": new_balance,
        }),
    }))
}

/// POST /withdrawals
pub async fn withdraw(
    State(state): State<SharedState>,
    user: AuthUser,
    Json(request): Json<WithdrawRequest>,
) -> AppResult<Json<WithdrawalReceipt>> {
    let receipt = state
        .ledger
        .lock()?
        .withdraw(&user.user_id, request.credits, request.pix_key.as_deref())?;
    Ok(Json(receipt))
}
