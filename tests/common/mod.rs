#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use credit_market::{create_router, AppState, Config, SharedState};
use serde_json::{json, Value};
use tower::ServiceExt;

pub const ALICE: &str = "tok-alice";
pub const BOB: &str = "tok-bob";
pub const ADMIN: &str = "tok-admin";
pub const ORIGIN: &str = "http://localhost:5173";

pub fn test_state() -> SharedState {
    let mut config = Config {
        data_path: std::env::temp_dir()
            .join(format!("credit-market-it-{}.json", uuid::Uuid::new_v4().simple()))
            .to_string_lossy()
            .into_owned(),
        autosave_secs: 0,
        payment_mock_mode: true,
        ..Config::default()
    };
    for (token, user) in [(ALICE, "alice"), (BOB, "bob"), (ADMIN, "admin")] {
        config
            .static_tokens
            .insert(token.to_string(), (user.to_string(), format!("{}@example.com", user)));
    }
    config.admin_user_ids.insert("admin".to_string());
    AppState::new(config).shared()
}

pub fn test_app() -> (Router, SharedState) {
    let state = test_state();
    (create_router(state.clone()), state)
}

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::ORIGIN, ORIGIN);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

/// Buy a credit package through the mock gateway and confirm it
pub async fn buy_credits(app: &Router, token: &str, price_id: &str) -> Value {
    let (status, session) = send(
        app,
        Method::POST,
        "/payments/checkout",
        Some(token),
        Some(json!({ "priceId": price_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "checkout failed: {}", session);

    let (status, body) = send(
        app,
        Method::POST,
        "/payments/verify",
        Some(token),
        Some(json!({ "sessionId": session["sessionId"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "verify failed: {}", body);
    body
}

pub async fn create_market(app: &Router, body: Value) -> String {
    let (status, created) = send(app, Method::POST, "/admin/markets", Some(ADMIN), Some(body)).await;
    assert_eq!(status, StatusCode::OK, "create market failed: {}", created);
    created["market_id"].as_str().unwrap().to_string()
}

pub fn yes_no_market(title: &str, category: &str) -> Value {
    json!({
        "title": title,
        "description": "Resolves YES if it happens before the end date",
        "category": category,
        "endDate": (chrono::Utc::now() + chrono::Duration::days(30)).to_rfc3339(),
        "marketType": "yes_no"
    })
}

pub async fn balance(app: &Router, token: &str) -> f64 {
    let (_, me) = send(app, Method::GET, "/me", Some(token), None).await;
    me["balance"].as_f64().unwrap()
}
