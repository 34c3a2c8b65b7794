/// Payment Gateway Client
///
/// Buys credits through a Stripe-compatible checkout API:
/// - `create_checkout` opens a hosted checkout session for a credit package
/// - `retrieve_session` reads back payment status and the credits metadata
///
/// Mock mode keeps sessions in memory so the service runs without a
/// gateway account. Mock sessions are born paid.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};

pub const PAID: &str = "paid";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreditPackage {
    pub price_id: String,
    pub credits: Decimal,
    pub price_brl: Decimal,
}

impl CreditPackage {
    pub fn new(price_id: &str, credits: Decimal, price_brl: Decimal) -> Self {
        Self { price_id: price_id.to_string(), credits, price_brl }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSession {
    #[serde(rename = "sessionId")]
    pub id: String,
    pub url: String,
}

/// What the gateway reports about a checkout session
#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub id: String,
    pub payment_status: String,
    pub credits: Decimal,
    pub payment_id: Option<String>,
    pub user_id: Option<String>,
}

impl SessionStatus {
    pub fn is_paid(&self) -> bool {
        self.payment_status == PAID
    }
}

// Gateway wire formats

#[derive(Debug, Deserialize)]
struct GatewaySession {
    id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    payment_intent: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct CustomerList {
    data: Vec<Customer>,
}

#[derive(Debug, Deserialize)]
struct Customer {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    error: GatewayErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

pub struct PaymentGateway {
    api_base: String,
    secret_key: Option<String>,
    pub mock: bool,
    client: reqwest::Client,
    mock_sessions: Mutex<HashMap<String, SessionStatus>>,
}

impl PaymentGateway {
    pub fn new(config: &Config) -> Self {
        let gateway = Self {
            api_base: config.payment_api_base.trim_end_matches('/').to_string(),
            secret_key: config.payment_secret_key.clone(),
            mock: config.payment_mock_mode,
            client: reqwest::Client::new(),
            mock_sessions: Mutex::new(HashMap::new()),
        };
        if gateway.mock {
            info!("💳 Payment gateway: MOCK mode (sessions settle instantly)");
        } else if gateway.secret_key.is_none() {
            warn!("💳 Payment gateway: no secret key configured, checkout disabled");
        } else {
            info!("💳 Payment gateway: {}", gateway.api_base);
        }
        gateway
    }

    fn secret(&self) -> AppResult<&str> {
        self.secret_key.as_deref().ok_or(AppError::PaymentNotConfigured)
    }

    /// Open a hosted checkout for one credit package.
    pub async fn create_checkout(
        &self,
        user_id: &str,
        email: &str,
        package: &CreditPackage,
        origin: &str,
    ) -> AppResult<CheckoutSession> {
        let origin = origin.trim_end_matches('/');

        if self.mock {
            let id = format!("cs_mock_{}", uuid::Uuid::new_v4().simple());
            let status = SessionStatus {
                id: id.clone(),
                payment_status: PAID.to_string(),
                credits: package.credits,
                payment_id: Some(format!("pi_mock_{}", uuid::Uuid::new_v4().simple())),
                user_id: Some(user_id.to_string()),
            };
            self.mock_sessions.lock()?.insert(id.clone(), status);
            let url = format!("{}/?payment=success&session_id={}", origin, id);
            info!("Mock checkout session {} for {} ({} credits)", id, user_id, package.credits);
            return Ok(CheckoutSession { id, url });
        }

        let secret = self.secret()?;
        let customer_id = self.find_customer(secret, email).await?;

        let mut form: Vec<(&str, String)> = vec![
            ("mode", "payment".to_string()),
            ("line_items[0][price]", package.price_id.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("payment_method_types[0]", "card".to_string()),
            ("payment_method_types[1]", "pix".to_string()),
            (
                "success_url",
                format!("{}/?payment=success&session_id={{CHECKOUT_SESSION_ID}}", origin),
            ),
            ("cancel_url", format!("{}/?payment=canceled", origin)),
            ("metadata[user_id]", user_id.to_string()),
            ("metadata[credits]", package.credits.normalize().to_string()),
        ];
        match customer_id {
            Some(id) => {
                info!("Found existing customer {}", id);
                form.push(("customer", id));
            }
            None => form.push(("customer_email", email.to_string())),
        }

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(secret)
            .form(&form)
            .send()
            .await?;
        let session: GatewaySession = parse_response(response).await?;

        let url = session
            .url
            .ok_or_else(|| AppError::Gateway(format!("session {} has no checkout url", session.id)))?;
        info!("Checkout session {} created for {}", session.id, user_id);
        Ok(CheckoutSession { id: session.id, url })
    }

    pub async fn retrieve_session(&self, session_id: &str) -> AppResult<SessionStatus> {
        if self.mock {
            return self
                .mock_sessions
                .lock()?
                .get(session_id)
                .cloned()
                .ok_or_else(|| AppError::NotFound(format!("Payment session {}", session_id)));
        }

        let secret = self.secret()?;
        let response = self
            .client
            .get(format!("{}/v1/checkout/sessions/{}", self.api_base, session_id))
            .bearer_auth(secret)
            .send()
            .await?;
        let session: GatewaySession = parse_response(response).await?;

        let credits = session
            .metadata
            .get("credits")
            .and_then(|c| Decimal::from_str(c).ok())
            .unwrap_or(Decimal::ZERO);

        Ok(SessionStatus {
            id: session.id,
            payment_status: session.payment_status.unwrap_or_else(|| "unpaid".to_string()),
            credits,
            payment_id: session.payment_intent,
            user_id: session.metadata.get("user_id").cloned(),
        })
    }

    /// Override a mock session's status. Returns false outside mock mode or
    /// for unknown sessions.
    pub fn set_mock_status(&self, session_id: &str, payment_status: &str) -> bool {
        if !self.mock {
            return false;
        }
        match self.mock_sessions.lock() {
            Ok(mut sessions) => match sessions.get_mut(session_id) {
                Some(session) => {
                    session.payment_status = payment_status.to_string();
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    async fn find_customer(&self, secret: &str, email: &str) -> AppResult<Option<String>> {
        let response = self
            .client
            .get(format!("{}/v1/customers", self.api_base))
            .bearer_auth(secret)
            .query(&[("email", email), ("limit", "1")])
            .send()
            .await?;
        let customers: CustomerList = parse_response(response).await?;
        Ok(customers.data.into_iter().next().map(|c| c.id))
    }
}

async fn parse_response<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> AppResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<GatewayErrorBody>(&body)
            .ok()
            .and_then(|b| b.error.message)
            .unwrap_or(body);
        return Err(AppError::Gateway(format!("{}: {}", status, message)));
    }
    Ok(response.json::<T>().await?)
}
