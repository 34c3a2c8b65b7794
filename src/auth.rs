use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::app_state::SharedState;
use crate::config::Config;
use crate::error::{AppError, AppResult};

/// Identity as reported by the auth backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
}

/// Where bearer tokens are checked.
///
/// `Remote` asks the hosted auth service who owns the token; `Static` is a
/// fixed token table for local development and tests.
pub enum AuthBackend {
    Remote {
        url: String,
        anon_key: String,
        client: reqwest::Client,
    },
    Static(HashMap<String, Identity>),
}

impl AuthBackend {
    pub fn from_config(config: &Config) -> Self {
        match &config.auth_url {
            Some(url) => {
                info!("🔐 Auth backend: {}", url);
                AuthBackend::Remote {
                    url: url.trim_end_matches('/').to_string(),
                    anon_key: config.auth_anon_key.clone(),
                    client: reqwest::Client::new(),
                }
            }
            None => {
                info!("🔐 Auth backend: static token table ({} tokens)", config.static_tokens.len());
                AuthBackend::Static(
                    config
                        .static_tokens
                        .iter()
                        .map(|(token, (user_id, email))| {
                            (token.clone(), Identity { user_id: user_id.clone(), email: email.clone() })
                        })
                        .collect(),
                )
            }
        }
    }

    /// Verify a bearer token and return who it belongs to
    pub async fn verify(&self, token: &str) -> AppResult<Identity> {
        match self {
            AuthBackend::Static(tokens) => tokens
                .get(token)
                .cloned()
                .ok_or_else(|| AppError::Unauthorized("Invalid token".into())),
            AuthBackend::Remote { url, anon_key, client } => {
                let response = client
                    .get(format!("{}/auth/v1/user", url))
                    .bearer_auth(token)
                    .header("apikey", anon_key)
                    .send()
                    .await?;

                if !response.status().is_success() {
                    debug!("auth backend rejected token: {}", response.status());
                    return Err(AppError::Unauthorized("Invalid token".into()));
                }

                let user: serde_json::Value = response.json().await?;
                let user_id = user["id"]
                    .as_str()
                    .ok_or_else(|| AppError::Gateway("auth user has no id".into()))?;
                let email = user["email"]
                    .as_str()
                    .ok_or_else(|| AppError::Unauthorized("User email not available".into()))?;

                Ok(Identity { user_id: user_id.to_string(), email: email.to_string() })
            }
        }
    }
}

pub fn bearer_token(parts: &Parts) -> AppResult<&str> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("No authorization header".into()))?
        .to_str()
        .map_err(|_| AppError::Unauthorized("Malformed authorization header".into()))?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Expected a bearer token".into()))
}

/// An authenticated caller with a profile in the ledger
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
    pub is_admin: bool,
}

#[async_trait]
impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?.to_string();
        let identity = state.auth.verify(&token).await?;
        let is_admin = state.config.is_admin(&identity.user_id);

        state
            .ledger
            .lock()?
            .ensure_profile(&identity.user_id, &identity.email, is_admin);

        Ok(AuthUser { user_id: identity.user_id, email: identity.email, is_admin })
    }
}

/// An authenticated caller listed in `ADMIN_USER_IDS`
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

#[async_trait]
impl FromRequestParts<SharedState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(AppError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}
