//! Service configuration loaded from the environment

use anyhow::{anyhow, Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};
use std::env;
use std::str::FromStr;

use crate::payments::CreditPackage;

/// Runtime configuration for the market service
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,

    /// JSON snapshot location
    pub data_path: String,

    /// Autosave interval in seconds (0 disables autosave)
    pub autosave_secs: u64,

    /// Hosted auth backend (`GET {url}/auth/v1/user`)
    pub auth_url: Option<String>,
    pub auth_anon_key: String,

    /// token -> (user_id, email), used when no auth backend is configured
    pub static_tokens: HashMap<String, (String, String)>,

    /// Users allowed on /admin routes
    pub admin_user_ids: HashSet<String>,

    pub payment_api_base: String,
    pub payment_secret_key: Option<String>,
    pub payment_mock_mode: bool,
    pub credit_packages: Vec<CreditPackage>,

    /// Minimum credits per withdrawal request
    pub min_withdraw_credits: Decimal,

    /// BRL value of one credit
    pub credit_to_brl: Decimal,

    pub min_bet: Decimal,
    pub starting_balance: Decimal,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 1234,
            data_path: "data/state.json".to_string(),
            autosave_secs: 60,
            auth_url: None,
            auth_anon_key: String::new(),
            static_tokens: HashMap::new(),
            admin_user_ids: HashSet::new(),
            payment_api_base: "https://api.stripe.com".to_string(),
            payment_secret_key: None,
            payment_mock_mode: true,
            credit_packages: default_packages(),
            min_withdraw_credits: dec!(100),
            credit_to_brl: dec!(0.10),
            min_bet: dec!(1),
            starting_balance: Decimal::ZERO,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let defaults = Self::default();

        let payment_secret_key = env::var("PAYMENT_SECRET_KEY").ok().filter(|k| !k.is_empty());
        // Without a key there is nothing real to talk to, so mock by default.
        let payment_mock_mode = match env::var("PAYMENT_MOCK_MODE") {
            Ok(v) => parse_bool(&v),
            Err(_) => payment_secret_key.is_none(),
        };

        let credit_packages = match env::var("CREDIT_PACKAGES") {
            Ok(raw) => parse_packages(&raw)?,
            Err(_) => defaults.credit_packages,
        };

        Ok(Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parse_var("PORT", defaults.port)?,
            data_path: env::var("DATA_PATH").unwrap_or(defaults.data_path),
            autosave_secs: parse_var("AUTOSAVE_SECS", defaults.autosave_secs)?,
            auth_url: env::var("AUTH_URL").ok().filter(|u| !u.is_empty()),
            auth_anon_key: env::var("AUTH_ANON_KEY").unwrap_or_default(),
            static_tokens: parse_static_tokens(&env::var("STATIC_TOKENS").unwrap_or_default())?,
            admin_user_ids: parse_list(&env::var("ADMIN_USER_IDS").unwrap_or_default()),
            payment_api_base: env::var("PAYMENT_API_BASE").unwrap_or(defaults.payment_api_base),
            payment_secret_key,
            payment_mock_mode,
            credit_packages,
            min_withdraw_credits: parse_var("MIN_WITHDRAW_CREDITS", defaults.min_withdraw_credits)?,
            credit_to_brl: parse_var("CREDIT_TO_BRL", defaults.credit_to_brl)?,
            min_bet: parse_var("MIN_BET", defaults.min_bet)?,
            starting_balance: parse_var("STARTING_BALANCE", defaults.starting_balance)?,
        })
    }

    pub fn package(&self, price_id: &str) -> Option<&CreditPackage> {
        self.credit_packages.iter().find(|p| p.price_id == price_id)
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admin_user_ids.contains(user_id)
    }
}

fn default_packages() -> Vec<CreditPackage> {
    vec![
        CreditPackage::new("price_credits_100", dec!(100), dec!(10)),
        CreditPackage::new("price_credits_500", dec!(500), dec!(45)),
        CreditPackage::new("price_credits_1000", dec!(1000), dec!(80)),
    ]
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("invalid {}={:?}: {}", key, raw, e)),
        _ => Ok(default),
    }
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn parse_list(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// `token:user_id:email,token2:user_id2:email2`
pub fn parse_static_tokens(raw: &str) -> Result<HashMap<String, (String, String)>> {
    let mut tokens = HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let parts: Vec<&str> = entry.splitn(3, ':').collect();
        if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(anyhow!("invalid STATIC_TOKENS entry {:?}", entry));
        }
        tokens.insert(parts[0].to_string(), (parts[1].to_string(), parts[2].to_string()));
    }
    Ok(tokens)
}

/// `price_id:credits:price_brl,...`
pub fn parse_packages(raw: &str) -> Result<Vec<CreditPackage>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let parts: Vec<&str> = entry.split(':').collect();
            if parts.len() != 3 {
                return Err(anyhow!("invalid CREDIT_PACKAGES entry {:?}", entry));
            }
            let credits = Decimal::from_str(parts[1])
                .with_context(|| format!("credits in {:?}", entry))?;
            let price = Decimal::from_str(parts[2])
                .with_context(|| format!("price in {:?}", entry))?;
            Ok(CreditPackage::new(parts[0], credits, price))
        })
        .collect()
}
