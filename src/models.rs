// Data models for the credit prediction market

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MarketType {
    YesNo,
    Candidates,
}

impl Default for MarketType {
    fn default() -> Self { MarketType::YesNo }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    Active,
    Closed,
    Resolved,
}

/// A two-outcome prediction event.
///
/// For candidate markets the "yes" side is candidate 1 and the "no" side
/// is candidate 2, so all volume and percentage arithmetic is shared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub end_date: DateTime<Utc>,
    pub status: MarketStatus,
    pub market_type: MarketType,
    #[serde(default)]
    pub candidate_1_name: Option<String>,
    #[serde(default)]
    pub candidate_2_name: Option<String>,
    pub yes_volume: Decimal,
    pub no_volume: Decimal,
    pub total_volume: Decimal,
    pub yes_percentage: Decimal,
    /// Final outcome; `Some(true)` means yes / candidate 1 won
    #[serde(default)]
    pub result: Option<bool>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Market {
    pub fn accepts_bets(&self, now: DateTime<Utc>) -> bool {
        self.status == MarketStatus::Active && self.end_date > now
    }

    pub fn option_label(&self, prediction: bool) -> String {
        match self.market_type {
            MarketType::YesNo => (if prediction { "Yes" } else { "No" }).to_string(),
            MarketType::Candidates => {
                let (name, fallback) = if prediction {
                    (&self.candidate_1_name, "Candidate 1")
                } else {
                    (&self.candidate_2_name, "Candidate 2")
                };
                name.clone().unwrap_or_else(|| fallback.to_string())
            }
        }
    }

    pub fn summary(&self) -> MarketSummary {
        MarketSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            category: self.category.clone(),
            status: self.status,
            yes_percentage: self.yes_percentage,
            market_type: self.market_type,
            candidate_1_name: self.candidate_1_name.clone(),
            candidate_2_name: self.candidate_2_name.clone(),
        }
    }
}

/// Market fields joined onto a bet for the "my bets" view
#[derive(Debug, Clone, Serialize)]
pub struct MarketSummary {
    pub id: String,
    pub title: String,
    pub category: String,
    pub status: MarketStatus,
    pub yes_percentage: Decimal,
    pub market_type: MarketType,
    pub candidate_1_name: Option<String>,
    pub candidate_2_name: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BetStatus {
    Pending,
    Won,
    Lost,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bet {
    pub id: String,
    pub user_id: String,
    pub market_id: String,
    pub amount: Decimal,
    /// true = yes / candidate 1
    pub prediction: bool,
    pub status: BetStatus,
    #[serde(default)]
    pub payout: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TxType {
    Deposit,
    Withdrawal,
    Bet,
    Win,
    Refund,
    Adjustment,
}

/// Credit movement on a user's account. Positive amounts add credits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub amount: Decimal,
    pub tx_type: TxType,
    pub description: String,
    #[serde(default)]
    pub payment_session_id: Option<String>,
    #[serde(default)]
    pub payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(user_id: &str, amount: Decimal, tx_type: TxType, description: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            amount,
            tx_type,
            description,
            payment_session_id: None,
            payment_id: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    pub balance: Decimal,
    #[serde(default)]
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

// ===== LEDGER INPUTS =====

/// POST /admin/markets request body
#[derive(Debug, Clone, Deserialize)]
pub struct NewMarket {
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(default, alias = "imageUrl")]
    pub image_url: Option<String>,
    #[serde(alias = "endDate")]
    pub end_date: DateTime<Utc>,
    #[serde(default, alias = "marketType")]
    pub market_type: MarketType,
    #[serde(default, alias = "candidate1")]
    pub candidate_1_name: Option<String>,
    #[serde(default, alias = "candidate2")]
    pub candidate_2_name: Option<String>,
}

/// PUT /admin/markets/:id request body; absent fields are left alone
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarketUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    #[serde(alias = "imageUrl")]
    pub image_url: Option<String>,
    #[serde(alias = "endDate")]
    pub end_date: Option<DateTime<Utc>>,
    pub status: Option<MarketStatus>,
}

/// PUT /admin/bets/:id request body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BetUpdate {
    pub amount: Option<Decimal>,
    pub prediction: Option<bool>,
    pub market_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarketQuery {
    pub status: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
}

// ===== REQUEST BODIES =====

#[derive(Debug, Deserialize)]
pub struct PlaceBetRequest {
    #[serde(alias = "marketId")]
    pub market_id: String,
    pub prediction: bool,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct ResolveMarketRequest {
    pub result: bool,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    #[serde(rename = "priceId", alias = "price_id")]
    pub price_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    #[serde(rename = "sessionId", alias = "session_id")]
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub credits: Option<Decimal>,
    #[serde(rename = "pixKey", alias = "pix_key")]
    pub pix_key: Option<String>,
}

// ===== LEDGER OUTPUTS =====

#[derive(Debug, Clone, Serialize)]
pub struct BetReceipt {
    pub success: bool,
    pub bet: Bet,
    pub new_balance: Decimal,
    pub yes_percentage: Decimal,
    pub odd: Option<Decimal>,
    pub potential_return: Option<Decimal>,
}

/// A bet as shown on the user's bet history
#[derive(Debug, Clone, Serialize)]
pub struct UserBetView {
    #[serde(flatten)]
    pub bet: Bet,
    pub market: MarketSummary,
    pub option_label: String,
    pub odd: Option<Decimal>,
    pub potential_return: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolutionSummary {
    pub market_id: String,
    pub result: bool,
    pub winners: usize,
    pub losers: usize,
    pub total_paid: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct WithdrawalReceipt {
    pub success: bool,
    pub message: String,
    /// BRL value with two decimals
    pub amount: String,
    pub credits: Decimal,
    pub new_balance: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PurchaseOutcome {
    Credited { credits: Decimal, new_balance: Decimal },
    AlreadyProcessed,
}
