/// Credit Prediction Market
/// Exports all modules for use as a library crate

pub mod app_state;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod market_resolve;
pub mod models;
pub mod payments;
pub mod routes;

pub use app_state::{AppState, SharedState};
pub use auth::{AdminUser, AuthBackend, AuthUser, Identity};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use ledger::{brl_value, Ledger, LedgerRules, LedgerSnapshot};
pub use market_resolve::{decimal_odd, parimutuel_payout, potential_return, settle_bets, yes_percentage, Settlement};
pub use models::*;
pub use payments::{CheckoutSession, CreditPackage, PaymentGateway, SessionStatus};
pub use routes::create_router;
