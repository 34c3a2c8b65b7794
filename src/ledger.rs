/// Credit Ledger for the prediction market
///
/// Owns every profile, market, bet and credit transaction. Each public
/// operation validates before it mutates, so a returned error leaves the
/// ledger exactly as it was. Callers hold the state lock for the whole
/// call, which makes each operation (debit + bet + volume update +
/// transaction record, resolution payouts, withdrawals) atomic.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::info;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::market_resolve::{self, settle_bets};
use crate::models::*;

const ACTIVITY_CAP: usize = 1000;

// ============================================================================
// RULES & SNAPSHOT
// ============================================================================

/// Limits the ledger enforces, taken from `Config`
#[derive(Debug, Clone)]
pub struct LedgerRules {
    pub starting_balance: Decimal,
    pub min_bet: Decimal,
    pub min_withdraw_credits: Decimal,
    pub credit_to_brl: Decimal,
}

impl From<&Config> for LedgerRules {
    fn from(config: &Config) -> Self {
        Self {
            starting_balance: config.starting_balance,
            min_bet: config.min_bet,
            min_withdraw_credits: config.min_withdraw_credits,
            credit_to_brl: config.credit_to_brl,
        }
    }
}

impl Default for LedgerRules {
    fn default() -> Self {
        LedgerRules::from(&Config::default())
    }
}

/// Persisted form of the ledger
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub profiles: HashMap<String, Profile>,
    pub markets: HashMap<String, Market>,
    pub bets: HashMap<String, Bet>,
    pub transactions: Vec<Transaction>,
}

// ============================================================================
// LEDGER
// ============================================================================

#[derive(Debug)]
pub struct Ledger {
    pub profiles: HashMap<String, Profile>,
    pub markets: HashMap<String, Market>,
    pub bets: HashMap<String, Bet>,
    pub transactions: Vec<Transaction>,
    pub activity: VecDeque<String>,
    rules: LedgerRules,
}

impl Ledger {
    pub fn new(rules: LedgerRules) -> Self {
        Self {
            profiles: HashMap::new(),
            markets: HashMap::new(),
            bets: HashMap::new(),
            transactions: Vec::new(),
            activity: VecDeque::new(),
            rules,
        }
    }

    pub fn rules(&self) -> &LedgerRules {
        &self.rules
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            profiles: self.profiles.clone(),
            markets: self.markets.clone(),
            bets: self.bets.clone(),
            transactions: self.transactions.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: LedgerSnapshot) {
        self.profiles = snapshot.profiles;
        self.markets = snapshot.markets;
        self.bets = snapshot.bets;
        self.transactions = snapshot.transactions;
    }

    // ===== PROFILES =====

    /// Create the profile on first sight, otherwise refresh what the
    /// identity provider says about it.
    pub fn ensure_profile(&mut self, user_id: &str, email: &str, is_admin: bool) -> Profile {
        if let Some(profile) = self.profiles.get_mut(user_id) {
            profile.email = email.to_string();
            profile.is_admin = is_admin;
            return profile.clone();
        }

        let profile = Profile {
            id: user_id.to_string(),
            email: email.to_string(),
            full_name: None,
            balance: self.rules.starting_balance,
            is_admin,
            created_at: Utc::now(),
        };
        self.profiles.insert(user_id.to_string(), profile.clone());
        self.log_activity("👤", "PROFILE_CREATED", &format!("{} ({})", user_id, email));
        profile
    }

    pub fn profile(&self, user_id: &str) -> AppResult<&Profile> {
        self.profiles
            .get(user_id)
            .ok_or_else(|| AppError::NotFound(format!("Profile {}", user_id)))
    }

    pub fn balance(&self, user_id: &str) -> Decimal {
        self.profiles.get(user_id).map(|p| p.balance).unwrap_or(Decimal::ZERO)
    }

    // ===== MARKETS =====

    pub fn create_market(&mut self, new: NewMarket) -> AppResult<Market> {
        require_text("title", &new.title)?;
        require_text("description", &new.description)?;
        require_text("category", &new.category)?;

        let (candidate_1_name, candidate_2_name) = match new.market_type {
            MarketType::YesNo => (None, None),
            MarketType::Candidates => {
                let c1 = trimmed(new.candidate_1_name);
                let c2 = trimmed(new.candidate_2_name);
                match (c1, c2) {
                    (Some(c1), Some(c2)) if c1 == c2 => {
                        return Err(AppError::Validation("Candidates must have different names".into()));
                    }
                    (Some(c1), Some(c2)) => (Some(c1), Some(c2)),
                    _ => {
                        return Err(AppError::Validation("Both candidate names are required".into()));
                    }
                }
            }
        };

        let market = Market {
            id: uuid::Uuid::new_v4().to_string(),
            title: new.title.trim().to_string(),
            description: new.description.trim().to_string(),
            category: new.category.trim().to_string(),
            image_url: trimmed(new.image_url),
            end_date: new.end_date,
            status: MarketStatus::Active,
            market_type: new.market_type,
            candidate_1_name,
            candidate_2_name,
            yes_volume: Decimal::ZERO,
            no_volume: Decimal::ZERO,
            total_volume: Decimal::ZERO,
            yes_percentage: market_resolve::OPENING_PERCENTAGE,
            result: None,
            created_at: Utc::now(),
            resolved_at: None,
        };

        self.markets.insert(market.id.clone(), market.clone());
        self.log_activity("📊", "MARKET_CREATED", &format!("{} | {}", market.id, market.title));
        Ok(market)
    }

    pub fn market(&self, market_id: &str) -> AppResult<&Market> {
        self.markets
            .get(market_id)
            .ok_or_else(|| AppError::NotFound(format!("Market {}", market_id)))
    }

    pub fn update_market(&mut self, market_id: &str, update: MarketUpdate) -> AppResult<Market> {
        let market = self.market(market_id)?;
        if market.status == MarketStatus::Resolved {
            return Err(AppError::Conflict("Resolved markets cannot be edited".into()));
        }
        if update.status == Some(MarketStatus::Resolved) {
            return Err(AppError::Validation("Use the resolve endpoint to resolve a market".into()));
        }
        for (field, value) in [
            ("title", &update.title),
            ("description", &update.description),
            ("category", &update.category),
        ] {
            if let Some(value) = value {
                require_text(field, value)?;
            }
        }

        let market = self
            .markets
            .get_mut(market_id)
            .ok_or_else(|| AppError::NotFound(format!("Market {}", market_id)))?;
        if let Some(title) = update.title {
            market.title = title.trim().to_string();
        }
        if let Some(description) = update.description {
            market.description = description.trim().to_string();
        }
        if let Some(category) = update.category {
            market.category = category.trim().to_string();
        }
        if update.image_url.is_some() {
            market.image_url = trimmed(update.image_url);
        }
        if let Some(end_date) = update.end_date {
            market.end_date = end_date;
        }
        if let Some(status) = update.status {
            market.status = status;
        }

        let market = market.clone();
        self.log_activity("✏️", "MARKET_UPDATED", &format!("{} | {:?}", market.id, market.status));
        Ok(market)
    }

    /// Remove a market. Stakes of its pending bets go back to the bettors.
    pub fn delete_market(&mut self, market_id: &str) -> AppResult<usize> {
        let title = self.market(market_id)?.title.clone();

        let bet_ids: Vec<String> = self
            .bets
            .values()
            .filter(|b| b.market_id == market_id)
            .map(|b| b.id.clone())
            .collect();

        let mut refunded = 0;
        for bet_id in &bet_ids {
            if let Some(bet) = self.bets.remove(bet_id) {
                if bet.status == BetStatus::Pending {
                    self.refund(&bet, &format!("Refund of bet on deleted market {}", title));
                    refunded += 1;
                }
            }
        }

        self.markets.remove(market_id);
        self.log_activity(
            "🗑️",
            "MARKET_DELETED",
            &format!("{} | {} bets removed, {} refunded", market_id, bet_ids.len(), refunded),
        );
        Ok(refunded)
    }

    pub fn list_markets(&self, query: &MarketQuery) -> AppResult<Vec<Market>> {
        let status = match query.status.as_deref().unwrap_or("active") {
            "all" => None,
            "active" => Some(MarketStatus::Active),
            "closed" => Some(MarketStatus::Closed),
            "resolved" => Some(MarketStatus::Resolved),
            other => return Err(AppError::Validation(format!("Unknown status filter: {}", other))),
        };
        let category = query.category.as_deref().filter(|c| *c != "all" && !c.is_empty());
        let search = query
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let mut markets: Vec<Market> = self
            .markets
            .values()
            .filter(|m| status.map_or(true, |s| m.status == s))
            .filter(|m| category.map_or(true, |c| m.category == c))
            .filter(|m| {
                search.as_ref().map_or(true, |needle| {
                    m.title.to_lowercase().contains(needle)
                        || m.description.to_lowercase().contains(needle)
                })
            })
            .cloned()
            .collect();

        match query.sort.as_deref().unwrap_or("recent") {
            "recent" => markets.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id))),
            "volume" => markets.sort_by(|a, b| b.total_volume.cmp(&a.total_volume).then_with(|| a.id.cmp(&b.id))),
            "ending" => markets.sort_by(|a, b| a.end_date.cmp(&b.end_date).then_with(|| a.id.cmp(&b.id))),
            other => return Err(AppError::Validation(format!("Unknown sort order: {}", other))),
        }
        Ok(markets)
    }

    /// Active markets per category, plus an `all` total
    pub fn category_counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        let mut total = 0;
        for market in self.markets.values().filter(|m| m.status == MarketStatus::Active) {
            *counts.entry(market.category.clone()).or_insert(0) += 1;
            total += 1;
        }
        counts.insert("all".to_string(), total);
        counts
    }

    // ===== BETS =====

    pub fn place_bet(
        &mut self,
        user_id: &str,
        market_id: &str,
        prediction: bool,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> AppResult<BetReceipt> {
        if amount <= Decimal::ZERO || amount < self.rules.min_bet {
            return Err(AppError::Validation(format!(
                "Bet amount must be at least {}",
                self.rules.min_bet
            )));
        }

        let market = self.market(market_id)?;
        if !market.accepts_bets(now) {
            return Err(AppError::MarketClosed(market_id.to_string()));
        }
        let title = market.title.clone();

        let available = self.profile(user_id)?.balance;
        if available < amount {
            return Err(AppError::InsufficientBalance { available, required: amount });
        }

        // Validated; from here on nothing can fail.
        let new_balance = self.adjust_balance(user_id, -amount);

        let market = self
            .markets
            .get_mut(market_id)
            .ok_or_else(|| AppError::NotFound(format!("Market {}", market_id)))?;
        if prediction {
            market.yes_volume += amount;
        } else {
            market.no_volume += amount;
        }
        market.total_volume += amount;
        market.yes_percentage = market_resolve::yes_percentage(market.yes_volume, market.total_volume);
        let yes_percentage = market.yes_percentage;

        let bet = Bet {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            market_id: market_id.to_string(),
            amount,
            prediction,
            status: BetStatus::Pending,
            payout: None,
            created_at: now,
            resolved_at: None,
        };
        self.bets.insert(bet.id.clone(), bet.clone());
        self.transactions.push(Transaction::new(
            user_id,
            -amount,
            TxType::Bet,
            format!("Bet on {}", title),
        ));

        self.log_activity(
            "🎯",
            "BET",
            &format!("{} bet {} credits on {} ({}) | yes {}%", user_id, amount, market_id, prediction, yes_percentage),
        );

        Ok(BetReceipt {
            success: true,
            bet,
            new_balance,
            yes_percentage,
            odd: market_resolve::decimal_odd(prediction, yes_percentage),
            potential_return: market_resolve::potential_return(amount, prediction, yes_percentage),
        })
    }

    /// A user's bets, newest first, with the market they were placed on
    pub fn user_bets(&self, user_id: &str) -> Vec<UserBetView> {
        let mut views: Vec<UserBetView> = self
            .bets
            .values()
            .filter(|b| b.user_id == user_id)
            .filter_map(|bet| {
                let market = self.markets.get(&bet.market_id)?;
                Some(UserBetView {
                    bet: bet.clone(),
                    market: market.summary(),
                    option_label: market.option_label(bet.prediction),
                    odd: market_resolve::decimal_odd(bet.prediction, market.yes_percentage),
                    potential_return: market_resolve::potential_return(
                        bet.amount,
                        bet.prediction,
                        market.yes_percentage,
                    ),
                })
            })
            .collect();
        views.sort_by(|a, b| {
            b.bet.created_at
                .cmp(&a.bet.created_at)
                .then_with(|| a.bet.id.cmp(&b.bet.id))
        });
        views
    }

    pub fn all_bets(&self) -> Vec<Bet> {
        let mut bets: Vec<Bet> = self.bets.values().cloned().collect();
        bets.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        bets
    }

    /// Administrative correction of a pending bet. Any change in stake is
    /// settled against the bettor's balance.
    pub fn update_bet(&mut self, bet_id: &str, update: BetUpdate) -> AppResult<Bet> {
        let bet = self
            .bets
            .get(bet_id)
            .ok_or_else(|| AppError::NotFound(format!("Bet {}", bet_id)))?
            .clone();
        if bet.status != BetStatus::Pending {
            return Err(AppError::Conflict("Only pending bets can be edited".into()));
        }

        let new_amount = update.amount.unwrap_or(bet.amount);
        if new_amount <= Decimal::ZERO || new_amount < self.rules.min_bet {
            return Err(AppError::Validation(format!(
                "Bet amount must be at least {}",
                self.rules.min_bet
            )));
        }
        let new_market_id = update.market_id.unwrap_or_else(|| bet.market_id.clone());
        if self.market(&new_market_id)?.status == MarketStatus::Resolved {
            return Err(AppError::Conflict("Cannot move a bet onto a resolved market".into()));
        }

        let diff = new_amount - bet.amount;
        if diff > Decimal::ZERO {
            let available = self.balance(&bet.user_id);
            if available < diff {
                return Err(AppError::InsufficientBalance { available, required: diff });
            }
        }

        if !diff.is_zero() {
            self.adjust_balance(&bet.user_id, -diff);
            self.transactions.push(Transaction::new(
                &bet.user_id,
                -diff,
                TxType::Adjustment,
                format!("Adjustment of bet {}", bet.id),
            ));
        }

        let updated = {
            let stored = self
                .bets
                .get_mut(bet_id)
                .ok_or_else(|| AppError::NotFound(format!("Bet {}", bet_id)))?;
            stored.amount = new_amount;
            stored.prediction = update.prediction.unwrap_or(stored.prediction);
            stored.market_id = new_market_id.clone();
            stored.clone()
        };

        self.recompute_market_totals(&bet.market_id);
        if new_market_id != bet.market_id {
            self.recompute_market_totals(&new_market_id);
        }

        self.log_activity("✏️", "BET_UPDATED", &format!("{} | {} credits", bet_id, new_amount));
        Ok(updated)
    }

    /// Remove a bet. A pending stake is refunded first.
    pub fn delete_bet(&mut self, bet_id: &str) -> AppResult<Bet> {
        let bet = self
            .bets
            .remove(bet_id)
            .ok_or_else(|| AppError::NotFound(format!("Bet {}", bet_id)))?;

        if bet.status == BetStatus::Pending {
            self.refund(&bet, &format!("Refund of deleted bet {}", bet.id));
            self.recompute_market_totals(&bet.market_id);
        }

        self.log_activity("🗑️", "BET_DELETED", &format!("{} | {:?}", bet_id, bet.status));
        Ok(bet)
    }

    // ===== RESOLUTION =====

    pub fn resolve_market(&mut self, market_id: &str, result: bool, now: DateTime<Utc>) -> AppResult<ResolutionSummary> {
        let market = self.market(market_id)?;
        if market.status == MarketStatus::Resolved {
            return Err(AppError::Conflict(format!("Market {} is already resolved", market_id)));
        }
        let title = market.title.clone();

        let settlements = settle_bets(self.bets.values().filter(|b| b.market_id == market_id), result);

        let mut summary = ResolutionSummary {
            market_id: market_id.to_string(),
            result,
            winners: 0,
            losers: 0,
            total_paid: Decimal::ZERO,
        };

        for settlement in settlements {
            if let Some(bet) = self.bets.get_mut(&settlement.bet_id) {
                bet.status = settlement.status;
                bet.resolved_at = Some(now);
                bet.payout = Some(settlement.payout);
            }

            if settlement.status == BetStatus::Won {
                summary.winners += 1;
                summary.total_paid += settlement.payout;
                self.adjust_balance(&settlement.user_id, settlement.payout);
                self.transactions.push(Transaction::new(
                    &settlement.user_id,
                    settlement.payout,
                    TxType::Win,
                    format!("Win on {}", title),
                ));
            } else {
                summary.losers += 1;
            }
        }

        if let Some(market) = self.markets.get_mut(market_id) {
            market.status = MarketStatus::Resolved;
            market.result = Some(result);
            market.resolved_at = Some(now);
        }

        self.log_activity(
            "✅",
            "MARKET_RESOLVED",
            &format!(
                "{} | result {} | {} winners paid {} credits, {} losers",
                market_id, result, summary.winners, summary.total_paid, summary.losers
            ),
        );
        Ok(summary)
    }

    // ===== CREDITS =====

    /// Credit a paid checkout session exactly once.
    pub fn credit_purchase(
        &mut self,
        user_id: &str,
        credits: Decimal,
        session_id: &str,
        payment_id: Option<String>,
    ) -> AppResult<PurchaseOutcome> {
        if self.is_session_processed(session_id) {
            info!("Payment session {} already processed", session_id);
            return Ok(PurchaseOutcome::AlreadyProcessed);
        }
        if credits <= Decimal::ZERO {
            return Err(AppError::Validation("Invalid credits amount".into()));
        }
        self.profile(user_id)?;

        let new_balance = self.adjust_balance(user_id, credits);
        let mut tx = Transaction::new(
            user_id,
            credits,
            TxType::Deposit,
            format!("Purchase of {} credits", credits.normalize()),
        );
        tx.payment_session_id = Some(session_id.to_string());
        tx.payment_id = payment_id;
        self.transactions.push(tx);

        self.log_activity("📥", "DEPOSIT", &format!("{} +{} credits | session {}", user_id, credits, session_id));
        Ok(PurchaseOutcome::Credited { credits, new_balance })
    }

    pub fn is_session_processed(&self, session_id: &str) -> bool {
        self.transactions
            .iter()
            .any(|tx| tx.payment_session_id.as_deref() == Some(session_id))
    }

    /// Convert credits to a BRL payout request to a PIX key.
    pub fn withdraw(&mut self, user_id: &str, credits: Option<Decimal>, pix_key: Option<&str>) -> AppResult<WithdrawalReceipt> {
        let minimum = self.rules.min_withdraw_credits;
        let credits = match credits {
            Some(c) if c >= minimum && c > Decimal::ZERO => c,
            _ => return Err(AppError::Validation(format!("Minimum withdrawal is {} credits", minimum))),
        };
        let pix_key = pix_key.map(str::trim).filter(|k| !k.is_empty())
            .ok_or_else(|| AppError::Validation("PIX key is required".into()))?
            .to_string();

        let available = self.profile(user_id)?.balance;
        if available < credits {
            return Err(AppError::InsufficientBalance { available, required: credits });
        }

        let brl = brl_value(credits, self.rules.credit_to_brl);
        let amount = format!("{:.2}", brl);

        let new_balance = self.adjust_balance(user_id, -credits);
        self.transactions.push(Transaction::new(
            user_id,
            -credits,
            TxType::Withdrawal,
            format!("Withdrawal of {} credits (R$ {}) to PIX: {}", credits.normalize(), amount, pix_key),
        ));

        self.log_activity("💸", "WITHDRAWAL", &format!("{} -{} credits | R$ {}", user_id, credits, amount));
        Ok(WithdrawalReceipt {
            success: true,
            message: "Withdrawal request processed successfully".to_string(),
            amount,
            credits,
            new_balance,
        })
    }

    pub fn transactions_for(&self, user_id: &str) -> Vec<Transaction> {
        // Walk the log backwards; the stable sort keeps later entries first on ties.
        let mut txs: Vec<Transaction> = self
            .transactions
            .iter()
            .rev()
            .filter(|tx| tx.user_id == user_id)
            .cloned()
            .collect();
        txs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        txs
    }

    // ===== ACTIVITY =====

    pub fn log_activity(&mut self, emoji: &str, action: &str, details: &str) {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S");
        let entry = format!("[{}] {} {} | {}", timestamp, emoji, action, details);
        info!("{}", entry);
        self.activity.push_back(entry);
        while self.activity.len() > ACTIVITY_CAP {
            self.activity.pop_front();
        }
    }

    // ===== HELPERS =====

    fn adjust_balance(&mut self, user_id: &str, delta: Decimal) -> Decimal {
        match self.profiles.get_mut(user_id) {
            Some(profile) => {
                profile.balance += delta;
                profile.balance
            }
            None => Decimal::ZERO,
        }
    }

    fn refund(&mut self, bet: &Bet, description: &str) {
        self.adjust_balance(&bet.user_id, bet.amount);
        self.transactions.push(Transaction::new(
            &bet.user_id,
            bet.amount,
            TxType::Refund,
            description.to_string(),
        ));
    }

    /// Rebuild a market's volumes from the bets still standing on it.
    fn recompute_market_totals(&mut self, market_id: &str) {
        let (yes, no) = self
            .bets
            .values()
            .filter(|b| b.market_id == market_id)
            .fold((Decimal::ZERO, Decimal::ZERO), |(yes, no), b| {
                if b.prediction { (yes + b.amount, no) } else { (yes, no + b.amount) }
            });

        if let Some(market) = self.markets.get_mut(market_id) {
            market.yes_volume = yes;
            market.no_volume = no;
            market.total_volume = yes + no;
            market.yes_percentage = market_resolve::yes_percentage(yes, yes + no);
        }
    }
}

/// BRL value of `credits`, truncated to whole centavos
pub fn brl_value(credits: Decimal, credit_to_brl: Decimal) -> Decimal {
    let cents = (credits * credit_to_brl * Decimal::ONE_HUNDRED).floor();
    cents / Decimal::ONE_HUNDRED
}

fn require_text(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn ledger_with_users() -> Ledger {
        let mut ledger = Ledger::new(LedgerRules::default());
        for user in ["alice", "bob", "carol"] {
            ledger.ensure_profile(user, &format!("{}@example.com", user), false);
            ledger.adjust_balance(user, dec!(1000));
        }
        ledger
    }

    fn new_market(title: &str) -> NewMarket {
        NewMarket {
            title: title.to_string(),
            description: "Resolves YES if it happens".to_string(),
            category: "Politics".to_string(),
            image_url: None,
            end_date: Utc::now() + Duration::days(7),
            market_type: MarketType::YesNo,
            candidate_1_name: None,
            candidate_2_name: None,
        }
    }

    #[test]
    fn test_place_bet_updates_everything_together() {
        let mut ledger = ledger_with_users();
        let market = ledger.create_market(new_market("Rain tomorrow?")).unwrap();

        let receipt = ledger.place_bet("alice", &market.id, true, dec!(30), Utc::now()).unwrap();
        assert_eq!(receipt.new_balance, dec!(970));
        assert_eq!(receipt.yes_percentage, dec!(100));
        assert_eq!(receipt.odd, Some(dec!(1)));

        let receipt = ledger.place_bet("bob", &market.id, false, dec!(10), Utc::now()).unwrap();
        assert_eq!(receipt.yes_percentage, dec!(75));
        assert_eq!(receipt.odd, Some(dec!(4)));
        assert_eq!(receipt.potential_return, Some(dec!(40)));

        let market = ledger.market(&market.id).unwrap();
        assert_eq!(market.total_volume, dec!(40));
        assert_eq!(market.yes_volume, dec!(30));
        assert_eq!(ledger.transactions_for("bob")[0].amount, dec!(-10));
    }

    #[test]
    fn test_rejected_bet_changes_nothing() {
        let mut ledger = ledger_with_users();
        let market = ledger.create_market(new_market("Rain tomorrow?")).unwrap();

        let err = ledger.place_bet("alice", &market.id, true, dec!(5000), Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::InsufficientBalance { .. }));
        assert_eq!(ledger.balance("alice"), dec!(1000));
        assert!(ledger.bets.is_empty());
        assert!(ledger.transactions.is_empty());
        assert_eq!(ledger.market(&market.id).unwrap().total_volume, Decimal::ZERO);

        let err = ledger.place_bet("alice", &market.id, true, dec!(0.5), Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_no_bets_after_end_date() {
        let mut ledger = ledger_with_users();
        let market = ledger.create_market(new_market("Rain tomorrow?")).unwrap();
        let later = Utc::now() + Duration::days(8);

        let err = ledger.place_bet("alice", &market.id, true, dec!(10), later).unwrap_err();
        assert!(matches!(err, AppError::MarketClosed(_)));
    }

    #[test]
    fn test_resolution_pays_winners() {
        let mut ledger = ledger_with_users();
        let market = ledger.create_market(new_market("Rain tomorrow?")).unwrap();
        ledger.place_bet("alice", &market.id, true, dec!(30), Utc::now()).unwrap();
        ledger.place_bet("bob", &market.id, true, dec!(10), Utc::now()).unwrap();
        ledger.place_bet("carol", &market.id, false, dec!(60), Utc::now()).unwrap();

        let summary = ledger.resolve_market(&market.id, true, Utc::now()).unwrap();
        assert_eq!(summary.winners, 2);
        assert_eq!(summary.losers, 1);
        assert_eq!(summary.total_paid, dec!(100));

        assert_eq!(ledger.balance("alice"), dec!(1045));
        assert_eq!(ledger.balance("bob"), dec!(1015));
        assert_eq!(ledger.balance("carol"), dec!(940));

        let err = ledger.resolve_market(&market.id, false, Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(ledger.balance("alice"), dec!(1045));
    }

    #[test]
    fn test_candidate_market_validation() {
        let mut ledger = ledger_with_users();
        let mut new = new_market("Who wins?");
        new.market_type = MarketType::Candidates;
        new.candidate_1_name = Some("Ana".into());
        new.candidate_2_name = Some("Ana".into());
        assert!(ledger.create_market(new.clone()).is_err());

        new.candidate_2_name = None;
        assert!(ledger.create_market(new.clone()).is_err());

        new.candidate_2_name = Some("Bruno".into());
        let market = ledger.create_market(new).unwrap();
        assert_eq!(market.option_label(false), "Bruno");
    }

    #[test]
    fn test_purchase_is_idempotent() {
        let mut ledger = ledger_with_users();
        let first = ledger.credit_purchase("alice", dec!(500), "cs_1", Some("pi_1".into())).unwrap();
        assert_eq!(first, PurchaseOutcome::Credited { credits: dec!(500), new_balance: dec!(1500) });

        let second = ledger.credit_purchase("alice", dec!(500), "cs_1", Some("pi_1".into())).unwrap();
        assert_eq!(second, PurchaseOutcome::AlreadyProcessed);
        assert_eq!(ledger.balance("alice"), dec!(1500));

        assert!(ledger.credit_purchase("alice", dec!(0), "cs_2", None).is_err());
    }

    #[test]
    fn test_withdraw_rules() {
        let mut ledger = ledger_with_users();

        assert!(ledger.withdraw("alice", Some(dec!(99)), Some("key")).is_err());
        assert!(ledger.withdraw("alice", Some(dec!(100)), Some("   ")).is_err());
        assert!(ledger.withdraw("alice", Some(dec!(5000)), Some("key")).is_err());
        assert_eq!(ledger.balance("alice"), dec!(1000));

        let receipt = ledger.withdraw("alice", Some(dec!(255)), Some(" alice@pix ")).unwrap();
        assert_eq!(receipt.amount, "25.50");
        assert_eq!(receipt.new_balance, dec!(745));

        let tx = &ledger.transactions_for("alice")[0];
        assert_eq!(tx.tx_type, TxType::Withdrawal);
        assert_eq!(tx.amount, dec!(-255));
        assert!(tx.description.ends_with("PIX: alice@pix"));
    }

    #[test]
    fn test_brl_value_truncates() {
        assert_eq!(brl_value(dec!(100), dec!(0.10)), dec!(10));
        assert_eq!(brl_value(dec!(100.59), dec!(0.10)), dec!(10.05));
    }

    #[test]
    fn test_delete_market_refunds_pending() {
        let mut ledger = ledger_with_users();
        let market = ledger.create_market(new_market("Rain tomorrow?")).unwrap();
        ledger.place_bet("alice", &market.id, true, dec!(40), Utc::now()).unwrap();

        assert_eq!(ledger.delete_market(&market.id).unwrap(), 1);
        assert_eq!(ledger.balance("alice"), dec!(1000));
        assert!(ledger.bets.is_empty());
        assert!(ledger.market(&market.id).is_err());
    }

    #[test]
    fn test_update_bet_moves_stake() {
        let mut ledger = ledger_with_users();
        let m1 = ledger.create_market(new_market("First?")).unwrap();
        let m2 = ledger.create_market(new_market("Second?")).unwrap();
        let receipt = ledger.place_bet("alice", &m1.id, true, dec!(50), Utc::now()).unwrap();

        let update = BetUpdate {
            amount: Some(dec!(80)),
            prediction: Some(false),
            market_id: Some(m2.id.clone()),
        };
        let bet = ledger.update_bet(&receipt.bet.id, update).unwrap();
        assert_eq!(bet.amount, dec!(80));
        assert_eq!(ledger.balance("alice"), dec!(920));
        assert_eq!(ledger.market(&m1.id).unwrap().total_volume, Decimal::ZERO);
        assert_eq!(ledger.market(&m1.id).unwrap().yes_percentage, dec!(50));
        assert_eq!(ledger.market(&m2.id).unwrap().no_volume, dec!(80));
        assert_eq!(ledger.market(&m2.id).unwrap().yes_percentage, dec!(0));

        ledger.delete_bet(&bet.id).unwrap();
        assert_eq!(ledger.balance("alice"), dec!(1000));
    }

    #[test]
    fn test_list_markets_filters() {
        let mut ledger = ledger_with_users();
        let a = ledger.create_market(new_market("Bitcoin above 100k?")).unwrap();
        let mut sports = new_market("Final score over 2.5?");
        sports.category = "Sports".into();
        ledger.create_market(sports).unwrap();
        ledger.place_bet("alice", &a.id, true, dec!(10), Utc::now()).unwrap();

        let query = MarketQuery { search: Some("bitcoin".into()), ..Default::default() };
        assert_eq!(ledger.list_markets(&query).unwrap().len(), 1);

        let query = MarketQuery { category: Some("Sports".into()), ..Default::default() };
        assert_eq!(ledger.list_markets(&query).unwrap().len(), 1);

        let query = MarketQuery { sort: Some("volume".into()), ..Default::default() };
        assert_eq!(ledger.list_markets(&query).unwrap()[0].id, a.id);

        let counts = ledger.category_counts();
        assert_eq!(counts["all"], 2);
        assert_eq!(counts["Sports"], 1);

        let query = MarketQuery { status: Some("bogus".into()), ..Default::default() };
        assert!(ledger.list_markets(&query).is_err());
    }
    #[test]
    fn test_update_market_guards_resolution() {
        let mut ledger = ledger_with_users();
        let market = ledger.create_market(new_market("Rain tomorrow?")).unwrap();

        let update = MarketUpdate { status: Some(MarketStatus::Resolved), ..Default::default() };
        assert!(matches!(ledger.update_market(&market.id, update), Err(AppError::Validation(_))));
        assert_eq!(ledger.market(&market.id).unwrap().status, MarketStatus::Active);

        ledger.resolve_market(&market.id, true, Utc::now()).unwrap();
        let update = MarketUpdate { title: Some("Renamed".into()), ..Default::default() };
        assert!(matches!(ledger.update_market(&market.id, update), Err(AppError::Conflict(_))));
        assert_eq!(ledger.market(&market.id).unwrap().title, "Rain tomorrow?");
    }

    #[test]
    fn test_ending_sort_puts_soonest_first() {
        let mut ledger = ledger_with_users();
        let mut later = new_market("Later?");
        later.end_date = Utc::now() + Duration::days(30);
        let later = ledger.create_market(later).unwrap();
        let mut sooner = new_market("Sooner?");
        sooner.end_date = Utc::now() + Duration::days(2);
        let sooner = ledger.create_market(sooner).unwrap();

        let query = MarketQuery { sort: Some("ending".into()), ..Default::default() };
        let ids: Vec<String> = ledger.list_markets(&query).unwrap().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![sooner.id, later.id]);
    }

    #[test]
    fn test_activity_log_is_capped() {
        let mut ledger = Ledger::new(LedgerRules::default());
        for i in 0..1005 {
            ledger.log_activity("📝", "NOTE", &format!("entry-{}", i));
        }
        assert_eq!(ledger.activity.len(), ACTIVITY_CAP);
        assert!(ledger.activity.front().unwrap().ends_with("| entry-5"));
        assert!(ledger.activity.back().unwrap().ends_with("| entry-1004"));
    }

    #[test]
    fn test_resolution_without_winning_stake() {
        let mut ledger = ledger_with_users();
        let market = ledger.create_market(new_market("Rain tomorrow?")).unwrap();
        ledger.place_bet("alice", &market.id, false, dec!(40), Utc::now()).unwrap();
        ledger.place_bet("bob", &market.id, false, dec!(10), Utc::now()).unwrap();

        let summary = ledger.resolve_market(&market.id, true, Utc::now()).unwrap();
        assert_eq!(summary.winners, 0);
        assert_eq!(summary.losers, 2);
        assert_eq!(summary.total_paid, Decimal::ZERO);
        assert_eq!(ledger.balance("alice"), dec!(960));
        assert_eq!(ledger.balance("bob"), dec!(990));
        assert!(ledger.bets.values().all(|b| b.status == BetStatus::Lost));
    }

    #[test]
    fn test_resolution_never_pays_more_than_the_pool() {
        let mut ledger = ledger_with_users();
        ledger.ensure_profile("dave", "dave@example.com", false);
        ledger.adjust_balance("dave", dec!(10));
        let market = ledger.create_market(new_market("Rain tomorrow?")).unwrap();
        for user in ["alice", "bob", "carol"] {
            ledger.place_bet(user, &market.id, true, dec!(1), Utc::now()).unwrap();
        }
        ledger.place_bet("dave", &market.id, false, dec!(2), Utc::now()).unwrap();

        let summary = ledger.resolve_market(&market.id, true, Utc::now()).unwrap();
        assert!(summary.total_paid <= dec!(5));
        assert_eq!(ledger.balance("alice"), dec!(1000.66));
    }

    #[test]
    fn test_update_bet_rejections() {
        let mut ledger = ledger_with_users();
        let market = ledger.create_market(new_market("Rain tomorrow?")).unwrap();
        let bet = ledger.place_bet("alice", &market.id, true, dec!(900), Utc::now()).unwrap().bet;

        let raise = BetUpdate { amount: Some(dec!(1200)), ..Default::default() };
        assert!(matches!(ledger.update_bet(&bet.id, raise), Err(AppError::InsufficientBalance { .. })));
        assert_eq!(ledger.balance("alice"), dec!(100));

        let tiny = BetUpdate { amount: Some(dec!(0.5)), ..Default::default() };
        assert!(matches!(ledger.update_bet(&bet.id, tiny), Err(AppError::Validation(_))));
        assert_eq!(ledger.bets[&bet.id].amount, dec!(900));

        ledger.resolve_market(&market.id, true, Utc::now()).unwrap();
        let late = BetUpdate { prediction: Some(false), ..Default::default() };
        assert!(matches!(ledger.update_bet(&bet.id, late), Err(AppError::Conflict(_))));
    }

    #[test]
    fn test_history_order_is_stable_on_equal_timestamps() {
        let mut ledger = ledger_with_users();
        let at = Utc::now();
        for description in ["first", "second", "third"] {
            let mut tx = Transaction::new("alice", dec!(1), TxType::Adjustment, description.to_string());
            tx.created_at = at;
            ledger.transactions.push(tx);
        }
        let order: Vec<String> = ledger.transactions_for("alice").into_iter().map(|t| t.description).collect();
        assert_eq!(order, vec!["third", "second", "first"]);

        let market = ledger.create_market(new_market("Rain tomorrow?")).unwrap();
        for user in ["alice", "bob", "carol"] {
            ledger.place_bet(user, &market.id, true, dec!(5), at).unwrap();
        }
        let first: Vec<String> = ledger.all_bets().into_iter().map(|b| b.id).collect();
        let mut sorted = first.clone();
        sorted.sort();
        assert_eq!(first, sorted);
    }
}
