// Application state management

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::auth::AuthBackend;
use crate::config::Config;
use crate::ledger::{Ledger, LedgerRules, LedgerSnapshot};
use crate::payments::PaymentGateway;

pub type SharedState = Arc<AppState>;

/// Everything a handler can reach. Only the ledger is mutable; its lock
/// is never held across an `.await`.
pub struct AppState {
    pub config: Config,
    pub auth: AuthBackend,
    pub payments: PaymentGateway,
    pub ledger: Mutex<Ledger>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        info!("🚀 Initializing credit prediction market...");

        let state = Self {
            auth: AuthBackend::from_config(&config),
            payments: PaymentGateway::new(&config),
            ledger: Mutex::new(Ledger::new(LedgerRules::from(&config))),
            config,
        };

        info!(
            "💎 Credits: 1 credit = R$ {} | min withdrawal {} | min bet {}",
            state.config.credit_to_brl, state.config.min_withdraw_credits, state.config.min_bet
        );
        state
    }

    /// Build state and pull in the last snapshot if one exists.
    ///
    /// An unreadable snapshot is an error: starting empty would let the
    /// next save overwrite every balance in it.
    pub fn load_or_new(config: Config) -> Result<Self> {
        let state = Self::new(config);
        let loaded = state
            .load_from_disk()
            .with_context(|| format!("Refusing to start over unreadable state file {}", state.config.data_path))?;
        if loaded {
            info!("✅ Loaded persisted state from {}", state.config.data_path);
        } else {
            info!("ℹ️  No persisted state found, starting fresh");
        }
        Ok(state)
    }

    pub fn shared(self) -> SharedState {
        Arc::new(self)
    }

    pub fn save_to_disk(&self) -> Result<()> {
        let json = {
            let ledger = self
                .ledger
                .lock()
                .map_err(|_| anyhow::anyhow!("ledger lock poisoned"))?;
            serde_json::to_string_pretty(&ledger.snapshot()).context("Failed to serialize state")?
        };

        let path = Path::new(&self.config.data_path);
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        // Write next to the target and rename so a crash never leaves half a file.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path.display()))?;

        info!("💾 State saved to {}", path.display());
        Ok(())
    }

    /// Ok(false) when there is no snapshot yet
    pub fn load_from_disk(&self) -> Result<bool> {
        let path = Path::new(&self.config.data_path);
        if !path.exists() {
            return Ok(false);
        }

        let json = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let snapshot: LedgerSnapshot = serde_json::from_str(&json).context("Failed to deserialize state")?;

        let mut ledger = self
            .ledger
            .lock()
            .map_err(|_| anyhow::anyhow!("ledger lock poisoned"))?;
        info!(
            "📒 Restoring {} profiles, {} markets, {} bets, {} transactions",
            snapshot.profiles.len(),
            snapshot.markets.len(),
            snapshot.bets.len(),
            snapshot.transactions.len()
        );
        ledger.restore(snapshot);
        Ok(true)
    }
}
