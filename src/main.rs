// Credit Prediction Market - Main Entry Point

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use credit_market::{create_router, AppState, Config, SharedState};

#[tokio::main]
async fn main() -> Result<()> {
    // Override with RUST_LOG, e.g. RUST_LOG=credit_market=debug,tower_http=debug
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    println!("\n═══════════════════════════════════════════════");
    println!("     🎲 Credit Prediction Market");
    println!("═══════════════════════════════════════════════\n");

    let config = Config::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", config.host, config.port))?;
    let autosave_secs = config.autosave_secs;

    let state: SharedState = AppState::load_or_new(config)?.shared();

    if autosave_secs > 0 {
        let autosave_state = state.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(autosave_secs));
            interval.tick().await;
            loop {
                interval.tick().await;
                if let Err(e) = autosave_state.save_to_disk() {
                    error!("❌ Autosave failed: {:#}", e);
                }
            }
        });
    }

    let app = create_router(state.clone());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    println!("╔════════════════════════════════════════════╗");
    println!("║   🚀 SERVER RUNNING                        ║");
    println!("║   📡 http://{:<31}║", addr);
    println!("╚════════════════════════════════════════════╝\n");

    println!("📋 Available Endpoints:");
    println!("   GET  /markets                 - List markets (status, category, search, sort)");
    println!("   GET  /markets/:id             - Market details with odds");
    println!("   GET  /categories              - Active markets per category");
    println!("   GET  /packages                - Credit packages");
    println!("   POST /bets                    - Place bet");
    println!("   GET  /me, /me/bets, /me/transactions");
    println!("   POST /payments/checkout       - Buy credits");
    println!("   POST /payments/verify         - Confirm a paid checkout");
    println!("   POST /withdrawals             - Withdraw credits via PIX");
    println!("   *    /admin/...               - Market & bet administration\n");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("💾 Saving state to disk...");
    if let Err(e) = state.save_to_disk() {
        error!("❌ Failed to save state: {:#}", e);
    }
    info!("👋 Goodbye!");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install CTRL+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("🛑 Shutdown signal received...");
}
