// Sales Ledger - Web Server
// Dashboard + JSON API + Telegram webhook, all backed by one ledger

use anyhow::{Context, Result};
use sales_ledger::{build_router, init_tracing, AppState, Ledger, ServerConfig};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Missing TELEGRAM_TOKEN or a bad PORT stops startup here
    let config = ServerConfig::from_env().context("Invalid configuration")?;
    init_tracing(config.base.log_json, "info");

    println!("🌐 Sales Ledger - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let data_file = config.base.data_file.clone();
    let ledger = tokio::task::spawn_blocking(move || Ledger::open(data_file))
        .await
        .context("Ledger loader panicked")?
        .with_context(|| format!("Cannot open ledger {}", config.base.data_file.display()))?;
    println!("✓ Ledger opened: {:?} ({} sales)", ledger.path(), ledger.len());

    let state = AppState::new(
        Arc::new(ledger),
        config.base.grammar,
        &config.telegram_token,
    );
    let app = build_router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!(addr = %addr, grammar = %config.base.grammar, "server listening");
    println!("\n🚀 Server running on http://{}", addr);
    println!("   UI:      http://{}/", addr);
    println!("   API:     http://{}/api/sales", addr);
    println!("   Webhook: POST /telegram/<TELEGRAM_TOKEN>");
    println!("   Register it once with Telegram:");
    println!(
        "     curl \"https://api.telegram.org/bot<TELEGRAM_TOKEN>/setWebhook?url=https://<public-host>/telegram/<TELEGRAM_TOKEN>\""
    );
    println!("   Format:  {}", config.base.grammar.hint());
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server failed")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
