// =============================================================================
// Scalp Signal Bot — Main Entry Point
// =============================================================================
//
// Polls Binance futures klines for the configured symbols, evaluates the
// EMA-crossover / RSI strategy and pushes at most one Telegram signal per
// scan pass, subject to the persisted daily cap and cooldown.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod binance;
mod config;
mod error;
mod indicators;
mod market_data;
mod notify;
mod rate_gate;
mod scanner;
mod signals;
mod strategy;
mod types;

use std::path::Path;

use chrono::Utc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::binance::BinanceClient;
use crate::config::BotConfig;
use crate::notify::TelegramNotifier;
use crate::rate_gate::RateGate;
use crate::scanner::Scanner;

const DEFAULT_CONFIG_PATH: &str = "bot_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & logging ─────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Scalp Signal Bot — Starting Up                    ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    // ── 2. Config: file, then env overrides ──────────────────────────────
    let config_path =
        std::env::var("BOT_CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());

    let mut config = if Path::new(&config_path).exists() {
        BotConfig::load(&config_path).unwrap_or_else(|e| {
            warn!(path = %config_path, error = %e, "Failed to load config, using defaults");
            BotConfig::default()
        })
    } else {
        warn!(path = %config_path, "No config file, using defaults");
        BotConfig::default()
    };
    config.apply_env_overrides(|name| std::env::var(name).ok());
    config.validate()?;

    info!(
        symbols = ?config.symbols,
        interval = %config.interval,
        check_seconds = config.check_seconds,
        max_signals_per_day = config.max_signals_per_day,
        cooldown_minutes = config.cooldown_minutes,
        "Configured signal scan"
    );

    // ── 3. Collaborators ─────────────────────────────────────────────────
    let notifier = TelegramNotifier::from_env(config.http_timeout())?;
    let market = BinanceClient::new(config.http_timeout())?;
    let gate = RateGate::from_config(&config, Utc::now());
    info!(state = ?gate.state(), path = %config.state_path.display(), "Rate gate ready");

    let mut scanner = Scanner::new(&config, market, notifier, gate);

    if config.announce_startup {
        scanner.announce_startup().await;
    }

    info!("Scan loop running. Press Ctrl+C to stop.");

    // ── 4. Scan loop with graceful shutdown ──────────────────────────────
    // A pass is never interrupted; shutdown is honoured between passes.
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let outcome = scanner.scan_once(Utc::now()).await;
        debug!(outcome = %outcome, "scan pass finished");

        tokio::select! {
            _ = tokio::time::sleep(config.check_interval()) => {}
            res = &mut shutdown => {
                res?;
                warn!("Shutdown signal received — stopping");
                break;
            }
        }
    }

    info!("Scalp Signal Bot shut down complete.");
    Ok(())
}
