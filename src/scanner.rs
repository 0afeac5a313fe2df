// =============================================================================
// Scanner — one scan pass over the configured symbols
// =============================================================================
//
// Per pass:
//   1. Ask the rate gate once.  A closed gate ends the pass before any fetch.
//   2. Walk the symbol list in order.  For each symbol:
//        fetch bars  -> failure: warn, next symbol
//        evaluate    -> warming up: debug, next symbol / no signal: next symbol
//        notify      -> failure: warn, gate NOT committed, next symbol
//   3. The first delivered signal commits the gate and ends the pass.  At most
//      one signal is emitted per pass.
// =============================================================================

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::config::BotConfig;
use crate::error::BotError;
use crate::market_data::MarketData;
use crate::notify::{format_signal_message, format_startup_message, Notifier};
use crate::rate_gate::{GateVerdict, RateGate};
use crate::strategy::StrategyEngine;
use crate::types::Signal;

/// How a scan pass ended.
#[derive(Debug, Clone)]
pub enum ScanOutcome {
    /// The rate gate was closed; no symbol was evaluated.
    Gated(GateVerdict),
    /// A signal was delivered and committed; remaining symbols were skipped.
    Delivered(Signal),
    /// Every symbol was evaluated and none produced a delivered signal.
    NoSignal,
}

impl std::fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gated(verdict) => write!(f, "Gated({verdict})"),
            Self::Delivered(signal) => {
                write!(f, "Delivered({} {})", signal.direction, signal.symbol)
            }
            Self::NoSignal => write!(f, "NoSignal"),
        }
    }
}

pub struct Scanner<'a, M, N> {
    config: &'a BotConfig,
    market: M,
    notifier: N,
    gate: RateGate,
    /// Wall clock read when a delivery succeeds.
    clock: Box<dyn Fn() -> DateTime<Utc>>,
}

impl<'a, M, N> Scanner<'a, M, N>
where
    M: MarketData,
    N: Notifier,
{
    pub fn new(config: &'a BotConfig, market: M, notifier: N, gate: RateGate) -> Self {
        Self {
            config,
            market,
            notifier,
            gate,
            clock: Box::new(Utc::now),
        }
    }

    #[cfg(test)]
    fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    #[cfg(test)]
    fn gate(&self) -> &RateGate {
        &self.gate
    }

    /// Send the one-off "bot started" message.  Failure is only logged.
    pub async fn announce_startup(&self) {
        let text = format_startup_message(&self.config.symbols, &self.config.interval);
        match self.notifier.send(&text).await {
            Ok(()) => info!("startup announcement sent"),
            Err(e) => warn!(error = %e.chain(), "startup announcement failed"),
        }
    }

    /// Run one pass at `now`.
    pub async fn scan_once(&mut self, now: DateTime<Utc>) -> ScanOutcome {
        let verdict = self.gate.allow(now);
        if !verdict.is_allowed() {
            debug!(verdict = %verdict, "rate gate closed — skipping pass");
            return ScanOutcome::Gated(verdict);
        }

        let config = self.config;
        let params = &config.strategy_params;

        for symbol in &config.symbols {
            let bars = match self
                .market
                .fetch_bars(symbol, &config.interval, config.kline_limit)
                .await
            {
                Ok(bars) => bars,
                Err(e) => {
                    warn!(symbol = %symbol, error = %e.chain(), "market data fetch failed — skipping symbol");
                    continue;
                }
            };

            let mut signal = match StrategyEngine::evaluate_symbol(symbol, &bars, params, now) {
                Ok(Some(signal)) => signal,
                Ok(None) => continue,
                Err(e @ BotError::InsufficientHistory { .. }) => {
                    debug!(symbol = %symbol, reason = %e, "skipping symbol");
                    continue;
                }
                Err(e) => {
                    warn!(symbol = %symbol, error = %e.chain(), "evaluation failed — skipping symbol");
                    continue;
                }
            };

            let text = format_signal_message(
                &signal,
                config.utc_offset(),
                &config.timezone_label,
                &config.leverage_hint,
            );

            match self.notifier.send(&text).await {
                Ok(()) => {
                    // Fetches and sends can take a while; the cooldown runs
                    // from the moment of delivery, not from the pass start.
                    let delivered_at = (self.clock)();
                    signal.timestamp = delivered_at;
                    info!(
                        id = %signal.id,
                        symbol = %signal.symbol,
                        direction = %signal.direction,
                        entry = signal.entry,
                        stop_loss = signal.stop_loss,
                        take_profit = signal.take_profit,
                        rsi = signal.rsi,
                        atr = signal.atr,
                        "signal sent"
                    );
                    if let Err(e) = self.gate.commit(delivered_at) {
                        error!(
                            error = %e.chain(),
                            "failed to persist rate gate commit — daily cap may be exceeded after a restart"
                        );
                    }
                    // Single signal per pass.
                    return ScanOutcome::Delivered(signal);
                }
                Err(e) => {
                    warn!(
                        id = %signal.id,
                        symbol = %signal.symbol,
                        error = %e.chain(),
                        "notification failed — rate gate not committed"
                    );
                }
            }
        }

        ScanOutcome::NoSignal
    }
}
