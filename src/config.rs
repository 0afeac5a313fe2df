// =============================================================================
// Bot Configuration — JSON file + environment overrides
// =============================================================================
//
// One immutable `BotConfig` is built at startup and passed by reference into
// the scanner.  Layering:
//
//   1. Serde defaults for every field.
//   2. Optional JSON file (missing file => defaults with a warning).
//   3. Environment variables (a `.env` file is loaded first by main.rs).
//
// All fields carry `#[serde(default)]` so that adding new fields never breaks
// loading an older config file.
//
// Secrets (Telegram token / chat id) are NOT part of this struct; they are read
// from the environment by the notifier only.
// =============================================================================

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{Duration, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_symbols() -> Vec<String> {
    vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()]
}

fn default_interval() -> String {
    "1m".to_string()
}

fn default_check_seconds() -> u64 {
    30
}

fn default_kline_limit() -> u32 {
    200
}

fn default_ema_fast() -> usize {
    21
}

fn default_ema_slow() -> usize {
    50
}

fn default_rsi_period() -> usize {
    14
}

fn default_rsi_long_min() -> f64 {
    52.0
}

fn default_rsi_short_max() -> f64 {
    48.0
}

fn default_atr_period() -> usize {
    14
}

fn default_sl_atr_multiplier() -> f64 {
    1.0
}

fn default_tp_atr_multiplier() -> f64 {
    1.5
}

fn default_max_signals_per_day() -> u32 {
    2
}

fn default_cooldown_minutes() -> u32 {
    20
}

fn default_state_path() -> PathBuf {
    PathBuf::from("state.json")
}

fn default_timezone_offset_minutes() -> i32 {
    // Asia/Kolkata (IST) has no DST, so a fixed offset is exact.
    330
}

fn default_timezone_label() -> String {
    "IST".to_string()
}

fn default_http_timeout_secs() -> u64 {
    20
}

fn default_leverage_hint() -> String {
    "10x–20x".to_string()
}

// =============================================================================
// StrategyParams
// =============================================================================

/// Indicator periods, oscillator thresholds and stop/target sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyParams {
    /// Fast EMA period.
    #[serde(default = "default_ema_fast")]
    pub ema_fast: usize,

    /// Slow EMA period.
    #[serde(default = "default_ema_slow")]
    pub ema_slow: usize,

    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,

    /// LONG fires when the oscillator is at or above this value.
    #[serde(default = "default_rsi_long_min")]
    pub rsi_long_min: f64,

    /// SHORT fires when the oscillator is at or below this value.
    #[serde(default = "default_rsi_short_max")]
    pub rsi_short_max: f64,

    #[serde(default = "default_atr_period")]
    pub atr_period: usize,

    /// ATR multiplier for stop-loss distance.
    #[serde(default = "default_sl_atr_multiplier")]
    pub sl_atr_multiplier: f64,

    /// ATR multiplier for take-profit distance.
    #[serde(default = "default_tp_atr_multiplier")]
    pub tp_atr_multiplier: f64,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            ema_fast: default_ema_fast(),
            ema_slow: default_ema_slow(),
            rsi_period: default_rsi_period(),
            rsi_long_min: default_rsi_long_min(),
            rsi_short_max: default_rsi_short_max(),
            atr_period: default_atr_period(),
            sl_atr_multiplier: default_sl_atr_multiplier(),
            tp_atr_multiplier: default_tp_atr_multiplier(),
        }
    }
}

// =============================================================================
// BotConfig
// =============================================================================

/// Top-level configuration for the signal bot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    // --- Market data --------------------------------------------------------

    /// Symbols scanned on every pass, in order.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Kline interval, e.g. "1m", "5m", "1h".
    #[serde(default = "default_interval")]
    pub interval: String,

    /// Seconds between scan passes.
    #[serde(default = "default_check_seconds")]
    pub check_seconds: u64,

    /// Number of bars requested per symbol per pass.
    #[serde(default = "default_kline_limit")]
    pub kline_limit: u32,

    /// Timeout for every outbound HTTP call.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    // --- Rate gate ----------------------------------------------------------

    #[serde(default = "default_max_signals_per_day")]
    pub max_signals_per_day: u32,

    /// Minimum minutes between two emitted signals.
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: u32,

    /// Gate state file.
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,

    /// Fixed UTC offset (minutes) that defines the calendar day for the daily
    /// signal cap and the time printed in messages.
    #[serde(default = "default_timezone_offset_minutes")]
    pub timezone_offset_minutes: i32,

    #[serde(default = "default_timezone_label")]
    pub timezone_label: String,

    // --- Notifications ------------------------------------------------------

    /// Send a one-off message when the bot starts.
    #[serde(default = "default_true")]
    pub announce_startup: bool,

    #[serde(default = "default_leverage_hint")]
    pub leverage_hint: String,

    // --- Strategy parameters ------------------------------------------------

    #[serde(default)]
    pub strategy_params: StrategyParams,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            interval: default_interval(),
            check_seconds: default_check_seconds(),
            kline_limit: default_kline_limit(),
            http_timeout_secs: default_http_timeout_secs(),
            max_signals_per_day: default_max_signals_per_day(),
            cooldown_minutes: default_cooldown_minutes(),
            state_path: default_state_path(),
            timezone_offset_minutes: default_timezone_offset_minutes(),
            timezone_label: default_timezone_label(),
            announce_startup: true,
            leverage_hint: default_leverage_hint(),
            strategy_params: StrategyParams::default(),
        }
    }
}

impl BotConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read bot config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse bot config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = ?config.symbols,
            interval = %config.interval,
            "bot config loaded"
        );

        Ok(config)
    }

    /// Apply environment overrides on top of the current values.
    ///
    /// `lookup` is `std::env::var(..).ok()` in production; tests pass a map.
    /// Values that fail to parse are ignored with a warning.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup("SYMBOLS") {
            self.symbols = parse_symbols(&raw);
        }
        if let Some(raw) = lookup("INTERVAL") {
            let raw = raw.trim();
            if !raw.is_empty() {
                self.interval = raw.to_string();
            }
        }
        if let Some(raw) = lookup("STATE_PATH") {
            let raw = raw.trim();
            if !raw.is_empty() {
                self.state_path = PathBuf::from(raw);
            }
        }
        if let Some(raw) = lookup("TZ_LABEL") {
            self.timezone_label = raw.trim().to_string();
        }
        if let Some(raw) = lookup("LEVERAGE_HINT") {
            self.leverage_hint = raw.trim().to_string();
        }
        if let Some(raw) = lookup("ANNOUNCE_STARTUP") {
            match parse_flag(&raw) {
                Some(flag) => self.announce_startup = flag,
                None => warn!(
                    var = "ANNOUNCE_STARTUP",
                    value = %raw,
                    "ignoring unparseable environment override"
                ),
            }
        }

        override_parsed(&lookup, "CHECK_SECONDS", &mut self.check_seconds);
        override_parsed(&lookup, "KLINE_LIMIT", &mut self.kline_limit);
        override_parsed(&lookup, "HTTP_TIMEOUT_SECS", &mut self.http_timeout_secs);
        override_parsed(&lookup, "MAX_SIGNALS_PER_DAY", &mut self.max_signals_per_day);
        override_parsed(&lookup, "COOLDOWN_MINUTES", &mut self.cooldown_minutes);
        override_parsed(&lookup, "TZ_OFFSET_MINUTES", &mut self.timezone_offset_minutes);

        let p = &mut self.strategy_params;
        override_parsed(&lookup, "EMA_FAST", &mut p.ema_fast);
        override_parsed(&lookup, "EMA_SLOW", &mut p.ema_slow);
        override_parsed(&lookup, "RSI_PERIOD", &mut p.rsi_period);
        override_parsed(&lookup, "RSI_LONG_MIN", &mut p.rsi_long_min);
        override_parsed(&lookup, "RSI_SHORT_MAX", &mut p.rsi_short_max);
        override_parsed(&lookup, "ATR_PERIOD", &mut p.atr_period);
        override_parsed(&lookup, "ATR_SL_MULT", &mut p.sl_atr_multiplier);
        override_parsed(&lookup, "ATR_TP_MULT", &mut p.tp_atr_multiplier);
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.symbols.is_empty() {
            anyhow::bail!("no symbols configured");
        }
        if self.check_seconds == 0 {
            anyhow::bail!("check_seconds must be > 0");
        }
        if self.kline_limit < 3 {
            anyhow::bail!("kline_limit must be >= 3, got {}", self.kline_limit);
        }
        if self.fixed_offset().is_none() {
            anyhow::bail!(
                "timezone_offset_minutes out of range: {}",
                self.timezone_offset_minutes
            );
        }

        let p = &self.strategy_params;
        for (name, period) in [
            ("ema_fast", p.ema_fast),
            ("ema_slow", p.ema_slow),
            ("rsi_period", p.rsi_period),
            ("atr_period", p.atr_period),
        ] {
            if period == 0 {
                anyhow::bail!("{name} must be > 0");
            }
        }
        for (name, mult) in [
            ("sl_atr_multiplier", p.sl_atr_multiplier),
            ("tp_atr_multiplier", p.tp_atr_multiplier),
        ] {
            if !mult.is_finite() || mult < 0.0 {
                anyhow::bail!("{name} must be a non-negative number, got {mult}");
            }
        }
        if p.ema_fast >= p.ema_slow {
            warn!(
                ema_fast = p.ema_fast,
                ema_slow = p.ema_slow,
                "fast EMA period is not shorter than slow EMA period"
            );
        }
        if p.rsi_short_max >= p.rsi_long_min {
            warn!(
                rsi_long_min = p.rsi_long_min,
                rsi_short_max = p.rsi_short_max,
                "oscillator thresholds overlap"
            );
        }

        Ok(())
    }

    /// The fixed offset used for calendar-day boundaries and message times.
    pub fn utc_offset(&self) -> FixedOffset {
        self.fixed_offset().unwrap_or_else(|| Utc.fix())
    }

    fn fixed_offset(&self) -> Option<FixedOffset> {
        self.timezone_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::minutes(i64::from(self.cooldown_minutes))
    }

    pub fn check_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.check_seconds)
    }

    pub fn http_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.http_timeout_secs)
    }
}

/// `true`/`false` and the usual spellings of both; anything else is `None`.
fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Split a comma list of symbols, trimming and upper-casing each entry.
fn parse_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn override_parsed<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, target: &mut T)
where
    T: FromStr,
{
    let Some(raw) = lookup(name) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(v) => *target = v,
        Err(_) => warn!(var = name, value = %raw, "ignoring unparseable environment override"),
    }
}
