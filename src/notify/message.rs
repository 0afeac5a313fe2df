// =============================================================================
// Message formatting — plain-text payloads for the notifier
// =============================================================================

use chrono::{DateTime, FixedOffset, Utc};

use crate::types::Signal;

/// Render `symbol` as a pair: `BTCUSDT` => `BTC/USDT`, anything else as-is.
pub fn display_pair(symbol: &str) -> String {
    let upper = symbol.to_uppercase();
    match upper.strip_suffix("USDT") {
        Some(base) if !base.is_empty() => format!("{base}/USDT"),
        _ => symbol.to_string(),
    }
}

/// `2026-03-10 14:05 IST` — wall-clock time in the configured offset.
pub fn format_time(now: DateTime<Utc>, offset: FixedOffset, label: &str) -> String {
    format!("{} {label}", now.with_timezone(&offset).format("%Y-%m-%d %H:%M"))
}

/// Build the signal notification.  Prices are rounded to 2 decimals here and
/// nowhere else.
pub fn format_signal_message(
    signal: &Signal,
    offset: FixedOffset,
    tz_label: &str,
    leverage_hint: &str,
) -> String {
    let mut lines = vec![
        "⚡ Scalp Signal ⚡".to_string(),
        format!("⏰ Time: {}", format_time(signal.timestamp, offset, tz_label)),
        format!("Pair: {}", display_pair(&signal.symbol)),
        format!("Action: {}", signal.direction),
        format!("Entry: {:.2}", signal.entry),
        format!("Stop Loss: {:.2}", signal.stop_loss),
        format!("Take Profit: {:.2}", signal.take_profit),
    ];
    if !leverage_hint.is_empty() {
        lines.push(format!("Leverage: {leverage_hint}"));
    }
    lines.join("\n")
}

pub fn format_startup_message(symbols: &[String], interval: &str) -> String {
    format!(
        "🤖 Signal bot started. Monitoring: {} on {interval}",
        symbols.join(", ")
    )
}
