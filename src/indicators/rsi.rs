// =============================================================================
// Relative Strength Index (RSI) — Wilder's Smoothing
// =============================================================================
//
// Bounded 0–100 momentum oscillator.
//
// Step 1 — Compute price changes (deltas) from consecutive closes.
// Step 2 — Seed average gain / average loss with the SMA of the first `period`
//          gains / losses.
// Step 3 — Apply Wilder's smoothing:
//            avg_gain = (prev_avg_gain * (period - 1) + current_gain) / period
//            avg_loss = (prev_avg_loss * (period - 1) + current_loss) / period
// Step 4 — RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//
// Saturation: when avg_loss is zero, RS is taken as SATURATED_RS instead of
// infinity, so the RSI lands just below 100.  This also applies to a perfectly
// flat market (avg_gain == avg_loss == 0).
// =============================================================================

/// Stand-in ratio used when the average loss is zero.
const SATURATED_RS: f64 = 1e9;

/// Compute the RSI series for `closes`, index-aligned with the input.
///
/// Positions `0..period` are `None`; the first value lands at index `period`.
///
/// # Edge cases
/// - `period == 0` => all `None`
/// - `closes.len() < period + 1` => all `None`
pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; closes.len()];
    if period == 0 || closes.len() < period + 1 {
        return result;
    }

    // --- Per-step gains / losses (index-aligned, index 0 has no delta) -------
    let (gains, losses): (Vec<f64>, Vec<f64>) = closes
        .windows(2)
        .map(|w| {
            let delta = w[1] - w[0];
            (delta.max(0.0), (-delta).max(0.0))
        })
        .unzip();

    // --- Seed averages with SMA of first `period` deltas ---------------------
    let period_f = period as f64;
    let mut avg_gain = gains[..period].iter().sum::<f64>() / period_f;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period_f;

    result[period] = Some(rsi_from_averages(avg_gain, avg_loss));

    // --- Wilder's smoothing for subsequent values ----------------------------
    for i in period..gains.len() {
        avg_gain = (avg_gain * (period_f - 1.0) + gains[i]) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + losses[i]) / period_f;
        // gains[i] is the delta between closes[i] and closes[i + 1].
        result[i + 1] = Some(rsi_from_averages(avg_gain, avg_loss));
    }

    result
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    let rs = if avg_loss != 0.0 {
        avg_gain / avg_loss
    } else {
        SATURATED_RS
    };
    100.0 - 100.0 / (1.0 + rs)
}
