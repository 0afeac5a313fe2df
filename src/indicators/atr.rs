// =============================================================================
// Average True Range (ATR) — Wilder's Smoothing Method
// =============================================================================
//
// ATR measures market volatility by decomposing the entire range of a bar.
//
// True Range (TR) for each bar after the first:
//   TR = max(H - L, |H - prevClose|, |L - prevClose|)
//
// ATR is then the smoothed average of TR using Wilder's method:
//   ATR_period = SMA of TR_1 ..= TR_period
//   ATR_t      = (ATR_{t-1} * (period - 1) + TR_t) / period
//
// The output is index-aligned with the candles; index 0 never has a TR and
// the first ATR lands at index `period`.
// =============================================================================

use crate::market_data::Candle;

/// True range of `candle` relative to the close of the bar before it.
pub fn true_range(candle: &Candle, prev_close: f64) -> f64 {
    let hl = candle.high - candle.low;
    let hc = (candle.high - prev_close).abs();
    let lc = (candle.low - prev_close).abs();
    hl.max(hc).max(lc)
}

/// Compute the ATR series for `candles` (oldest first) and `period`.
///
/// # Returns
/// A vector with one entry per candle.  Positions `0..period` are `None`.
/// Everything is `None` when `period` is zero or there are fewer than
/// `period + 1` candles.
pub fn calculate_atr(candles: &[Candle], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; candles.len()];
    if period == 0 || candles.len() < period + 1 {
        return result;
    }

    // --- Step 1: True Range per bar (index 0 has none) -----------------------
    let tr_values: Vec<Option<f64>> = std::iter::once(None)
        .chain(
            candles
                .windows(2)
                .map(|w| Some(true_range(&w[1], w[0].close))),
        )
        .collect();

    // --- Step 2: Seed with SMA of the first `period` TR values ---------------
    let seed = tr_values[1..=period].iter().flatten().sum::<f64>() / period as f64;
    result[period] = Some(seed);

    // --- Step 3: Wilder's smoothing for remaining TR values ------------------
    let period_f = period as f64;
    for i in (period + 1)..candles.len() {
        let prev = result[i - 1].unwrap_or(seed);
        let tr = tr_values[i].unwrap_or(0.0);
        result[i] = Some((prev * (period_f - 1.0) + tr) / period_f);
    }

    result
}
