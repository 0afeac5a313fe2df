// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// EMA gives more weight to recent prices, making it more responsive to new
// information than the Simple Moving Average (SMA).
//
// Formula:
//   k     = 2 / (period + 1)
//   EMA_t = (close_t - EMA_{t-1}) * k + EMA_{t-1}
//
// NOTE: this EMA is seeded with the FIRST raw value, not with the SMA of the
// first `period` values.  The series is therefore defined from index 0 and has
// no warm-up gap.  Crossover timing depends on this seeding, so anyone adding
// new indicators on top of it should not assume textbook EMA values for the
// first ~period bars.
// =============================================================================

/// Compute the EMA series for `values` with look-back `period`.
///
/// Returns one value per input (same length, index-aligned).  The first output
/// equals the first input.
///
/// # Edge cases
/// - `period == 0` => empty vec
/// - empty input   => empty vec
pub fn calculate_ema(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 {
        return Vec::new();
    }

    let k = 2.0 / (period as f64 + 1.0);

    let mut result = Vec::with_capacity(values.len());
    let mut current: Option<f64> = None;

    for &v in values {
        let next = match current {
            None => v,
            Some(prev) => (v - prev) * k + prev,
        };
        result.push(next);
        current = Some(next);
    }

    result
}
