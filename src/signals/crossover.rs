// =============================================================================
// Crossover Detector — single-step edge detection between two lines
// =============================================================================
//
// Only the last two observations of each line are consulted.  Equality at the
// previous step counts as "not yet crossed", so a line that touches and then
// pulls ahead triggers exactly once.
//
// A cross followed by a re-cross between two scans that are more than one bar
// apart is not seen.
// =============================================================================

/// `a` moved from at-or-below `b` to strictly above it.
///
/// Returns `false` when either previous value is undefined.
pub fn crossed_above(prev_a: Option<f64>, now_a: f64, prev_b: Option<f64>, now_b: f64) -> bool {
    match (prev_a, prev_b) {
        (Some(pa), Some(pb)) => pa <= pb && now_a > now_b,
        _ => false,
    }
}

/// `a` moved from at-or-above `b` to strictly below it.
///
/// Returns `false` when either previous value is undefined.
pub fn crossed_below(prev_a: Option<f64>, now_a: f64, prev_b: Option<f64>, now_b: f64) -> bool {
    match (prev_a, prev_b) {
        (Some(pa), Some(pb)) => pa >= pb && now_a < now_b,
        _ => false,
    }
}
