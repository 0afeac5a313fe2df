// =============================================================================
// Signals Module
// =============================================================================
//
// Edge detection between the fast and slow trend lines.

pub mod crossover;

pub use crossover::{crossed_above, crossed_below};
