// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators used by the signal
// evaluator.  Every series is index-aligned with its input; positions that are
// still warming up are `None` rather than a sentinel number.

pub mod atr;
pub mod ema;
pub mod rsi;
