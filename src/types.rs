// =============================================================================
// Shared types used across the signal engine
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trade direction of an emitted signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
        }
    }
}

/// An entry signal produced by one scan.  Lives only until the notification
/// message has been built and sent.
#[derive(Debug, Clone, Serialize)]
pub struct Signal {
    /// Unique identifier for log correlation (UUID v4).
    pub id: String,
    pub symbol: String,
    pub direction: Direction,
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// Oscillator value on the signal bar.
    pub rsi: f64,
    /// Volatility range used to place the stop and target.
    pub atr: f64,
    pub timestamp: DateTime<Utc>,
}
