pub mod candle;

// Re-export the Candle struct for convenient access (e.g. `use crate::market_data::Candle`).
pub use candle::{closes, Candle};

use crate::error::BotError;

/// Source of recent price bars for a symbol.
///
/// Implementations return at most `limit` bars, oldest first.  Any failure
/// (network, timeout, bad payload) is reported as [`BotError::TransientFetch`]
/// and only costs the caller that symbol for the current pass.
pub trait MarketData {
    async fn fetch_bars(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, BotError>;
}
