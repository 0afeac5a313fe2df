// =============================================================================
// Error taxonomy for the scan pipeline
// =============================================================================
//
// None of these are process-fatal.  The scanner decides per variant whether a
// failure skips a symbol, skips a commit, or only gets logged.
// =============================================================================

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BotError {
    /// Market-data call failed or timed out.  The symbol is skipped this pass.
    #[error("failed to fetch bars for {symbol}")]
    TransientFetch {
        symbol: String,
        #[source]
        source: anyhow::Error,
    },

    /// The notification transport rejected or dropped the message.  The rate
    /// gate is not committed.
    #[error("notification delivery failed")]
    NotificationDelivery(#[source] anyhow::Error),

    /// Not enough bars for the indicators to warm up.  Expected early in a
    /// series and never logged above debug.
    #[error("insufficient history for {symbol}: {reason}")]
    InsufficientHistory { symbol: String, reason: String },

    /// Reading or writing the gate state file failed.
    #[error("gate state persistence failed for {}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

impl BotError {
    /// Full cause chain, outermost first, joined with ": ".
    pub fn chain(&self) -> String {
        let mut out = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            out.push_str(": ");
            out.push_str(&cause.to_string());
            source = cause.source();
        }
        out
    }
}
