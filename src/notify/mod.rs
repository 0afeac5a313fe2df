pub mod message;
pub mod telegram;

pub use message::{format_signal_message, format_startup_message};
pub use telegram::TelegramNotifier;

use crate::error::BotError;

/// Delivery transport for pre-formatted messages.
///
/// A failure is reported as [`BotError::NotificationDelivery`]; the caller
/// must not commit the rate gate for an undelivered signal.
pub trait Notifier {
    async fn send(&self, text: &str) -> Result<(), BotError>;
}
