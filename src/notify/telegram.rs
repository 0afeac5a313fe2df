// =============================================================================
// Telegram Bot API notifier — POST /bot<token>/sendMessage
// =============================================================================
//
// SECURITY: the bot token is part of the request URL.  It is never logged and
// is redacted from `Debug` output.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{debug, instrument};

use super::Notifier;
use crate::error::BotError;

const TELEGRAM_API: &str = "https://api.telegram.org";

#[derive(Clone)]
pub struct TelegramNotifier {
    token: String,
    chat_id: String,
    base_url: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    /// Create a notifier for `chat_id`.  Every request is bounded by `timeout`.
    pub fn new(
        token: impl Into<String>,
        chat_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            token: token.into(),
            chat_id: chat_id.into(),
            base_url: TELEGRAM_API.to_string(),
            client,
        })
    }

    /// Build from `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_ID`.  Both are required.
    pub fn from_env(timeout: Duration) -> Result<Self> {
        let token = required_env("TELEGRAM_BOT_TOKEN")?;
        let chat_id = required_env("TELEGRAM_CHAT_ID")?;
        Self::new(token, chat_id, timeout)
    }

    /// Point the notifier at a different API host (e.g. a local bot API server).
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.base_url, self.token)
    }

    async fn post_message(&self, text: &str) -> Result<()> {
        let body = json!({ "chat_id": self.chat_id, "text": text });

        let resp = self
            .client
            .post(self.send_message_url())
            .json(&body)
            .send()
            .await
            // reqwest errors embed the URL, which carries the token.
            .map_err(|e| anyhow::anyhow!("POST sendMessage request failed: {}", e.without_url()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Telegram sendMessage returned {}: {}", status, text);
        }

        debug!(chat_id = %self.chat_id, "telegram message delivered");
        Ok(())
    }
}

impl Notifier for TelegramNotifier {
    #[instrument(skip(self, text), name = "telegram::send")]
    async fn send(&self, text: &str) -> Result<(), BotError> {
        self.post_message(text)
            .await
            .map_err(BotError::NotificationDelivery)
    }
}

fn required_env(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .with_context(|| format!("missing {name} in environment"))
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}
