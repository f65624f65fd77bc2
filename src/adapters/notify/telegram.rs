//! Telegram Notifier - Alerts Delivered to a Chat
//!
//! Calls the Bot API `sendMessage` method. Without a token or chat id
//! the sink stays enabled but every delivery is a no-op, so a fresh
//! install works before credentials are configured.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::ports::notifier::{AlertEvent, Notifier, NotifyError};

/// Default Telegram Bot API base URL.
pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Telegram Bot API notification sink.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    http: Client,
    api_base_url: String,
    bot_token: String,
    chat_id: String,
    enabled: bool,
}

impl TelegramNotifier {
    /// Create a sink against the public Bot API.
    pub fn new(bot_token: &str, chat_id: &str, enabled: bool, timeout: Duration) -> Result<Self> {
        Self::with_api_url(TELEGRAM_API_URL, bot_token, chat_id, enabled, timeout)
    }

    /// Create a sink against a custom API base URL.
    pub fn with_api_url(
        api_base_url: &str,
        bot_token: &str,
        chat_id: &str,
        enabled: bool,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
            enabled,
        })
    }

    /// True when both token and chat id are set.
    pub fn is_configured(&self) -> bool {
        !self.bot_token.is_empty() && !self.chat_id.is_empty()
    }
}

/// Message text sent for one event.
pub fn format_message(event: &AlertEvent) -> String {
    format!(
        "ALERT {} {} @ {:.8} (thr {:.8})",
        event.symbol, event.direction, event.price, event.threshold
    )
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &'static str {
        "telegram"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn notify(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        if !self.enabled || !self.is_configured() {
            debug!("Telegram not configured, skipping");
            return Ok(());
        }

        let url = format!("{}/bot{}/sendMessage", self.api_base_url, self.bot_token);
        let text = format_message(event);

        let response = self
            .http
            .get(&url)
            .query(&[("chat_id", self.chat_id.as_str()), ("text", text.as_str())])
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::alert::Direction;

    fn event() -> AlertEvent {
        AlertEvent {
            alert_id: "a1".to_string(),
            symbol: "BTCUSDT".to_string(),
            price: 100_000.5,
            threshold: 100_000.0,
            direction: Direction::Up,
            triggered_at: Utc::now(),
        }
    }

    #[test]
    fn test_message_format() {
        assert_eq!(
            format_message(&event()),
            "ALERT BTCUSDT UP @ 100000.50000000 (thr 100000.00000000)"
        );
    }

    #[tokio::test]
    async fn test_unconfigured_sink_is_a_noop() {
        let sink = TelegramNotifier::new("", "", true, Duration::from_secs(1)).unwrap();
        assert!(!sink.is_configured());
        assert!(sink.notify(&event()).await.is_ok());
    }
}
