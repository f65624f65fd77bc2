//! Email Notifier - Alerts Delivered over SMTP
//!
//! Sends one plain-text message per alert through `lettre`'s tokio
//! transport. STARTTLS is used when the server offers it. Without a
//! host, port, sender or recipient the sink stays enabled but every
//! delivery is a no-op.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::SecondsFormat;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use crate::ports::notifier::{AlertEvent, Notifier, NotifyError};

/// SMTP connection and addressing.
#[derive(Debug, Clone, Default)]
pub struct EmailSettings {
    pub host: String,
    /// 0 means unset.
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub from: String,
    pub to: String,
}

impl EmailSettings {
    /// True when host, port, sender and recipient are all set.
    pub fn is_complete(&self) -> bool {
        !self.host.is_empty() && self.port != 0 && !self.from.is_empty() && !self.to.is_empty()
    }
}

/// Ready-to-use SMTP route.
struct Delivery {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

/// SMTP notification sink.
pub struct EmailNotifier {
    delivery: Option<Delivery>,
    enabled: bool,
}

impl EmailNotifier {
    /// Build the sink. Addresses are validated up front; no connection
    /// is opened until the first delivery.
    pub fn new(settings: &EmailSettings, enabled: bool, timeout: Duration) -> Result<Self> {
        if !settings.is_complete() {
            return Ok(Self {
                delivery: None,
                enabled,
            });
        }

        let from: Mailbox = settings
            .from
            .parse()
            .with_context(|| format!("Invalid sender address {:?}", settings.from))?;
        let to: Mailbox = settings
            .to
            .parse()
            .with_context(|| format!("Invalid recipient address {:?}", settings.to))?;

        let tls = TlsParameters::new(settings.host.clone())
            .context("Failed to build SMTP TLS parameters")?;
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(settings.host.as_str())
            .port(settings.port)
            .tls(Tls::Opportunistic(tls))
            .timeout(Some(timeout));
        if !settings.user.is_empty() || !settings.pass.is_empty() {
            builder = builder.credentials(Credentials::new(
                settings.user.clone(),
                settings.pass.clone(),
            ));
        }

        Ok(Self {
            delivery: Some(Delivery {
                transport: builder.build(),
                from,
                to,
            }),
            enabled,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.delivery.is_some()
    }
}

/// Subject line for one event.
pub fn format_subject(event: &AlertEvent) -> String {
    format!(
        "[Crypto Alert] {} {} {:.2} (thr={:.2})",
        event.symbol, event.direction, event.price, event.threshold
    )
}

/// Plain-text body for one event.
pub fn format_body(event: &AlertEvent) -> String {
    format!(
        "Symbol: {}\nDirection: {}\nPrice: {:.8}\nThreshold: {:.8}\nTime: {}\n",
        event.symbol,
        event.direction,
        event.price,
        event.threshold,
        event.triggered_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &'static str {
        "email"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn notify(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        let Some(delivery) = self.delivery.as_ref().filter(|_| self.enabled) else {
            debug!("Email not configured, skipping");
            return Ok(());
        };

        let message = Message::builder()
            .from(delivery.from.clone())
            .to(delivery.to.clone())
            .subject(format_subject(event))
            .header(ContentType::TEXT_PLAIN)
            .body(format_body(event))
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        delivery
            .transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::domain::alert::Direction;

    fn event() -> AlertEvent {
        AlertEvent {
            alert_id: "a1".to_string(),
            symbol: "ETHUSDT".to_string(),
            price: 2_499.876,
            threshold: 2_500.0,
            direction: Direction::Down,
            triggered_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
        }
    }

    fn settings() -> EmailSettings {
        EmailSettings {
            host: "smtp.example.com".to_string(),
            port: 587,
            user: String::new(),
            pass: String::new(),
            from: "alerts@example.com".to_string(),
            to: "me@example.com".to_string(),
        }
    }

    #[test]
    fn test_subject_and_body_format() {
        assert_eq!(
            format_subject(&event()),
            "[Crypto Alert] ETHUSDT DOWN 2499.88 (thr=2500.00)"
        );
        assert_eq!(
            format_body(&event()),
            "Symbol: ETHUSDT\nDirection: DOWN\nPrice: 2499.87600000\nThreshold: 2500.00000000\nTime: 2024-05-01T12:30:00Z\n"
        );
    }

    #[tokio::test]
    async fn test_incomplete_settings_are_a_noop() {
        for strip in 0..4 {
            let mut partial = settings();
            match strip {
                0 => partial.host.clear(),
                1 => partial.port = 0,
                2 => partial.from.clear(),
                _ => partial.to.clear(),
            }
            let sink = EmailNotifier::new(&partial, true, Duration::from_secs(1)).unwrap();
            assert!(!sink.is_configured());
            assert!(sink.notify(&event()).await.is_ok());
        }
    }

    #[test]
    fn test_invalid_addresses_are_rejected() {
        let mut bad_from = settings();
        bad_from.from = "not an address".to_string();
        assert!(EmailNotifier::new(&bad_from, true, Duration::from_secs(1)).is_err());

        let mut bad_to = settings();
        bad_to.to = "@@".to_string();
        assert!(EmailNotifier::new(&bad_to, true, Duration::from_secs(1)).is_err());
    }
}
