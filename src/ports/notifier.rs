//! Notifier Port - Outbound Alert Delivery
//!
//! Each sink is an independent capability: it has a name, can be
//! switched off, and delivers one event at a time. The engine contains
//! failures per sink, so one broken channel never blocks the others.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::domain::alert::{AlertId, Direction};

/// A detected crossing, ready to be delivered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
  /// Alert that fired.
  pub alert_id: AlertId,
  /// Symbol whose price crossed.
  pub symbol: String,
  /// Price that completed the crossing.
  pub price: f64,
  /// Threshold of the alert.
  pub threshold: f64,
  /// Direction of the alert.
  pub direction: Direction,
  /// When the crossing was detected.
  pub triggered_at: DateTime<Utc>,
}

/// Delivery failures reported by a sink.
#[derive(Debug, Error)]
pub enum NotifyError {
  #[error("request failed: {0}")]
  Request(String),

  #[error("sink returned HTTP {0}")]
  Status(u16),

  #[error("sink did not answer within {0:?}")]
  Timeout(std::time::Duration),
}

/// Trait for notification sinks (log, chat, ...).
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
  /// Stable sink name used in logs and metrics.
  fn name(&self) -> &'static str;

  /// Disabled sinks are skipped by the dispatcher.
  fn enabled(&self) -> bool;

  /// Deliver one event.
  async fn notify(&self, event: &AlertEvent) -> Result<(), NotifyError>;
}
