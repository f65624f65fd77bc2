//! Repository Ports - Alert and Baseline Storage Interfaces
//!
//! The alert engine reads alerts and reads/writes the last known price
//! per symbol through these traits. Concrete storage lives in
//! `adapters::persistence`.

use async_trait::async_trait;

use crate::domain::alert::AlertRule;

/// Read access to the alert definitions.
#[async_trait]
pub trait AlertSource: Send + Sync + 'static {
  /// All alerts that are currently enabled, in any order.
  async fn list_enabled_alerts(&self) -> anyhow::Result<Vec<AlertRule>>;
}

/// Last observed price per symbol.
///
/// This is the baseline the crossing detector compares against.
#[async_trait]
pub trait BaselineStore: Send + Sync + 'static {
  /// Last recorded price, or `None` if the symbol was never seen.
  async fn last_price(&self, symbol: &str) -> anyhow::Result<Option<f64>>;

  /// Record `price` as the new baseline for `symbol`.
  async fn set_last_price(&self, symbol: &str, price: f64) -> anyhow::Result<()>;
}
