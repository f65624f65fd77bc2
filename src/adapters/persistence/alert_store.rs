//! Alert Store - JSON-backed Alert Definitions
//!
//! Keeps all alerts in memory and rewrites `alerts.json` after every
//! mutation. Implements the `AlertSource` port for the alert engine and
//! exposes create/toggle/delete/list for management callers.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, instrument};

use super::snapshot::SnapshotFile;
use crate::config::SeedAlert;
use crate::domain::alert::{AlertError, AlertRule, Direction};
use crate::ports::repository::AlertSource;

/// File name of the alert snapshot inside the data directory.
pub const ALERTS_FILE: &str = "alerts.json";

/// Alert definitions persisted as a single JSON array.
pub struct JsonAlertStore {
    /// In-memory copy; the lock also serializes snapshot writes.
    alerts: Mutex<Vec<AlertRule>>,
    /// Backing file.
    file: SnapshotFile,
}

impl JsonAlertStore {
    /// Open (or create) the store in `data_dir`.
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let file = SnapshotFile::new(data_dir, ALERTS_FILE).await?;
        let alerts: Vec<AlertRule> = file.load().await?.unwrap_or_default();

        info!(
            count = alerts.len(),
            path = %file.path().display(),
            "Alert store opened"
        );

        Ok(Self {
            alerts: Mutex::new(alerts),
            file,
        })
    }

    /// Create and persist a new enabled alert.
    ///
    /// Fails with [`AlertError`] (downcastable from the returned error)
    /// when the symbol or threshold is invalid.
    #[instrument(skip(self))]
    pub async fn create_alert(
        &self,
        symbol: &str,
        threshold: f64,
        direction: Direction,
    ) -> Result<AlertRule> {
        let alert = AlertRule::new(symbol, threshold, direction)?;

        let mut alerts = self.alerts.lock().await;
        alerts.push(alert.clone());
        self.file.save(&*alerts).await?;

        info!(id = %alert.id, "Alert created");
        Ok(alert)
    }

    /// Enable or disable an alert.
    #[instrument(skip(self))]
    pub async fn set_enabled(&self, id: &str, enabled: bool) -> Result<AlertRule> {
        let mut alerts = self.alerts.lock().await;
        let alert = alerts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| AlertError::NotFound(id.to_string()))?;
        alert.enabled = enabled;
        let updated = alert.clone();

        self.file.save(&*alerts).await?;
        Ok(updated)
    }

    /// Delete an alert.
    #[instrument(skip(self))]
    pub async fn delete_alert(&self, id: &str) -> Result<()> {
        let mut alerts = self.alerts.lock().await;
        let before = alerts.len();
        alerts.retain(|a| a.id != id);
        if alerts.len() == before {
            return Err(AlertError::NotFound(id.to_string()).into());
        }

        self.file.save(&*alerts).await?;
        info!("Alert deleted");
        Ok(())
    }

    /// All alerts, newest first.
    pub async fn list_alerts(&self) -> Vec<AlertRule> {
        let mut list = self.alerts.lock().await.clone();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list
    }

    /// Insert configured alerts that are not already stored.
    ///
    /// An existing alert with the same symbol, threshold and direction
    /// counts as present regardless of its enabled flag, so toggles made
    /// at runtime survive restarts. Returns how many were inserted.
    pub async fn seed(&self, seeds: &[SeedAlert]) -> Result<usize> {
        let mut alerts = self.alerts.lock().await;
        let mut inserted = 0;

        for seed in seeds {
            if alerts
                .iter()
                .any(|a| a.same_trigger(&seed.symbol, seed.threshold, seed.direction))
            {
                continue;
            }
            let mut alert = AlertRule::new(seed.symbol.as_str(), seed.threshold, seed.direction)?;
            alert.enabled = seed.enabled;
            alerts.push(alert);
            inserted += 1;
        }

        if inserted > 0 {
            self.file.save(&*alerts).await?;
            info!(inserted, "Seed alerts stored");
        }
        Ok(inserted)
    }
}

#[async_trait]
impl AlertSource for JsonAlertStore {
    async fn list_enabled_alerts(&self) -> Result<Vec<AlertRule>> {
        let alerts = self.alerts.lock().await;
        Ok(alerts.iter().filter(|a| a.enabled).cloned().collect())
    }
}
