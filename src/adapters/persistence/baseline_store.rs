//! Baseline Store - Last Known Price per Symbol
//!
//! Backs the `BaselineStore` port with an in-memory map that is
//! snapshotted to `last_prices.json` on every update, so crossings
//! are evaluated against the right baseline after a restart.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

use super::snapshot::SnapshotFile;
use crate::ports::repository::BaselineStore;

/// File name of the baseline snapshot inside the data directory.
pub const BASELINES_FILE: &str = "last_prices.json";

/// Stored baseline for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub price: f64,
    pub updated_at: DateTime<Utc>,
}

/// Last prices persisted as a JSON object keyed by symbol.
pub struct JsonBaselineStore {
    prices: Mutex<HashMap<String, Baseline>>,
    file: SnapshotFile,
}

impl JsonBaselineStore {
    /// Open (or create) the store in `data_dir`.
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let file = SnapshotFile::new(data_dir, BASELINES_FILE).await?;
        let prices: HashMap<String, Baseline> = file.load().await?.unwrap_or_default();

        info!(symbols = prices.len(), "Baseline store opened");

        Ok(Self {
            prices: Mutex::new(prices),
            file,
        })
    }

    /// Full baseline record, including when it was last updated.
    pub async fn baseline(&self, symbol: &str) -> Option<Baseline> {
        self.prices.lock().await.get(symbol).copied()
    }

    /// Check that the snapshot directory is writable.
    pub async fn is_healthy(&self) -> bool {
        self.file.is_healthy().await
    }
}

#[async_trait]
impl BaselineStore for JsonBaselineStore {
    async fn last_price(&self, symbol: &str) -> Result<Option<f64>> {
        Ok(self.baseline(symbol).await.map(|b| b.price))
    }

    async fn set_last_price(&self, symbol: &str, price: f64) -> Result<()> {
        let mut prices = self.prices.lock().await;
        prices.insert(
            symbol.to_string(),
            Baseline {
                price,
                updated_at: Utc::now(),
            },
        );
        self.file.save(&*prices).await
    }
}
