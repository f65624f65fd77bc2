//! Snapshot File - Atomic JSON Persistence
//!
//! Values are written to a temporary file first, then atomically
//! renamed over the target. The file on disk is always either the old
//! or the new version, never a partial write.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;
use tracing::{debug, info, instrument};

/// One JSON document on disk, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    /// Final path of the document.
    path: PathBuf,
    /// Temporary path for atomic writes.
    tmp_path: PathBuf,
}

impl SnapshotFile {
    /// Prepare a snapshot file named `file_name` inside `data_dir`.
    ///
    /// Creates the directory if it doesn't exist.
    pub async fn new(data_dir: impl AsRef<Path>, file_name: &str) -> Result<Self> {
        let dir = data_dir.as_ref();
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create data directory {}", dir.display()))?;

        Ok(Self {
            path: dir.join(file_name),
            tmp_path: dir.join(format!("{file_name}.tmp")),
        })
    }

    /// Path of the document on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize `value` and replace the document atomically (tmp → rename).
    ///
    /// Callers must serialize concurrent saves to the same file.
    #[instrument(skip(self, value), fields(path = %self.path.display()))]
    pub async fn save<T: Serialize + Sync>(&self, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value).context("Failed to serialize snapshot")?;

        fs::write(&self.tmp_path, &json)
            .await
            .context("Failed to write tmp snapshot file")?;

        fs::rename(&self.tmp_path, &self.path)
            .await
            .context("Failed to rename snapshot file")?;

        debug!(bytes = json.len(), "Snapshot saved");
        Ok(())
    }

    /// Load the document, or `None` if it does not exist yet.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn load<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            info!("No snapshot found, starting fresh");
            return Ok(None);
        }

        let json = fs::read_to_string(&self.path)
            .await
            .context("Failed to read snapshot file")?;

        let value = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;

        Ok(Some(value))
    }

    /// Check that the directory is writable.
    pub async fn is_healthy(&self) -> bool {
        let marker = self.path.with_extension("health_check");
        let result = fs::write(&marker, b"ok").await;
        let _ = fs::remove_file(&marker).await;
        result.is_ok()
    }
}
