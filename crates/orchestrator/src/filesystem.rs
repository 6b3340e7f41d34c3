//! Filesystem-based execution state storage.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};

use crate::state::ExecutionState;
use crate::store::{StateStore, StoredState};

const STATE_FILE: &str = "execution_state.json";

/// Filesystem implementation of StateStore trait.
///
/// Keeps the latest state as one pretty-printed JSON file in a directory.
pub struct FilesystemStateStore {
    dir: PathBuf,
}

impl FilesystemStateStore {
    /// Create a new FilesystemStateStore with the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Get the directory path.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }
}

#[async_trait]
impl StateStore for FilesystemStateStore {
    async fn save_state(&self, completed_phase: &str, state: &ExecutionState) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create state directory {:?}", self.dir))?;

        let stored = StoredState {
            state: state.clone(),
            completed_phase: completed_phase.to_string(),
            created_at: Utc::now(),
        };

        // Write then rename so a crash never leaves a torn state file
        let path = self.path();
        let tmp = self.dir.join(format!("{STATE_FILE}.tmp"));
        std::fs::write(&tmp, serde_json::to_string_pretty(&stored)?)?;
        std::fs::rename(&tmp, &path)?;

        tracing::info!(
            "Stored execution state after {} phase to {}",
            completed_phase,
            path.display()
        );
        Ok(())
    }

    async fn load_state(&self) -> Result<Option<StoredState>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read execution state {path:?}"))?;
        let stored = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse execution state {path:?}"))?;
        Ok(Some(stored))
    }

    async fn clear_state(&self) -> Result<()> {
        let path = self.path();
        if path.exists() {
            std::fs::remove_file(&path)?;
            tracing::info!("Cleared execution state {}", path.display());
        }
        Ok(())
    }
}
