//! Execution state storage trait and types
//!
//! After every completed phase the orchestrator stores where the next run
//! should pick up, so an interrupted run can resume without repeating
//! phases that already finished.

use crate::state::ExecutionState;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Execution state as stored in a backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredState {
    pub state: ExecutionState,
    /// Phase whose completion produced this state
    pub completed_phase: String,
    pub created_at: DateTime<Utc>,
}

/// Trait for execution state storage.
///
/// - Filesystem storage (`FilesystemStateStore`)
/// - No storage (`NullStateStore`)
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Store the state a later run should resume from.
    async fn save_state(&self, completed_phase: &str, state: &ExecutionState) -> Result<()>;

    /// Read the latest stored state.
    ///
    /// Returns None if nothing has been stored.
    async fn load_state(&self) -> Result<Option<StoredState>>;

    /// Forget any stored state, once a run has finished every phase.
    async fn clear_state(&self) -> Result<()>;
}

/// A store that keeps nothing. Runs with it always start from their input.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStateStore;

#[async_trait]
impl StateStore for NullStateStore {
    async fn save_state(&self, _completed_phase: &str, _state: &ExecutionState) -> Result<()> {
        Ok(())
    }

    async fn load_state(&self) -> Result<Option<StoredState>> {
        Ok(None)
    }

    async fn clear_state(&self) -> Result<()> {
        Ok(())
    }
}
