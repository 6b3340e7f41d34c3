use crate::phase::Phase;
use thiserror::Error;
use workload_types::ConfigError;

/// Errors that stop an orchestration run.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Invalid load test plan: {0}")]
    Config(#[from] ConfigError),

    /// Raised after the phase barrier, once every copy has finished.
    #[error("Phase {phase} failed: {failed} of {total} workers failed")]
    PhaseFailed {
        phase: Phase,
        failed: usize,
        total: usize,
    },

    #[error("Failed to persist execution state after {phase} phase")]
    State {
        phase: Phase,
        #[source]
        source: anyhow::Error,
    },
}
