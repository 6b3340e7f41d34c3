//! The phased orchestration run.
//!
//! Each workload phase launches all of its copies at once, staggered by one
//! second per copy index, and waits for every copy before the run moves on.
//! Decisions between phases consult the execution input's `continue` field.
//! After each phase completes the state for resuming at the next phase is
//! stored, and it is cleared once the last phase is done.

use crate::error::OrchestratorError;
use crate::launcher::{WorkerAssignment, WorkerLauncher};
use crate::phase::{Phase, Stage};
use crate::report::{PhaseReport, RunOutcome, RunReport};
use crate::state::ExecutionState;
use crate::store::{NullStateStore, StateStore};
use chrono::Utc;
use futures::future::join_all;
use loadtest_worker::{aggregate_summaries, WorkerSummary};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use workload_types::WorkloadConfig;

/// Delay between the starts of consecutive copies within a phase.
pub const DEFAULT_STAGGER: Duration = Duration::from_secs(1);

/// Workload configuration of every phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseConfigs {
    pub insert: WorkloadConfig,
    pub read: WorkloadConfig,
    pub update: WorkloadConfig,
}

impl PhaseConfigs {
    pub fn get(&self, phase: Phase) -> &WorkloadConfig {
        match phase {
            Phase::Insert => &self.insert,
            Phase::Read => &self.read,
            Phase::Update => &self.update,
        }
    }

    pub fn validate(&self) -> Result<(), OrchestratorError> {
        for phase in Phase::ALL {
            self.get(phase).validate()?;
        }
        Ok(())
    }
}

/// Drives the Insert, Read and Update phases.
pub struct Orchestrator {
    phases: PhaseConfigs,
    launcher: Arc<dyn WorkerLauncher>,
    state_store: Arc<dyn StateStore>,
    stagger: Duration,
}

impl Orchestrator {
    pub fn new(phases: PhaseConfigs, launcher: Arc<dyn WorkerLauncher>) -> Self {
        Self {
            phases,
            launcher,
            state_store: Arc::new(NullStateStore),
            stagger: DEFAULT_STAGGER,
        }
    }

    pub fn with_state_store(mut self, state_store: Arc<dyn StateStore>) -> Self {
        self.state_store = state_store;
        self
    }

    pub fn with_stagger(mut self, stagger: Duration) -> Self {
        self.stagger = stagger;
        self
    }

    /// Run from `input` until the machine reaches `Done` or `Halt`.
    ///
    /// A failed phase stops the run without storing state for it, so a
    /// resumed run repeats that phase.
    pub async fn run(&self, input: ExecutionState) -> Result<RunReport, OrchestratorError> {
        self.phases.validate()?;

        let started_at = Utc::now();
        let mut state = input;
        let mut stage = Stage::entry(state.start_phase());
        let mut phases = Vec::new();
        let mut last_phase = None;

        info!("Orchestration starting at {} phase", state.start_phase());

        while !stage.is_terminal() {
            if let Some(phase) = stage.phase() {
                let report = self.run_phase(phase).await?;
                phases.push(report);
                last_phase = Some(phase);

                state.resume_to_phase = phase.next();
                match phase.next() {
                    Some(_) => self
                        .state_store
                        .save_state(phase.as_str(), &state)
                        .await
                        .map_err(|source| OrchestratorError::State { phase, source })?,
                    None => self
                        .state_store
                        .clear_state()
                        .await
                        .map_err(|source| OrchestratorError::State { phase, source })?,
                }
            }

            let next = stage.next(state.should_continue());
            if next == Stage::Halt {
                info!("{stage}: continue is \"NO\", halting");
            }
            stage = next;
        }

        let outcome = match (stage, last_phase) {
            (Stage::Halt, Some(phase)) => RunOutcome::Halted { after: phase },
            _ => RunOutcome::Completed,
        };
        info!("Orchestration finished: {outcome}");

        Ok(RunReport {
            phases,
            outcome,
            final_state: state,
            started_at,
            completed_at: Utc::now(),
        })
    }

    /// Launch every copy of `phase` and wait for all of them.
    pub async fn run_phase(&self, phase: Phase) -> Result<PhaseReport, OrchestratorError> {
        let config = self.phases.get(phase);
        let role = phase.role();
        info!(
            "=== {} phase: {} copies, {} iterations at load {} ===",
            role.tag(),
            config.copies,
            config.iterations,
            config.load
        );

        let assignments: Vec<WorkerAssignment> = (0..config.copies)
            .map(|copy_index| WorkerAssignment {
                worker_id: format!("{role}-{copy_index}"),
                role,
                copy_index,
                config: config.clone(),
                start_delay: self.stagger * copy_index,
            })
            .collect();

        let launches = assignments.iter().map(|assignment| async move {
            match self.launcher.launch(assignment.clone()).await {
                Ok(summary) => (true, summary),
                Err(e) => {
                    error!("Worker {} failed to run: {e:#}", assignment.worker_id);
                    let summary = WorkerSummary::failed(
                        assignment.worker_id.clone(),
                        assignment.role,
                        assignment.config.clone(),
                        format!("{e:#}"),
                    );
                    (false, summary)
                }
            }
        });

        // Barrier: the phase is over only when every copy has reported
        let results = join_all(launches).await;
        let launch_failures = results.iter().filter(|(launched, _)| !launched).count();
        let report = aggregate_summaries(results.into_iter().map(|(_, s)| s).collect());

        info!(
            "{} phase finished: {}/{} workers clean, {} throttled, {:.1} capacity units",
            role.tag(),
            report.completed_workers,
            report.total_workers,
            report.throttled_count,
            report.consumed_capacity
        );
        if report.failed_iterations > 0 {
            warn!(
                "{} phase lost {} iterations to store failures",
                role.tag(),
                report.failed_iterations
            );
        }

        // Lost iterations are reported; only copies that never ran fail the phase
        if launch_failures > 0 {
            return Err(OrchestratorError::PhaseFailed {
                phase,
                failed: launch_failures,
                total: report.total_workers,
            });
        }

        Ok(PhaseReport { phase, report })
    }
}
