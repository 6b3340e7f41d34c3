//! Phased, resumable orchestration of DynamoDB load test workers.
//!
//! A run walks a small state machine:
//!
//! ```text
//! Insert ─► Decision1 ─► Read ─► Decision2 ─► Update ─► Done
//!               │                    │
//!               └──────► Halt ◄──────┘
//! ```
//!
//! Every workload phase launches all copies of its worker role through a
//! [`WorkerLauncher`] and waits for all of them before the next stage. A
//! decision halts the run when the execution input's `continue` field is
//! exactly `"NO"`. After each phase the [`ExecutionState`] for resuming at
//! the next phase is written to a [`StateStore`].
//!
//! ## Storage Backends
//!
//! - `FilesystemStateStore` - Keeps the latest state as a JSON file
//! - `NullStateStore` - Keeps nothing
//!
//! # Example
//!
//! ```rust,ignore
//! use orchestrator::{ExecutionState, InProcessLauncher, LoadTestPlan, Orchestrator};
//!
//! let plan = LoadTestPlan::from_file("plan.yaml".as_ref())?;
//! let launcher = InProcessLauncher::new(store, outbox);
//! let orchestrator = Orchestrator::new(plan.phases(), Arc::new(launcher));
//! let report = orchestrator.run(plan.execution_input.clone()).await?;
//! ```

mod error;
mod filesystem;
mod launcher;
mod machine;
mod phase;
mod plan;
mod report;
mod state;
pub mod store;

pub use error::OrchestratorError;
pub use filesystem::FilesystemStateStore;
pub use launcher::{InProcessLauncher, ProcessLauncher, WorkerAssignment, WorkerLauncher};
pub use machine::{Orchestrator, PhaseConfigs, DEFAULT_STAGGER};
pub use phase::{Phase, Stage};
pub use plan::LoadTestPlan;
pub use report::{format_run_table, PhaseReport, RunOutcome, RunReport};
pub use state::{ExecutionState, PROCEED, STOP};
pub use store::{NullStateStore, StateStore, StoredState};
