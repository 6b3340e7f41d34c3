//! Lazy Shard Load Test Library
//!
//! A load generator for a DynamoDB-compatible store. It pushes insert, read
//! and update traffic at one hot partition, finds the point where the store
//! starts throttling, and moves throttled writes to shard partitions
//! (`<pk>#<n>`) while notifying a redistribution queue.
//!
//! # Crates
//!
//! - `workload_types` - Items, shard keys, workload configuration and totals
//! - `kv_store` - The store interface, DynamoDB and in-memory backends
//! - `reshard_queue` - Redistribution messages and the bounded outbox
//! - `loadtest_worker` - Drivers, batch executor, throttle handler, metrics
//! - `orchestrator` - The Insert → Read → Update phase machine
//!
//! # CLI Usage
//!
//! ```bash
//! # One worker, configured from its container environment
//! ROLE=insert TABLE_NAME=loadtest LOAD=200 DURATION=60 lazy-shard-loadtest worker
//!
//! # A whole run from a plan, workers as tasks of this process
//! lazy-shard-loadtest orchestrate --plan plan.yaml
//!
//! # Resume an interrupted run at the phase after the last completed one
//! lazy-shard-loadtest orchestrate --plan plan.yaml --resume
//!
//! # Aggregate the metrics files written by worker processes
//! lazy-shard-loadtest aggregate ./loadtest-results --format markdown
//! ```

use clap::{Args, ValueEnum};
use loadtest_worker::{OutputFormat, StoreBackend};
use std::path::{Path, PathBuf};

pub mod aggregate;
pub mod orchestrate;

pub use loadtest_worker::{AggregateArgs, WorkerArgs};

/// How the orchestrator runs worker copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LauncherKind {
    /// Tokio tasks sharing one store client and outbox
    InProcess,
    /// One `worker` subprocess per copy
    Process,
}

/// Arguments for the orchestrate command.
#[derive(Args, Debug, Clone)]
pub struct OrchestrateArgs {
    /// Load test plan (YAML)
    #[arg(long, env = "PLAN")]
    pub plan: PathBuf,

    /// Resume from the stored execution state
    #[arg(long)]
    pub resume: bool,

    /// Execution input as JSON, e.g. '{"resumeTo": "ReadData", "runNext": "YES"}'
    #[arg(long, env = "EXECUTION_INPUT", conflicts_with = "resume")]
    pub input: Option<String>,

    /// Override the input's continue value ("NO" halts at the next decision)
    #[arg(long = "continue", value_name = "VALUE")]
    pub proceed: Option<String>,

    /// Directory for execution state; overrides the plan's stateDir
    #[arg(long)]
    pub state_dir: Option<PathBuf>,

    /// How worker copies are run
    #[arg(long, value_enum, default_value = "in-process")]
    pub launcher: LauncherKind,

    /// Directory for worker metrics files (process launcher)
    #[arg(long, default_value = "loadtest-results")]
    pub results_dir: PathBuf,

    /// Store backend
    #[arg(long, value_enum, default_value = "dynamodb")]
    pub store: StoreBackend,

    /// AWS region override
    #[arg(long)]
    pub region: Option<String>,

    /// DynamoDB endpoint override (e.g. http://localhost:8000)
    #[arg(long, env = "DYNAMODB_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Seed for reproducible in-process runs
    #[arg(long, env = "SEED")]
    pub seed: Option<u64>,

    /// Log a status line every N iterations
    #[arg(long, default_value_t = 1)]
    pub status_every: u64,

    /// Report format
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

/// Print `report`, or write it to `output` when given.
pub fn emit_report(report: &str, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, report)?;
            tracing::info!("Report written to {}", path.display());
        }
        None => println!("{report}"),
    }
    Ok(())
}
