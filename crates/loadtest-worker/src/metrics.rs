//! Metrics types for worker output and aggregation.

use chrono::{DateTime, Utc};
use reshard_queue::OutboxStats;
use serde::{Deserialize, Serialize};
use std::fmt;
use workload_types::{RunningTotals, WorkloadConfig, WorkloadRole};

/// Runtime environment information captured at worker startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    /// Number of CPU cores visible to the worker
    pub cpu_cores: usize,
    /// Total memory in MB
    pub memory_mb: u64,
    /// Available memory in MB
    pub available_memory_mb: u64,
    pub hostname: String,
}

/// Memory snapshot attached to status lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub used_memory_mb: u64,
    pub available_memory_mb: u64,
}

impl fmt::Display for ResourceUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "memory used {} MB, available {} MB",
            self.used_memory_mb, self.available_memory_mb
        )
    }
}

/// Final report of one worker (one driver copy).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSummary {
    /// Worker identifier, e.g. `insert-2`
    pub worker_id: String,
    /// Unique id of this execution, used as the status line prefix
    pub execution_id: String,
    pub role: WorkloadRole,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub environment: EnvironmentInfo,
    pub config: WorkloadConfig,
    pub iterations_completed: u64,
    /// Load of the last iteration, after ramping
    pub final_load: u64,
    /// Operations per second at the final load
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throughput_per_sec: Option<f64>,
    pub totals: RunningTotals,
    /// Redistribution outbox counters, when this worker owned the outbox
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notifications: Option<OutboxStats>,
    /// Errors encountered
    #[serde(default)]
    pub errors: Vec<String>,
    pub success: bool,
}

impl WorkerSummary {
    /// Get duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        (self.completed_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    /// Items this worker moved, whatever its role.
    pub fn items_touched(&self) -> u64 {
        match self.role {
            WorkloadRole::Insert => self.totals.items_written,
            WorkloadRole::Read => self.totals.items_read,
            WorkloadRole::Update => self.totals.items_updated,
        }
    }

    /// A summary for a worker that never got to run its loop.
    pub fn failed(
        worker_id: impl Into<String>,
        role: WorkloadRole,
        config: WorkloadConfig,
        error: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            worker_id: worker_id.into(),
            execution_id: String::new(),
            role,
            started_at: now,
            completed_at: now,
            environment: EnvironmentInfo::default(),
            config,
            iterations_completed: 0,
            final_load: 0,
            throughput_per_sec: None,
            totals: RunningTotals::default(),
            notifications: None,
            errors: vec![error.into()],
            success: false,
        }
    }
}

/// Aggregated results for a set of workers (usually one phase).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedReport {
    pub total_workers: usize,
    pub completed_workers: usize,
    pub failed_workers: usize,
    pub throttled_count: u64,
    pub consumed_capacity: f64,
    pub items_written: u64,
    pub items_read: u64,
    pub items_updated: u64,
    pub resharded_items: u64,
    pub unresolved_items: u64,
    pub failed_iterations: u64,
    /// Wall clock duration (max worker duration)
    pub wall_clock_duration_secs: f64,
    /// Sum of the workers' final throughputs
    pub aggregate_throughput_per_sec: f64,
    pub workers: Vec<WorkerSummary>,
    pub aggregated_at: DateTime<Utc>,
}
