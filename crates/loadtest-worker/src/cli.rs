//! CLI argument definitions for workers and result aggregation.
//!
//! Every worker flag falls back to an environment variable so a worker can be
//! configured entirely from its container environment.

use clap::{Args, ValueEnum};
use std::path::PathBuf;
use workload_types::{ConfigError, WorkloadConfig, WorkloadRole, DEFAULT_PARTITION_KEY};

/// Output format for aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Markdown,
}

/// Store backend a worker talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    /// Amazon DynamoDB
    Dynamodb,
    /// In-process store, for dry runs
    Memory,
}

/// Queue URL value that selects the in-process redistribution queue.
pub const MEMORY_QUEUE_URL: &str = "memory";

/// Arguments for running a single worker.
#[derive(Args, Debug, Clone)]
pub struct WorkerArgs {
    /// Workload role (insert, read, update)
    #[arg(long, env = "ROLE", default_value = "insert")]
    pub role: WorkloadRole,

    /// Target table
    #[arg(long, env = "TABLE_NAME")]
    pub table_name: String,

    /// Redistribution queue URL; resharding is disabled when unset
    #[arg(long, env = "QUEUE_URL")]
    pub queue_url: Option<String>,

    /// Number of iterations
    #[arg(long, env = "DURATION", default_value_t = 300)]
    pub iterations: u64,

    /// Items per iteration
    #[arg(long, env = "LOAD", default_value_t = 300)]
    pub load: u64,

    /// Wait between iterations in milliseconds
    #[arg(long = "interval", env = "INTERVAL", default_value_t = 1000)]
    pub interval_millis: u64,

    /// Load growth per ramp step (0.3 = +30%)
    #[arg(long = "increment", env = "INCREMENT", default_value_t = 0.0)]
    pub increment_rate: f64,

    /// Ramp step cadence in iterations
    #[arg(long = "increment-every", env = "INC_TIME", default_value_t = 60)]
    pub increment_every_n_iterations: u64,

    /// Hard load limit, -1 for none
    #[arg(
        long,
        env = "LOAD_LIMIT",
        default_value_t = -1,
        allow_hyphen_values = true
    )]
    pub load_limit: i64,

    /// Partition key every item is written to
    #[arg(long, env = "PARTITION_KEY", default_value = DEFAULT_PARTITION_KEY)]
    pub partition_key: String,

    /// Worker identifier used in reports
    #[arg(long, env = "WORKER_ID")]
    pub worker_id: Option<String>,

    /// Write the worker summary JSON here on completion
    #[arg(long, env = "METRICS_OUTPUT")]
    pub metrics_output: Option<PathBuf>,

    /// Seconds to wait before the first iteration
    #[arg(long, env = "START_DELAY", default_value_t = 0)]
    pub start_delay_secs: u64,

    /// Log a status line every N iterations
    #[arg(long, default_value_t = 1)]
    pub status_every: u64,

    /// Seed for generated items and shard draws
    #[arg(long, env = "SEED")]
    pub seed: Option<u64>,

    /// Store backend
    #[arg(long, value_enum, default_value = "dynamodb")]
    pub store: StoreBackend,

    /// AWS region override
    #[arg(long)]
    pub region: Option<String>,

    /// DynamoDB endpoint override (e.g. http://localhost:8000)
    #[arg(long, env = "DYNAMODB_ENDPOINT")]
    pub endpoint: Option<String>,
}

impl WorkerArgs {
    /// Workload configuration described by these arguments, validated.
    pub fn workload_config(&self) -> Result<WorkloadConfig, ConfigError> {
        if self.table_name.trim().is_empty() {
            return Err(ConfigError::Missing("TABLE_NAME".to_string()));
        }
        let config = WorkloadConfig {
            copies: 1,
            iterations: self.iterations,
            interval_millis: self.interval_millis,
            load: self.load,
            increment_rate: self.increment_rate,
            increment_every_n_iterations: self.increment_every_n_iterations,
            load_limit: self.load_limit,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn worker_id(&self) -> String {
        self.worker_id
            .clone()
            .unwrap_or_else(|| format!("{}-0", self.role))
    }
}

/// Arguments for the aggregate command.
#[derive(Args, Debug, Clone)]
pub struct AggregateArgs {
    /// Directory containing worker summary JSON files
    pub results_dir: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        worker: WorkerArgs,
    }

    #[test]
    fn test_worker_args_defaults() {
        let cli = TestCli::try_parse_from(["test", "--table-name", "loadtest"]).unwrap();
        let config = cli.worker.workload_config().unwrap();

        assert_eq!(cli.worker.role, WorkloadRole::Insert);
        assert_eq!(cli.worker.partition_key, "SinglePK");
        assert_eq!(config.iterations, 300);
        assert_eq!(config.load, 300);
        assert_eq!(config.load_limit, -1);
        assert_eq!(cli.worker.worker_id(), "insert-0");
    }

    #[test]
    fn test_worker_args_flags() {
        let cli = TestCli::try_parse_from([
            "test",
            "--table-name",
            "loadtest",
            "--role",
            "update",
            "--load",
            "50",
            "--increment",
            "0.5",
            "--load-limit",
            "-1",
            "--store",
            "memory",
        ])
        .unwrap();

        assert_eq!(cli.worker.role, WorkloadRole::Update);
        assert_eq!(cli.worker.store, StoreBackend::Memory);
        assert_eq!(cli.worker.workload_config().unwrap().increment_rate, 0.5);
    }

    #[test]
    fn test_negative_increment_is_a_config_error() {
        let cli = TestCli::try_parse_from([
            "test",
            "--table-name",
            "loadtest",
            "--increment=-0.5",
        ])
        .unwrap();

        assert!(cli.worker.workload_config().is_err());
    }
}
