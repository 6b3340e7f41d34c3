//! Ways of running one worker copy of a phase.
//!
//! The [`InProcessLauncher`] runs drivers as tokio tasks sharing one store
//! client and one redistribution outbox. The [`ProcessLauncher`] starts one
//! `worker` subprocess per copy, configured through the same environment
//! variables a container deployment would set, and reads its metrics file
//! back.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use kv_store::KvStore;
use loadtest_worker::{
    log_runtime_environment, summarize, DriverSettings, EnvironmentInfo, StoreBackend,
    WorkerSummary, WorkloadDriver,
};
use reshard_queue::OutboxHandle;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};
use workload_types::{WorkloadConfig, WorkloadRole, DEFAULT_PARTITION_KEY};

/// One copy of a phase, as handed to a launcher.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerAssignment {
    pub worker_id: String,
    pub role: WorkloadRole,
    /// Position of this copy within its phase, from 0
    pub copy_index: u32,
    pub config: WorkloadConfig,
    /// Stagger before the copy's first iteration
    pub start_delay: Duration,
}

/// Runs a worker copy to completion and reports its summary.
///
/// A launcher error means the copy never produced a summary; the
/// orchestrator counts it as a failed copy of the phase.
#[async_trait]
pub trait WorkerLauncher: Send + Sync {
    async fn launch(&self, assignment: WorkerAssignment) -> Result<WorkerSummary>;
}

/// Runs drivers as tasks of the current process.
pub struct InProcessLauncher {
    store: Arc<dyn KvStore>,
    outbox: Option<OutboxHandle>,
    partition_key: String,
    status_every: u64,
    seed: Option<u64>,
    environment: EnvironmentInfo,
}

impl InProcessLauncher {
    pub fn new(store: Arc<dyn KvStore>, outbox: Option<OutboxHandle>) -> Self {
        Self {
            store,
            outbox,
            partition_key: DEFAULT_PARTITION_KEY.to_string(),
            status_every: 1,
            seed: None,
            environment: log_runtime_environment(),
        }
    }

    pub fn with_partition_key(mut self, partition_key: impl Into<String>) -> Self {
        self.partition_key = partition_key.into();
        self
    }

    pub fn with_status_every(mut self, status_every: u64) -> Self {
        self.status_every = status_every;
        self
    }

    /// Derive every copy's seed from `seed`, for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn settings(&self, assignment: &WorkerAssignment) -> DriverSettings {
        let mut settings = DriverSettings::new(
            assignment.worker_id.clone(),
            assignment.role,
            assignment.config.clone(),
        );
        settings.partition_key = self.partition_key.clone();
        settings.start_delay = assignment.start_delay;
        settings.status_every = self.status_every;
        settings.seed = self.seed.map(|seed| {
            let role_offset = match assignment.role {
                WorkloadRole::Insert => 0,
                WorkloadRole::Read => 1_000,
                WorkloadRole::Update => 2_000,
            };
            seed.wrapping_add(role_offset + u64::from(assignment.copy_index))
        });
        settings
    }
}

#[async_trait]
impl WorkerLauncher for InProcessLauncher {
    async fn launch(&self, assignment: WorkerAssignment) -> Result<WorkerSummary> {
        let settings = self.settings(&assignment);
        debug!(
            "Launching {} in process after {:?}",
            settings.worker_id, settings.start_delay
        );

        let driver = WorkloadDriver::new(settings.clone(), self.store.clone(), self.outbox.clone());
        let report = driver.run().await;

        let completed_at = Utc::now();
        let elapsed = chrono::Duration::from_std(report.duration)
            .unwrap_or_else(|_| chrono::Duration::zero());

        Ok(summarize(
            &settings,
            report,
            self.environment.clone(),
            completed_at - elapsed,
            completed_at,
            None,
        ))
    }
}

/// Runs each copy as a `worker` subprocess of `program`.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    table_name: String,
    queue_url: Option<String>,
    partition_key: String,
    store: StoreBackend,
    region: Option<String>,
    endpoint: Option<String>,
    results_dir: PathBuf,
}

impl ProcessLauncher {
    pub fn new(
        program: impl Into<PathBuf>,
        table_name: impl Into<String>,
        results_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            table_name: table_name.into(),
            queue_url: None,
            partition_key: DEFAULT_PARTITION_KEY.to_string(),
            store: StoreBackend::Dynamodb,
            region: None,
            endpoint: None,
            results_dir: results_dir.into(),
        }
    }

    /// Launch copies of the currently running executable.
    pub fn current_exe(
        table_name: impl Into<String>,
        results_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let program = std::env::current_exe().context("Failed to locate current executable")?;
        Ok(Self::new(program, table_name, results_dir))
    }

    pub fn with_queue_url(mut self, queue_url: Option<String>) -> Self {
        self.queue_url = queue_url;
        self
    }

    pub fn with_partition_key(mut self, partition_key: impl Into<String>) -> Self {
        self.partition_key = partition_key.into();
        self
    }

    pub fn with_store(
        mut self,
        store: StoreBackend,
        region: Option<String>,
        endpoint: Option<String>,
    ) -> Self {
        self.store = store;
        self.region = region;
        self.endpoint = endpoint;
        self
    }

    pub fn metrics_path(&self, worker_id: &str) -> PathBuf {
        self.results_dir.join(format!("{worker_id}.json"))
    }

    /// The subprocess command for one copy.
    pub fn command(&self, assignment: &WorkerAssignment) -> Command {
        let config = &assignment.config;
        let mut cmd = Command::new(&self.program);
        cmd.arg("worker")
            .arg("--store")
            .arg(match self.store {
                StoreBackend::Dynamodb => "dynamodb",
                StoreBackend::Memory => "memory",
            })
            .env("ROLE", assignment.role.to_string())
            .env("TABLE_NAME", &self.table_name)
            .env("DURATION", config.iterations.to_string())
            .env("LOAD", config.load.to_string())
            .env("INTERVAL", config.interval_millis.to_string())
            .env("INCREMENT", config.increment_rate.to_string())
            .env("INC_TIME", config.increment_every_n_iterations.to_string())
            .env("LOAD_LIMIT", config.load_limit.to_string())
            .env("PARTITION_KEY", &self.partition_key)
            .env("WORKER_ID", &assignment.worker_id)
            .env("START_DELAY", assignment.start_delay.as_secs().to_string())
            .env("METRICS_OUTPUT", self.metrics_path(&assignment.worker_id))
            .kill_on_drop(true);

        if let Some(queue_url) = &self.queue_url {
            cmd.env("QUEUE_URL", queue_url);
        }
        if let Some(region) = &self.region {
            cmd.arg("--region").arg(region);
        }
        if let Some(endpoint) = &self.endpoint {
            cmd.env("DYNAMODB_ENDPOINT", endpoint);
        }
        cmd
    }
}

#[async_trait]
impl WorkerLauncher for ProcessLauncher {
    async fn launch(&self, assignment: WorkerAssignment) -> Result<WorkerSummary> {
        std::fs::create_dir_all(&self.results_dir)
            .with_context(|| format!("Failed to create results directory {:?}", self.results_dir))?;

        info!(
            "Spawning worker process {} ({})",
            assignment.worker_id,
            self.program.display()
        );
        let status = self
            .command(&assignment)
            .status()
            .await
            .with_context(|| format!("Failed to spawn worker {}", assignment.worker_id))?;

        if !status.success() {
            anyhow::bail!("Worker {} exited with {status}", assignment.worker_id);
        }

        let path = self.metrics_path(&assignment.worker_id);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read worker metrics {path:?}"))?;
        let summary = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse worker metrics {path:?}"))?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kv_store::MemoryStore;
    use std::ffi::OsStr;

    fn assignment(role: WorkloadRole, copy_index: u32) -> WorkerAssignment {
        WorkerAssignment {
            worker_id: format!("{role}-{copy_index}"),
            role,
            copy_index,
            config: WorkloadConfig {
                copies: 2,
                iterations: 3,
                interval_millis: 500,
                load: 10,
                ..WorkloadConfig::default()
            },
            start_delay: Duration::from_secs(u64::from(copy_index)),
        }
    }

    fn env_value<'a>(cmd: &'a Command, key: &str) -> Option<&'a OsStr> {
        cmd.as_std()
            .get_envs()
            .find(|(k, _)| *k == OsStr::new(key))
            .and_then(|(_, v)| v)
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_process_launch_runs_driver() {
        let store = Arc::new(MemoryStore::new());
        let launcher = InProcessLauncher::new(store.clone(), None).with_seed(7);

        let summary = launcher
            .launch(assignment(WorkloadRole::Insert, 1))
            .await
            .unwrap();

        assert!(summary.success);
        assert_eq!(summary.worker_id, "insert-1");
        assert_eq!(summary.totals.items_written, 30);
        assert_eq!(store.item_count(), 30);
        assert!(summary.duration_secs() >= 1.5);
    }

    #[test]
    fn test_copy_seeds_differ() {
        let launcher = InProcessLauncher::new(Arc::new(MemoryStore::new()), None).with_seed(7);
        let a = launcher.settings(&assignment(WorkloadRole::Insert, 0));
        let b = launcher.settings(&assignment(WorkloadRole::Insert, 1));
        let c = launcher.settings(&assignment(WorkloadRole::Read, 0));

        assert_eq!(a.seed, Some(7));
        assert_ne!(a.seed, b.seed);
        assert_ne!(a.seed, c.seed);
        assert_eq!(b.start_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_process_command_carries_worker_environment() {
        let launcher = ProcessLauncher::new("/usr/local/bin/lazy-shard-loadtest", "loadtest", "/tmp/results")
            .with_queue_url(Some("https://sqs.example/queue".to_string()))
            .with_store(StoreBackend::Memory, None, None);
        let cmd = launcher.command(&assignment(WorkloadRole::Update, 2));

        assert_eq!(env_value(&cmd, "ROLE"), Some(OsStr::new("update")));
        assert_eq!(env_value(&cmd, "TABLE_NAME"), Some(OsStr::new("loadtest")));
        assert_eq!(env_value(&cmd, "DURATION"), Some(OsStr::new("3")));
        assert_eq!(env_value(&cmd, "INTERVAL"), Some(OsStr::new("500")));
        assert_eq!(env_value(&cmd, "LOAD_LIMIT"), Some(OsStr::new("-1")));
        assert_eq!(env_value(&cmd, "START_DELAY"), Some(OsStr::new("2")));
        assert_eq!(
            env_value(&cmd, "QUEUE_URL"),
            Some(OsStr::new("https://sqs.example/queue"))
        );
        assert_eq!(
            env_value(&cmd, "METRICS_OUTPUT"),
            Some(OsStr::new("/tmp/results/update-2.json"))
        );

        let args: Vec<&OsStr> = cmd.as_std().get_args().collect();
        assert_eq!(args, vec!["worker", "--store", "memory"]);
    }

    #[tokio::test]
    async fn test_missing_program_is_a_launch_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let launcher = ProcessLauncher::new(
            dir.path().join("no-such-binary"),
            "loadtest",
            dir.path().join("results"),
        );

        assert!(launcher
            .launch(assignment(WorkloadRole::Insert, 0))
            .await
            .is_err());
    }
}
