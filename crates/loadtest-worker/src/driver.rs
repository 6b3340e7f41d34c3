//! Workload driver: the per-worker iteration loop.
//!
//! Each iteration sizes its operation with the [`LoadController`], launches
//! it on a separate task, waits the fixed interval, then joins the task and
//! folds the result into the driver's [`RunningTotals`]. The operation of
//! iteration `i + 1` is only launched once iteration `i` has been joined, so
//! at most one iteration is in flight while the interval timer runs.

use crate::environment::resource_usage;
use crate::executor::{BatchExecutor, BatchOperation, ExecutorLimits, ItemUpdate};
use crate::load::LoadController;
use crate::reshard::ThrottleHandler;
use crate::sampler::KeySampler;
use kv_store::{KvStore, StoreError};
use loadtest_generator::ItemGenerator;
use reshard_queue::OutboxHandle;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;
use workload_types::{
    Item, RunningTotals, ShardRange, WorkloadConfig, WorkloadRole, DEFAULT_PARTITION_KEY,
};

/// Errors kept verbatim in the report; later ones are only counted.
const MAX_RECORDED_ERRORS: usize = 20;

/// Everything one driver copy needs to know.
#[derive(Debug, Clone)]
pub struct DriverSettings {
    pub worker_id: String,
    pub role: WorkloadRole,
    pub config: WorkloadConfig,
    pub partition_key: String,
    /// Wait before the first iteration (copy stagger)
    pub start_delay: Duration,
    /// Log a status line every this many iterations
    pub status_every: u64,
    pub executor_limits: ExecutorLimits,
    pub shards: ShardRange,
    /// Seed for item, sample and shard randomness; entropy when unset
    pub seed: Option<u64>,
}

impl DriverSettings {
    pub fn new(worker_id: impl Into<String>, role: WorkloadRole, config: WorkloadConfig) -> Self {
        Self {
            worker_id: worker_id.into(),
            role,
            config,
            partition_key: DEFAULT_PARTITION_KEY.to_string(),
            start_delay: Duration::ZERO,
            status_every: 1,
            executor_limits: ExecutorLimits::default(),
            shards: ShardRange::default(),
            seed: None,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.config.interval_millis)
    }
}

/// What a driver reports once its loop ends.
#[derive(Debug, Clone)]
pub struct DriverReport {
    pub execution_id: String,
    pub role: WorkloadRole,
    pub iterations_completed: u64,
    pub final_load: u64,
    pub throughput_per_sec: Option<f64>,
    pub totals: RunningTotals,
    pub errors: Vec<String>,
    /// Time spent in the loop, excluding the start delay
    pub duration: Duration,
}

impl DriverReport {
    pub fn success(&self) -> bool {
        self.totals.failed_iterations == 0
    }
}

/// One copy of an insert, read or update worker.
pub struct WorkloadDriver {
    settings: DriverSettings,
    execution_id: String,
    store: Arc<dyn KvStore>,
    executor: BatchExecutor,
    load: LoadController,
    throttle: ThrottleHandler,
    generator: ItemGenerator,
    sampler: KeySampler,
    totals: RunningTotals,
    errors: Vec<String>,
}

impl WorkloadDriver {
    pub fn new(
        settings: DriverSettings,
        store: Arc<dyn KvStore>,
        outbox: Option<OutboxHandle>,
    ) -> Self {
        let executor = BatchExecutor::with_limits(store.clone(), settings.executor_limits);
        let load = LoadController::new(&settings.config);
        let mut throttle = ThrottleHandler::new(store.clone(), outbox)
            .with_partition_key(settings.partition_key.clone())
            .with_shards(settings.shards);
        let mut sampler = KeySampler::new(settings.partition_key.clone());
        let generator = match settings.seed {
            Some(seed) => {
                throttle = throttle.with_seed(seed);
                sampler = sampler.with_seed(seed);
                ItemGenerator::new(settings.partition_key.clone(), seed)
            }
            None => ItemGenerator::from_entropy(settings.partition_key.clone()),
        };

        Self {
            settings,
            execution_id: Uuid::new_v4().to_string(),
            store,
            executor,
            load,
            throttle,
            generator,
            sampler,
            totals: RunningTotals::default(),
            errors: Vec::new(),
        }
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    /// Run all iterations and report.
    pub async fn run(mut self) -> DriverReport {
        let tag = self.settings.role.tag();
        let interval = self.settings.interval();
        let iterations = self.settings.config.iterations;

        if !self.settings.start_delay.is_zero() {
            tokio::time::sleep(self.settings.start_delay).await;
        }

        info!(
            "{tag} {} START: worker {}, {} iterations, load {}, interval {}ms",
            self.execution_id,
            self.settings.worker_id,
            iterations,
            self.settings.config.load,
            self.settings.config.interval_millis
        );

        let started = Instant::now();
        let mut completed = 0u64;

        for iteration in 0..iterations {
            let load = self.load.next_load(iteration);

            match self.prepare(load).await {
                Ok(operation) => {
                    let executor = self.executor.clone();
                    let handle = tokio::spawn(async move { executor.execute(operation).await });

                    tokio::time::sleep(interval).await;

                    match handle.await {
                        Ok(Ok(result)) => {
                            self.totals.record_batch(self.settings.role, &result);
                            if self.settings.role == WorkloadRole::Insert {
                                self.reshard(result.unprocessed_items).await;
                            }
                        }
                        Ok(Err(failure)) => {
                            self.fail(format!(
                                "{tag} {} failed to resolve {} chunks: {failure}",
                                self.execution_id, failure.remaining_chunks
                            ));
                        }
                        Err(join_error) => {
                            self.fail(format!(
                                "{tag} {} iteration {iteration} task failed: {join_error}",
                                self.execution_id
                            ));
                        }
                    }
                }
                Err(e) => {
                    self.fail(format!(
                        "{tag} {} failed to prepare iteration {iteration}: {e}",
                        self.execution_id
                    ));
                    tokio::time::sleep(interval).await;
                }
            }

            completed += 1;
            if completed % self.settings.status_every.max(1) == 0 || completed == iterations {
                self.log_status(completed, load);
            }
        }

        let duration = started.elapsed();
        let final_load = self.load.current();
        let throughput_per_sec = self.settings.config.throughput(final_load);

        info!(
            "{tag} {} DONE: {} iterations in {:.1}s, final load {}, throughput {}, throttled {}, consumed capacity {:.1}, items read {}, written {}, updated {}, resharded {}, unresolved {}, failed iterations {}",
            self.execution_id,
            completed,
            duration.as_secs_f64(),
            final_load,
            throughput_per_sec
                .map(|t| format!("{t:.1}/s"))
                .unwrap_or_else(|| "-".to_string()),
            self.totals.throttled_count,
            self.totals.consumed_capacity,
            self.totals.items_read,
            self.totals.items_written,
            self.totals.items_updated,
            self.totals.resharded_items,
            self.totals.unresolved_items,
            self.totals.failed_iterations
        );

        DriverReport {
            execution_id: self.execution_id,
            role: self.settings.role,
            iterations_completed: completed,
            final_load,
            throughput_per_sec,
            totals: self.totals,
            errors: self.errors,
            duration,
        }
    }

    /// Build the operation for one iteration.
    async fn prepare(&mut self, load: u64) -> Result<BatchOperation, StoreError> {
        match self.settings.role {
            WorkloadRole::Insert => Ok(BatchOperation::Write(self.generator.items(load))),
            WorkloadRole::Read => {
                let sample = self.sampler.sample(self.store.as_ref(), load as usize).await?;
                self.totals.record_capacity(sample.consumed_capacity);
                Ok(BatchOperation::Get(sample.keys))
            }
            WorkloadRole::Update => {
                let sample = self
                    .sampler
                    .sample_pooled(self.store.as_ref(), load as usize)
                    .await?;
                self.totals.record_capacity(sample.consumed_capacity);
                let updates = sample
                    .keys
                    .into_iter()
                    .map(|key| ItemUpdate {
                        key,
                        payload: self.generator.next_payload(),
                    })
                    .collect();
                Ok(BatchOperation::Update(updates))
            }
        }
    }

    async fn reshard(&mut self, unprocessed: Vec<Item>) {
        if unprocessed.is_empty() {
            return;
        }

        match self.throttle.handle(unprocessed).await {
            Ok(report) => {
                self.totals.record_capacity(report.consumed_capacity);
                self.totals.resharded_items += report.resharded;
                self.totals.items_written += report.resharded;
                self.totals.notifications_queued += report.notifications;
                self.totals.unresolved_items += report.skipped.len() as u64;
            }
            Err(e) => {
                let report = e.report();
                self.totals.record_capacity(report.consumed_capacity);
                self.totals.resharded_items += report.resharded;
                self.totals.items_written += report.resharded;
                self.totals.notifications_queued += report.notifications;
                self.totals.unresolved_items += e.remaining().len() as u64;
                warn!(
                    "{} {} resharding incomplete: {e}",
                    self.settings.role.tag(),
                    self.execution_id
                );
            }
        }
    }

    fn fail(&mut self, message: String) {
        error!("{message}");
        self.totals.record_failure();
        if self.errors.len() < MAX_RECORDED_ERRORS {
            self.errors.push(message);
        }
    }

    fn log_status(&self, completed: u64, load: u64) {
        info!(
            "{} {} STATUS: iteration {}/{}, load {}, throttled {}, consumed capacity {:.1}, items read {}, written {}, updated {} | {}",
            self.settings.role.tag(),
            self.execution_id,
            completed,
            self.settings.config.iterations,
            load,
            self.totals.throttled_count,
            self.totals.consumed_capacity,
            self.totals.items_read,
            self.totals.items_written,
            self.totals.items_updated,
            resource_usage()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kv_store::MemoryStore;
    use reshard_queue::{spawn_outbox, MemoryQueue};

    fn settings(role: WorkloadRole, iterations: u64, load: u64) -> DriverSettings {
        let config = WorkloadConfig {
            copies: 1,
            iterations,
            interval_millis: 1000,
            load,
            increment_rate: 0.0,
            increment_every_n_iterations: 60,
            load_limit: -1,
        };
        let mut settings = DriverSettings::new(format!("{role}-0"), role, config);
        settings.seed = Some(17);
        settings
    }

    #[tokio::test(start_paused = true)]
    async fn test_insert_driver_writes_load_times_iterations() {
        let store = Arc::new(MemoryStore::new());
        let driver = WorkloadDriver::new(settings(WorkloadRole::Insert, 5, 10), store.clone(), None);

        let report = driver.run().await;

        assert_eq!(report.iterations_completed, 5);
        assert_eq!(report.totals.items_written, 50);
        assert_eq!(report.totals.throttled_count, 0);
        assert!(report.totals.consumed_capacity > 0.0);
        assert_eq!(store.item_count(), 50);
        assert_eq!(report.throughput_per_sec, Some(10.0));
        assert!(report.success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_iterations_are_paced_by_interval() {
        let store = Arc::new(MemoryStore::new());
        let driver = WorkloadDriver::new(settings(WorkloadRole::Insert, 4, 1), store, None);

        let started = Instant::now();
        let report = driver.run().await;

        assert!(started.elapsed() >= Duration::from_secs(4));
        assert!(report.duration >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_insert_driver_reshards_throttled_items() {
        let store = Arc::new(MemoryStore::new().with_saturated_partition("SinglePK"));
        let queue = MemoryQueue::new();
        let (outbox, task) = spawn_outbox(queue.clone(), 64);

        let driver = WorkloadDriver::new(
            settings(WorkloadRole::Insert, 2, 10),
            store.clone(),
            Some(outbox),
        );
        let report = driver.run().await;
        let stats = task.finish().await;

        assert_eq!(report.totals.throttled_count, 20);
        assert_eq!(report.totals.resharded_items, 20);
        assert_eq!(report.totals.items_written, 20);
        assert_eq!(report.totals.unresolved_items, 0);
        assert_eq!(store.partition_len("SinglePK"), 0);
        assert_eq!(store.item_count(), 20);
        assert_eq!(stats.delivered, report.totals.notifications_queued);
        assert!(!queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_whole_request_refusal_is_throttling_not_failure() {
        let store = Arc::new(
            MemoryStore::new()
                .with_saturated_partition("SinglePK")
                .with_whole_request_refusals(),
        );
        let (outbox, task) = spawn_outbox(MemoryQueue::new(), 64);

        let driver = WorkloadDriver::new(
            settings(WorkloadRole::Insert, 2, 30),
            store.clone(),
            Some(outbox),
        );
        let report = driver.run().await;
        task.finish().await;

        assert!(report.success());
        assert_eq!(report.totals.failed_iterations, 0);
        assert_eq!(report.totals.throttled_count, 60);
        assert_eq!(report.totals.resharded_items, 60);
        assert_eq!(report.totals.unresolved_items, 0);
        assert_eq!(store.partition_len("SinglePK"), 0);
        assert!(store.stats().throttled_requests > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_refusal_counts_throttled_keys() {
        let store = Arc::new(MemoryStore::new().with_whole_request_refusals());
        store.insert_items(ItemGenerator::new("SinglePK", 1).items(100));
        store.saturate("SinglePK");

        let driver = WorkloadDriver::new(settings(WorkloadRole::Read, 1, 10), store.clone(), None);
        let report = driver.run().await;

        assert!(report.success());
        assert_eq!(report.totals.items_read, 0);
        assert_eq!(report.totals.throttled_count, 10);
        assert_eq!(store.stats().throttled_requests, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reshard_keeps_configured_partition_key() {
        let store = Arc::new(MemoryStore::new().with_saturated_partition("Tenant#2024"));
        let (outbox, task) = spawn_outbox(MemoryQueue::new(), 64);

        let mut settings = settings(WorkloadRole::Insert, 1, 10);
        settings.partition_key = "Tenant#2024".to_string();
        let report = WorkloadDriver::new(settings, store.clone(), Some(outbox))
            .run()
            .await;
        task.finish().await;

        assert_eq!(report.totals.resharded_items, 10);
        let partitions = store.partitions();
        assert!(!partitions.is_empty());
        assert!(partitions.iter().all(|key| key.starts_with("Tenant#2024#")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_insert_without_queue_counts_unresolved() {
        let store = Arc::new(MemoryStore::new().with_partition_write_budget(6));
        let driver = WorkloadDriver::new(settings(WorkloadRole::Insert, 3, 10), store.clone(), None);

        let report = driver.run().await;

        assert_eq!(report.totals.items_written, 18);
        assert_eq!(report.totals.throttled_count, 12);
        assert_eq!(report.totals.unresolved_items, 12);
        assert_eq!(report.totals.resharded_items, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_driver_counts_items_read() {
        let store = Arc::new(MemoryStore::new());
        store.insert_items(ItemGenerator::new("SinglePK", 1).items(200));

        let driver = WorkloadDriver::new(settings(WorkloadRole::Read, 3, 20), store.clone(), None);
        let report = driver.run().await;

        assert_eq!(report.totals.items_read, 60);
        assert_eq!(report.totals.throttled_count, 0);
        assert!(store.stats().batch_get_calls >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_driver_overwrites_sampled_items() {
        let store = Arc::new(MemoryStore::new());
        let seeded = ItemGenerator::new("SinglePK", 2).items(100);
        store.insert_items(seeded.clone());

        let driver = WorkloadDriver::new(settings(WorkloadRole::Update, 2, 15), store.clone(), None);
        let report = driver.run().await;

        assert_eq!(report.totals.items_updated, 30);
        assert_eq!(store.item_count(), 100);
        let changed = seeded
            .iter()
            .filter(|item| store.get(&item.key()).map(|i| i.payload) != Some(item.payload.clone()))
            .count();
        assert_eq!(changed, 15);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_loses_iteration_and_continues() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next(1);

        let driver = WorkloadDriver::new(settings(WorkloadRole::Insert, 3, 10), store.clone(), None);
        let report = driver.run().await;

        assert_eq!(report.iterations_completed, 3);
        assert_eq!(report.totals.failed_iterations, 1);
        assert_eq!(report.totals.items_written, 20);
        assert_eq!(report.errors.len(), 1);
        assert!(!report.success());
    }
}
