//! Worker process entry point.
//!
//! A worker is one driver copy plus the plumbing around it: store client,
//! redistribution outbox, environment logging and the metrics file.

use crate::cli::{StoreBackend, WorkerArgs, MEMORY_QUEUE_URL};
use crate::driver::{DriverReport, DriverSettings, WorkloadDriver};
use crate::environment::log_runtime_environment;
use crate::metrics::{EnvironmentInfo, WorkerSummary};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use kv_store::{DynamoStore, DynamoStoreConfig, KvStore, MemoryStore};
use reshard_queue::{
    spawn_outbox, MemoryQueue, OutboxHandle, OutboxStats, OutboxTask, SqsSender,
    DEFAULT_OUTBOX_CAPACITY,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Open the store a worker (or a set of in-process workers) writes to.
pub async fn connect_store(
    backend: StoreBackend,
    table_name: &str,
    region: Option<String>,
    endpoint: Option<String>,
) -> Arc<dyn KvStore> {
    match backend {
        StoreBackend::Memory => {
            info!("Using in-memory store for table {table_name}");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Dynamodb => {
            info!("Using DynamoDB table {table_name}");
            let config = DynamoStoreConfig {
                table_name: table_name.to_string(),
                region,
                endpoint,
            };
            Arc::new(DynamoStore::connect(config).await)
        }
    }
}

/// Start the redistribution outbox for `queue_url`, if one is configured.
pub async fn open_outbox(queue_url: Option<&str>) -> Option<(OutboxHandle, OutboxTask)> {
    let queue_url = queue_url?;
    if queue_url == MEMORY_QUEUE_URL {
        info!("Redistribution notifications go to an in-memory queue");
        return Some(spawn_outbox(MemoryQueue::new(), DEFAULT_OUTBOX_CAPACITY));
    }
    info!("Redistribution notifications go to {queue_url}");
    let sender = SqsSender::connect(queue_url).await;
    Some(spawn_outbox(sender, DEFAULT_OUTBOX_CAPACITY))
}

/// Assemble the final summary of one driver run.
pub fn summarize(
    settings: &DriverSettings,
    report: DriverReport,
    environment: EnvironmentInfo,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    notifications: Option<OutboxStats>,
) -> WorkerSummary {
    let success = report.success();
    WorkerSummary {
        worker_id: settings.worker_id.clone(),
        execution_id: report.execution_id,
        role: report.role,
        started_at,
        completed_at,
        environment,
        config: settings.config.clone(),
        iterations_completed: report.iterations_completed,
        final_load: report.final_load,
        throughput_per_sec: report.throughput_per_sec,
        totals: report.totals,
        notifications,
        errors: report.errors,
        success,
    }
}

/// Write a worker summary as pretty JSON.
pub fn write_summary(summary: &WorkerSummary, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write metrics to {path:?}"))?;
    info!("Metrics written to {:?}", path);
    Ok(())
}

/// Run one worker to completion.
pub async fn run_worker(args: WorkerArgs) -> Result<WorkerSummary> {
    let config = args
        .workload_config()
        .context("Invalid worker configuration")?;
    let worker_id = args.worker_id();

    info!("Starting worker: {}", worker_id);
    info!("Role: {}", args.role);
    info!("Table: {}", args.table_name);
    info!(
        "Iterations: {}, load: {}, interval: {}ms",
        config.iterations, config.load, config.interval_millis
    );

    let environment = log_runtime_environment();
    let store = connect_store(
        args.store,
        &args.table_name,
        args.region.clone(),
        args.endpoint.clone(),
    )
    .await;

    let (outbox, outbox_task) = match open_outbox(args.queue_url.as_deref()).await {
        Some((handle, task)) => (Some(handle), Some(task)),
        None => (None, None),
    };

    let mut settings = DriverSettings::new(worker_id, args.role, config);
    settings.partition_key = args.partition_key.clone();
    settings.start_delay = Duration::from_secs(args.start_delay_secs);
    settings.status_every = args.status_every;
    settings.seed = args.seed;

    let started_at = Utc::now();
    let report = WorkloadDriver::new(settings.clone(), store, outbox)
        .run()
        .await;
    let completed_at = Utc::now();

    // The driver dropped its outbox handle, so the task drains and ends
    let notifications = match outbox_task {
        Some(task) => Some(task.finish().await),
        None => None,
    };
    if let Some(stats) = notifications {
        info!(
            "Redistribution notifications: {} delivered, {} failed, {} dropped",
            stats.delivered, stats.failed, stats.dropped
        );
    }

    let summary = summarize(
        &settings,
        report,
        environment,
        started_at,
        completed_at,
        notifications,
    );

    if let Some(path) = &args.metrics_output {
        write_summary(&summary, path)?;
    }

    info!(
        "Worker {} completed in {:.2}s",
        summary.worker_id,
        summary.duration_secs()
    );

    Ok(summary)
}
