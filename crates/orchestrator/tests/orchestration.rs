//! End-to-end orchestration runs against scripted launchers and the
//! in-memory store.

use anyhow::Result;
use async_trait::async_trait;
use kv_store::MemoryStore;
use loadtest_worker::WorkerSummary;
use orchestrator::{
    ExecutionState, FilesystemStateStore, InProcessLauncher, Orchestrator, OrchestratorError,
    Phase, PhaseConfigs, RunOutcome, StateStore, WorkerAssignment, WorkerLauncher,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::Instant;
use workload_types::{WorkloadConfig, WorkloadRole};

#[derive(Debug, Clone)]
struct Launch {
    assignment: WorkerAssignment,
    started: Instant,
    finished: Instant,
}

/// Pretends to run each copy for `(copy_index + 1) * work` after its stagger.
struct ScriptedLauncher {
    work: Duration,
    fail_copy: Option<(WorkloadRole, u32)>,
    launches: Mutex<Vec<Launch>>,
}

impl ScriptedLauncher {
    fn new() -> Self {
        Self {
            work: Duration::from_secs(2),
            fail_copy: None,
            launches: Mutex::new(Vec::new()),
        }
    }

    fn failing(role: WorkloadRole, copy_index: u32) -> Self {
        Self {
            fail_copy: Some((role, copy_index)),
            ..Self::new()
        }
    }

    fn launches(&self) -> Vec<Launch> {
        self.launches.lock().unwrap().clone()
    }

    fn launches_of(&self, role: WorkloadRole) -> Vec<Launch> {
        self.launches()
            .into_iter()
            .filter(|l| l.assignment.role == role)
            .collect()
    }
}

#[async_trait]
impl WorkerLauncher for ScriptedLauncher {
    async fn launch(&self, assignment: WorkerAssignment) -> Result<WorkerSummary> {
        let started = Instant::now();
        tokio::time::sleep(assignment.start_delay).await;
        tokio::time::sleep(self.work * (assignment.copy_index + 1)).await;

        self.launches.lock().unwrap().push(Launch {
            assignment: assignment.clone(),
            started,
            finished: Instant::now(),
        });

        if self.fail_copy == Some((assignment.role, assignment.copy_index)) {
            anyhow::bail!("container exited with code 137");
        }

        let mut summary = WorkerSummary::failed(
            assignment.worker_id,
            assignment.role,
            assignment.config,
            "",
        );
        summary.errors.clear();
        summary.success = true;
        summary.totals.items_written = 1;
        Ok(summary)
    }
}

fn config(copies: u32) -> WorkloadConfig {
    WorkloadConfig {
        copies,
        iterations: 5,
        interval_millis: 1000,
        load: 10,
        ..WorkloadConfig::default()
    }
}

fn phases(insert: u32, read: u32, update: u32) -> PhaseConfigs {
    PhaseConfigs {
        insert: config(insert),
        read: config(read),
        update: config(update),
    }
}

#[tokio::test(start_paused = true)]
async fn test_full_run_with_in_process_workers() {
    let store = Arc::new(MemoryStore::new());
    let launcher = InProcessLauncher::new(store.clone(), None).with_seed(42);
    let orchestrator = Orchestrator::new(phases(3, 2, 1), Arc::new(launcher));

    let run = orchestrator.run(ExecutionState::default()).await.unwrap();

    assert_eq!(run.outcome, RunOutcome::Completed);
    assert_eq!(run.ran(), vec![Phase::Insert, Phase::Read, Phase::Update]);

    let insert = run.phase(Phase::Insert).unwrap();
    assert_eq!(insert.total_workers, 3);
    assert_eq!(insert.items_written, 150);
    assert_eq!(insert.throttled_count, 0);
    assert!(insert.consumed_capacity > 0.0);
    for worker in &insert.workers {
        assert_eq!(worker.totals.items_written, 50);
    }
    assert_eq!(store.item_count(), 150);

    let read = run.phase(Phase::Read).unwrap();
    assert_eq!(read.total_workers, 2);
    assert!(read.items_read > 0);
    assert_eq!(read.items_written, 0);

    let update = run.phase(Phase::Update).unwrap();
    assert!(update.items_updated > 0);
    assert_eq!(store.item_count(), 150);
    assert_eq!(run.final_state.resume_to_phase, None);
}

#[tokio::test(start_paused = true)]
async fn test_next_phase_waits_for_every_copy() {
    let launcher = Arc::new(ScriptedLauncher::new());
    let orchestrator = Orchestrator::new(phases(3, 2, 1), launcher.clone());

    orchestrator.run(ExecutionState::default()).await.unwrap();

    let inserts = launcher.launches_of(WorkloadRole::Insert);
    let reads = launcher.launches_of(WorkloadRole::Read);
    let updates = launcher.launches_of(WorkloadRole::Update);
    assert_eq!((inserts.len(), reads.len(), updates.len()), (3, 2, 1));

    let last_insert = inserts.iter().map(|l| l.finished).max().unwrap();
    let last_read = reads.iter().map(|l| l.finished).max().unwrap();
    assert!(reads.iter().all(|l| l.started >= last_insert));
    assert!(updates.iter().all(|l| l.started >= last_read));
}

#[tokio::test(start_paused = true)]
async fn test_copies_are_staggered_by_index() {
    let launcher = Arc::new(ScriptedLauncher::new());
    let orchestrator = Orchestrator::new(phases(3, 1, 1), launcher.clone());

    orchestrator.run(ExecutionState::default()).await.unwrap();

    let mut inserts = launcher.launches_of(WorkloadRole::Insert);
    inserts.sort_by_key(|l| l.assignment.copy_index);
    let delays: Vec<u64> = inserts
        .iter()
        .map(|l| l.assignment.start_delay.as_secs())
        .collect();
    assert_eq!(delays, vec![0, 1, 2]);
    assert_eq!(inserts[2].assignment.worker_id, "insert-2");

    // All copies were launched together; only their own delay held them back
    let first_start = inserts[0].started;
    assert!(inserts.iter().all(|l| l.started == first_start));
}

#[tokio::test(start_paused = true)]
async fn test_no_halts_after_insert() {
    let dir = TempDir::new().unwrap();
    let state_store = Arc::new(FilesystemStateStore::new(dir.path()));
    let launcher = Arc::new(ScriptedLauncher::new());
    let orchestrator =
        Orchestrator::new(phases(2, 2, 2), launcher.clone()).with_state_store(state_store.clone());

    let run = orchestrator
        .run(ExecutionState::default().with_continue("NO"))
        .await
        .unwrap();

    assert_eq!(
        run.outcome,
        RunOutcome::Halted {
            after: Phase::Insert
        }
    );
    assert_eq!(run.ran(), vec![Phase::Insert]);
    assert!(launcher.launches_of(WorkloadRole::Read).is_empty());
    assert!(launcher.launches_of(WorkloadRole::Update).is_empty());

    let stored = state_store.load_state().await.unwrap().unwrap();
    assert_eq!(stored.completed_phase, "insert");
    assert_eq!(stored.state.resume_to_phase, Some(Phase::Read));
}

#[tokio::test(start_paused = true)]
async fn test_no_halts_after_read_when_resumed_there() {
    let launcher = Arc::new(ScriptedLauncher::new());
    let orchestrator = Orchestrator::new(phases(1, 1, 1), launcher.clone());

    let input = ExecutionState::from_json(r#"{"resumeTo": "ReadData", "runNext": "NO"}"#).unwrap();
    let run = orchestrator.run(input).await.unwrap();

    assert_eq!(
        run.outcome,
        RunOutcome::Halted {
            after: Phase::Read
        }
    );
    assert_eq!(run.ran(), vec![Phase::Read]);
    assert!(launcher.launches_of(WorkloadRole::Insert).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_resume_after_halt_skips_completed_phases() {
    let dir = TempDir::new().unwrap();
    let state_store = Arc::new(FilesystemStateStore::new(dir.path()));

    let first = Arc::new(ScriptedLauncher::new());
    Orchestrator::new(phases(1, 1, 1), first.clone())
        .with_state_store(state_store.clone())
        .run(ExecutionState::default().with_continue("NO"))
        .await
        .unwrap();

    let stored = state_store.load_state().await.unwrap().unwrap();
    let second = Arc::new(ScriptedLauncher::new());
    let run = Orchestrator::new(phases(1, 1, 1), second.clone())
        .with_state_store(state_store.clone())
        .run(stored.state.with_continue("YES"))
        .await
        .unwrap();

    assert_eq!(run.outcome, RunOutcome::Completed);
    assert_eq!(run.ran(), vec![Phase::Read, Phase::Update]);
    assert!(second.launches_of(WorkloadRole::Insert).is_empty());
    assert!(state_store.load_state().await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_failed_copy_fails_phase_after_barrier() {
    let dir = TempDir::new().unwrap();
    let state_store = Arc::new(FilesystemStateStore::new(dir.path()));
    let launcher = Arc::new(ScriptedLauncher::failing(WorkloadRole::Read, 0));
    let orchestrator =
        Orchestrator::new(phases(1, 3, 1), launcher.clone()).with_state_store(state_store.clone());

    let err = orchestrator
        .run(ExecutionState::default())
        .await
        .unwrap_err();

    match err {
        OrchestratorError::PhaseFailed {
            phase,
            failed,
            total,
        } => {
            assert_eq!(phase, Phase::Read);
            assert_eq!(failed, 1);
            assert_eq!(total, 3);
        }
        other => panic!("unexpected error: {other}"),
    }

    // The other copies still ran to completion, and update never started
    assert_eq!(launcher.launches_of(WorkloadRole::Read).len(), 3);
    assert!(launcher.launches_of(WorkloadRole::Update).is_empty());

    // Resuming repeats the failed phase
    let stored = state_store.load_state().await.unwrap().unwrap();
    assert_eq!(stored.state.resume_to_phase, Some(Phase::Read));
}

#[tokio::test]
async fn test_invalid_phase_config_fails_before_launching() {
    let launcher = Arc::new(ScriptedLauncher::new());
    let mut configs = phases(1, 1, 1);
    configs.update.increment_every_n_iterations = 0;

    let err = Orchestrator::new(configs, launcher.clone())
        .run(ExecutionState::default())
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::Config(_)));
    assert!(launcher.launches().is_empty());
}
