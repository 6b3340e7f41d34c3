//! Orchestrate command handler.

use crate::{emit_report, LauncherKind, OrchestrateArgs};
use anyhow::{Context, Result};
use loadtest_worker::{connect_store, format_markdown, open_outbox, OutputFormat};
use orchestrator::{
    format_run_table, ExecutionState, FilesystemStateStore, InProcessLauncher, LoadTestPlan,
    NullStateStore, Orchestrator, ProcessLauncher, RunReport, StateStore, WorkerLauncher,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Run the orchestrate command and emit its report.
pub async fn run_orchestrate(args: OrchestrateArgs) -> Result<RunReport> {
    let plan = LoadTestPlan::from_file(&args.plan)?;
    let run = orchestrate(&plan, &args).await?;

    let report = render_run(&run, args.format)?;
    emit_report(&report, args.output.as_deref())?;
    Ok(run)
}

/// Run every phase `plan` calls for, as selected by `args`.
pub async fn orchestrate(plan: &LoadTestPlan, args: &OrchestrateArgs) -> Result<RunReport> {
    let state_store: Arc<dyn StateStore> = match args.state_dir.as_ref().or(plan.state_dir.as_ref()) {
        Some(dir) => {
            info!("Execution state kept in {}", dir.display());
            Arc::new(FilesystemStateStore::new(dir))
        }
        None => Arc::new(NullStateStore),
    };

    let input = execution_input(plan, args, state_store.as_ref()).await?;

    let (launcher, outbox_task) = match args.launcher {
        LauncherKind::InProcess => {
            let store = connect_store(
                args.store,
                &plan.table_name,
                args.region.clone(),
                args.endpoint.clone(),
            )
            .await;
            let (outbox, task) = match open_outbox(plan.queue_url.as_deref()).await {
                Some((handle, task)) => (Some(handle), Some(task)),
                None => (None, None),
            };
            let mut launcher = InProcessLauncher::new(store, outbox)
                .with_partition_key(plan.partition_key.clone())
                .with_status_every(args.status_every);
            if let Some(seed) = args.seed {
                launcher = launcher.with_seed(seed);
            }
            let launcher: Arc<dyn WorkerLauncher> = Arc::new(launcher);
            (launcher, task)
        }
        LauncherKind::Process => {
            let launcher = ProcessLauncher::current_exe(&plan.table_name, &args.results_dir)?
                .with_queue_url(plan.queue_url.clone())
                .with_partition_key(plan.partition_key.clone())
                .with_store(args.store, args.region.clone(), args.endpoint.clone());
            let launcher: Arc<dyn WorkerLauncher> = Arc::new(launcher);
            (launcher, None)
        }
    };

    let orchestrator = Orchestrator::new(plan.phases(), launcher).with_state_store(state_store);
    let result = orchestrator.run(input).await;

    // Dropping the orchestrator drops the last outbox handle, so the task drains
    drop(orchestrator);
    if let Some(task) = outbox_task {
        let stats = task.finish().await;
        info!(
            "Redistribution notifications: {} delivered, {} failed, {} dropped",
            stats.delivered, stats.failed, stats.dropped
        );
    }

    Ok(result?)
}

/// The input a run starts from: stored state, explicit JSON, or the plan's.
async fn execution_input(
    plan: &LoadTestPlan,
    args: &OrchestrateArgs,
    state_store: &dyn StateStore,
) -> Result<ExecutionState> {
    let mut input = if args.resume {
        match state_store.load_state().await? {
            Some(stored) => {
                info!(
                    "Resuming after {} phase (stored {})",
                    stored.completed_phase, stored.created_at
                );
                stored.state
            }
            None => {
                warn!("No stored execution state found, starting from the plan's input");
                plan.execution_input.clone()
            }
        }
    } else if let Some(json) = &args.input {
        ExecutionState::from_json(json).context("Invalid execution input")?
    } else {
        plan.execution_input.clone()
    };

    if let Some(value) = &args.proceed {
        input = input.with_continue(value.clone());
    }
    Ok(input)
}

/// Render a run report in the requested format.
pub fn render_run(run: &RunReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(run)?),
        OutputFormat::Table => Ok(format_run_table(run)),
        OutputFormat::Markdown => {
            let mut output = format!("# Load Test Run ({})\n", run.outcome);
            for phase in &run.phases {
                output.push_str(&format!("\n## {} phase\n\n", phase.phase));
                output.push_str(&format_markdown(&phase.report));
            }
            Ok(output)
        }
    }
}
