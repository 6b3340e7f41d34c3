//! Aggregate command handler.

use crate::{emit_report, AggregateArgs};
use anyhow::Result;
use loadtest_worker::{aggregate_results, render_report, AggregatedReport};

/// Aggregate a directory of worker metrics files and emit the report.
pub fn run_aggregate(args: &AggregateArgs) -> Result<AggregatedReport> {
    let report = aggregate_results(&args.results_dir)?;
    emit_report(&render_report(&report, args.format)?, args.output.as_deref())?;
    Ok(report)
}
