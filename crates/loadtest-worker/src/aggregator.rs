//! Results aggregation for load test workers.

use crate::cli::OutputFormat;
use crate::metrics::{AggregatedReport, WorkerSummary};
use anyhow::{Context, Result};
use chrono::Utc;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use std::fs;
use std::path::Path;

/// Aggregate worker summaries.
/// This is the core aggregation logic used for both phase reports and result directories.
pub fn aggregate_summaries(workers: Vec<WorkerSummary>) -> AggregatedReport {
    let total_workers = workers.len();
    let completed_workers = workers.iter().filter(|w| w.success).count();
    let failed_workers = total_workers - completed_workers;

    let sum = |f: fn(&WorkerSummary) -> u64| -> u64 { workers.iter().map(f).sum() };

    let throttled_count = sum(|w| w.totals.throttled_count);
    let items_written = sum(|w| w.totals.items_written);
    let items_read = sum(|w| w.totals.items_read);
    let items_updated = sum(|w| w.totals.items_updated);
    let resharded_items = sum(|w| w.totals.resharded_items);
    let unresolved_items = sum(|w| w.totals.unresolved_items);
    let failed_iterations = sum(|w| w.totals.failed_iterations);
    let consumed_capacity: f64 = workers.iter().map(|w| w.totals.consumed_capacity).sum();

    // Wall clock time is the maximum worker duration
    let wall_clock_duration_secs = workers
        .iter()
        .map(|w| w.duration_secs())
        .fold(0.0f64, |a, b| a.max(b));

    let aggregate_throughput_per_sec: f64 =
        workers.iter().filter_map(|w| w.throughput_per_sec).sum();

    AggregatedReport {
        total_workers,
        completed_workers,
        failed_workers,
        throttled_count,
        consumed_capacity,
        items_written,
        items_read,
        items_updated,
        resharded_items,
        unresolved_items,
        failed_iterations,
        wall_clock_duration_secs,
        aggregate_throughput_per_sec,
        workers,
        aggregated_at: Utc::now(),
    }
}

/// Aggregate worker summaries from a directory of JSON files.
pub fn aggregate_results(results_dir: &Path) -> Result<AggregatedReport> {
    let mut workers = Vec::new();

    for entry in fs::read_dir(results_dir)
        .with_context(|| format!("Failed to read results directory: {results_dir:?}"))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.extension().map(|e| e == "json").unwrap_or(false) {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read result file: {path:?}"))?;

            let summary: WorkerSummary = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse result file: {path:?}"))?;

            workers.push(summary);
        }
    }

    if workers.is_empty() {
        anyhow::bail!("No worker result files found in {results_dir:?}");
    }

    workers.sort_by(|a, b| a.worker_id.cmp(&b.worker_id));
    Ok(aggregate_summaries(workers))
}

/// Format aggregated report as a table.
pub fn format_table(report: &AggregatedReport) -> String {
    let mut output = String::new();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "Worker",
        "Role",
        "Iterations",
        "Items",
        "Throttled",
        "Capacity",
        "Resharded",
        "Duration",
        "Ops/sec",
        "Status",
    ]);

    for worker in &report.workers {
        let status_cell = if worker.success {
            Cell::new("OK").fg(Color::Green)
        } else {
            Cell::new("FAILED").fg(Color::Red)
        };

        table.add_row(vec![
            Cell::new(&worker.worker_id),
            Cell::new(worker.role.tag()),
            Cell::new(worker.iterations_completed),
            Cell::new(format_number(worker.items_touched())),
            Cell::new(format_number(worker.totals.throttled_count)),
            Cell::new(format!("{:.1}", worker.totals.consumed_capacity)),
            Cell::new(format_number(worker.totals.resharded_items)),
            Cell::new(format_duration(worker.duration_secs())),
            Cell::new(
                worker
                    .throughput_per_sec
                    .map(|t| format!("{t:.1}"))
                    .unwrap_or_else(|| "-".to_string()),
            ),
            status_cell,
        ]);
    }

    table.add_row(vec![
        Cell::new("TOTAL").fg(Color::Cyan),
        Cell::new(""),
        Cell::new(""),
        Cell::new(format_number(
            report.items_written + report.items_read + report.items_updated,
        )),
        Cell::new(format_number(report.throttled_count)),
        Cell::new(format!("{:.1}", report.consumed_capacity)),
        Cell::new(format_number(report.resharded_items)),
        Cell::new(format!(
            "{}*",
            format_duration(report.wall_clock_duration_secs)
        )),
        Cell::new(format!("{:.1}†", report.aggregate_throughput_per_sec)),
        Cell::new(format!(
            "{}/{}",
            report.completed_workers, report.total_workers
        )),
    ]);

    output.push_str(&table.to_string());
    output.push_str("\n* Wall clock (parallel)  † Aggregate throughput\n");

    if report.unresolved_items > 0 {
        output.push_str(&format!(
            "\nUnresolved items (throttled, not resharded): {}\n",
            format_number(report.unresolved_items)
        ));
    }

    if report.failed_workers > 0 {
        output.push_str("\nFailed Workers:\n");
        for worker in report.workers.iter().filter(|w| !w.success) {
            output.push_str(&format!("  {}: {:?}\n", worker.worker_id, worker.errors));
        }
    }

    output
}

/// Format aggregated report as markdown.
pub fn format_markdown(report: &AggregatedReport) -> String {
    let mut output = String::new();

    output.push_str("# Load Test Results\n\n");
    output.push_str(&format!(
        "**Aggregated at:** {}\n\n",
        report.aggregated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    output.push_str("## Summary\n\n");
    output.push_str(&format!("- **Total Workers:** {}\n", report.total_workers));
    output.push_str(&format!("- **Completed:** {}\n", report.completed_workers));
    output.push_str(&format!("- **Failed:** {}\n", report.failed_workers));
    output.push_str(&format!(
        "- **Items Written / Read / Updated:** {} / {} / {}\n",
        format_number(report.items_written),
        format_number(report.items_read),
        format_number(report.items_updated)
    ));
    output.push_str(&format!(
        "- **Throttled:** {} ({} resharded, {} unresolved)\n",
        format_number(report.throttled_count),
        format_number(report.resharded_items),
        format_number(report.unresolved_items)
    ));
    output.push_str(&format!(
        "- **Consumed Capacity:** {:.1}\n",
        report.consumed_capacity
    ));
    output.push_str(&format!(
        "- **Wall Clock Duration:** {}\n\n",
        format_duration(report.wall_clock_duration_secs)
    ));

    output.push_str("## Worker Details\n\n");
    output.push_str("| Worker | Role | Items | Throttled | Capacity | Duration | Status |\n");
    output.push_str("|--------|------|-------|-----------|----------|----------|--------|\n");

    for worker in &report.workers {
        let status = if worker.success { "OK" } else { "FAILED" };
        output.push_str(&format!(
            "| {} | {} | {} | {} | {:.1} | {} | {} |\n",
            worker.worker_id,
            worker.role.tag(),
            format_number(worker.items_touched()),
            format_number(worker.totals.throttled_count),
            worker.totals.consumed_capacity,
            format_duration(worker.duration_secs()),
            status
        ));
    }

    output
}

/// Render an aggregated report in the requested format.
pub fn render_report(report: &AggregatedReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Table => Ok(format_table(report)),
        OutputFormat::Markdown => Ok(format_markdown(report)),
    }
}

/// Format duration in human-readable format.
pub fn format_duration(secs: f64) -> String {
    if secs < 60.0 {
        format!("{secs:.1}s")
    } else if secs < 3600.0 {
        let mins = (secs / 60.0).floor();
        let remaining_secs = secs - (mins * 60.0);
        format!("{}m {:02.0}s", mins as u64, remaining_secs)
    } else {
        let hours = (secs / 3600.0).floor();
        let remaining = secs - (hours * 3600.0);
        let mins = (remaining / 60.0).floor();
        format!("{}h {:02.0}m", hours as u64, mins as u64)
    }
}

/// Format number with thousands separators.
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    let chars: Vec<char> = s.chars().collect();

    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }

    result
}
