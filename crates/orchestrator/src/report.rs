//! Per-phase reports of an orchestration run.

use crate::phase::Phase;
use crate::state::ExecutionState;
use chrono::{DateTime, Utc};
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use loadtest_worker::{format_duration, format_number, format_table, AggregatedReport};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Aggregated result of all copies of one phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseReport {
    pub phase: Phase,
    pub report: AggregatedReport,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every phase from the starting one through Update ran
    Completed,
    /// A decision stopped the run after `after`
    Halted { after: Phase },
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Completed => write!(f, "completed"),
            RunOutcome::Halted { after } => write!(f, "halted after {after} phase"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub phases: Vec<PhaseReport>,
    pub outcome: RunOutcome,
    /// Execution state after the last completed phase
    pub final_state: ExecutionState,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl RunReport {
    pub fn phase(&self, phase: Phase) -> Option<&AggregatedReport> {
        self.phases
            .iter()
            .find(|p| p.phase == phase)
            .map(|p| &p.report)
    }

    pub fn ran(&self) -> Vec<Phase> {
        self.phases.iter().map(|p| p.phase).collect()
    }
}

/// One row per phase, followed by the worker table of each phase.
pub fn format_run_table(run: &RunReport) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "Phase",
        "Copies",
        "Clean",
        "Written",
        "Read",
        "Updated",
        "Throttled",
        "Resharded",
        "Capacity",
        "Wall clock",
    ]);

    for phase in &run.phases {
        let report = &phase.report;
        let clean = if report.failed_workers == 0 {
            Cell::new(report.completed_workers).fg(Color::Green)
        } else {
            Cell::new(report.completed_workers).fg(Color::Yellow)
        };
        table.add_row(vec![
            Cell::new(phase.phase.as_str()),
            Cell::new(report.total_workers),
            clean,
            Cell::new(format_number(report.items_written)),
            Cell::new(format_number(report.items_read)),
            Cell::new(format_number(report.items_updated)),
            Cell::new(format_number(report.throttled_count)),
            Cell::new(format_number(report.resharded_items)),
            Cell::new(format!("{:.1}", report.consumed_capacity)),
            Cell::new(format_duration(report.wall_clock_duration_secs)),
        ]);
    }

    let mut output = format!("Run {}\n{table}\n", run.outcome);
    for phase in &run.phases {
        output.push_str(&format!("\n{} phase\n", phase.phase));
        output.push_str(&format_table(&phase.report));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadtest_worker::{aggregate_summaries, WorkerSummary};
    use workload_types::{WorkloadConfig, WorkloadRole};

    fn phase_report(phase: Phase, written: u64) -> PhaseReport {
        let mut summary =
            WorkerSummary::failed("insert-0", WorkloadRole::Insert, WorkloadConfig::default(), "");
        summary.errors.clear();
        summary.success = true;
        summary.totals.items_written = written;
        PhaseReport {
            phase,
            report: aggregate_summaries(vec![summary]),
        }
    }

    #[test]
    fn test_run_table_lists_phases_and_outcome() {
        let now = Utc::now();
        let run = RunReport {
            phases: vec![phase_report(Phase::Insert, 1500)],
            outcome: RunOutcome::Halted {
                after: Phase::Insert,
            },
            final_state: ExecutionState::resume_at(Phase::Read),
            started_at: now,
            completed_at: now,
        };

        let table = format_run_table(&run);
        assert!(table.starts_with("Run halted after insert phase"));
        assert!(table.contains("1,500"));
        assert!(table.contains("insert-0"));
        assert_eq!(run.ran(), vec![Phase::Insert]);
        assert!(run.phase(Phase::Read).is_none());
    }

    #[test]
    fn test_outcome_json_shape() {
        let json = serde_json::to_value(RunOutcome::Halted {
            after: Phase::Read,
        })
        .unwrap();
        assert_eq!(json["status"], "halted");
        assert_eq!(json["after"], "read");
    }
}
