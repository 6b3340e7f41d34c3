//! Workload phases and the states of the orchestration machine.

use serde::{Deserialize, Serialize};
use workload_types::WorkloadRole;

/// A workload phase: all copies of one worker role, run to a barrier.
///
/// Phases always run in the order `Insert`, `Read`, `Update` and are never
/// re-entered within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    #[serde(rename = "insert", alias = "Insert", alias = "InsertData", alias = "insertData")]
    Insert,
    #[serde(rename = "read", alias = "Read", alias = "ReadData", alias = "readData")]
    Read,
    #[serde(rename = "update", alias = "Update", alias = "UpdateData", alias = "updateData")]
    Update,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Insert, Phase::Read, Phase::Update];

    /// Get the string representation of this phase.
    ///
    /// Used for state files, worker ids and log output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Insert => "insert",
            Phase::Read => "read",
            Phase::Update => "update",
        }
    }

    /// Worker role every copy of this phase runs.
    pub fn role(&self) -> WorkloadRole {
        match self {
            Phase::Insert => WorkloadRole::Insert,
            Phase::Read => WorkloadRole::Read,
            Phase::Update => WorkloadRole::Update,
        }
    }

    /// The phase that follows this one, if any.
    pub fn next(&self) -> Option<Phase> {
        match self {
            Phase::Insert => Some(Phase::Read),
            Phase::Read => Some(Phase::Update),
            Phase::Update => None,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "insert" | "insertdata" => Ok(Phase::Insert),
            "read" | "readdata" => Ok(Phase::Read),
            "update" | "updatedata" => Ok(Phase::Update),
            _ => Err(format!("Unknown phase: {s}")),
        }
    }
}

/// State of the orchestration machine.
///
/// ```text
/// Insert ─► Decision1 ─► Read ─► Decision2 ─► Update ─► Done
///               │                    │
///               └──────► Halt ◄──────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Insert,
    Decision1,
    Read,
    Decision2,
    Update,
    Halt,
    Done,
}

impl Stage {
    /// The stage a run starts in when resuming at `phase`.
    pub fn entry(phase: Phase) -> Stage {
        match phase {
            Phase::Insert => Stage::Insert,
            Phase::Read => Stage::Read,
            Phase::Update => Stage::Update,
        }
    }

    /// The workload phase this stage runs, if it runs one.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Stage::Insert => Some(Phase::Insert),
            Stage::Read => Some(Phase::Read),
            Stage::Update => Some(Phase::Update),
            Stage::Decision1 | Stage::Decision2 | Stage::Halt | Stage::Done => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Halt | Stage::Done)
    }

    /// Transition out of this stage. Decisions proceed unless told to stop;
    /// terminal stages stay where they are.
    pub fn next(self, proceed: bool) -> Stage {
        match self {
            Stage::Insert => Stage::Decision1,
            Stage::Decision1 if proceed => Stage::Read,
            Stage::Decision1 => Stage::Halt,
            Stage::Read => Stage::Decision2,
            Stage::Decision2 if proceed => Stage::Update,
            Stage::Decision2 => Stage::Halt,
            Stage::Update => Stage::Done,
            Stage::Halt => Stage::Halt,
            Stage::Done => Stage::Done,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Insert => "Insert",
            Stage::Decision1 => "Decision1",
            Stage::Read => "Read",
            Stage::Decision2 => "Decision2",
            Stage::Update => "Update",
            Stage::Halt => "Halt",
            Stage::Done => "Done",
        };
        f.write_str(name)
    }
}
