//! Execution input passed between orchestration runs.

use crate::phase::Phase;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Value of `continue` that stops a run at the next decision.
pub const STOP: &str = "NO";

/// Value of `continue` written by default.
pub const PROCEED: &str = "YES";

/// Input of an orchestration run, and what gets persisted after each phase.
///
/// Accepts both `resumeToPhase`/`continue` and the state machine input
/// `resumeTo`/`runNext` spelling. Unknown fields are carried through
/// untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionState {
    /// Phase to start at; the beginning when unset
    #[serde(default, alias = "resumeTo", skip_serializing_if = "Option::is_none")]
    pub resume_to_phase: Option<Phase>,

    /// Anything except exactly `"NO"` proceeds at a decision
    #[serde(rename = "continue", alias = "runNext", default)]
    pub proceed: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ExecutionState {
    fn default() -> Self {
        Self {
            resume_to_phase: Some(Phase::Insert),
            proceed: Some(PROCEED.to_string()),
            extra: Map::new(),
        }
    }
}

impl ExecutionState {
    pub fn resume_at(phase: Phase) -> Self {
        Self {
            resume_to_phase: Some(phase),
            ..Self::default()
        }
    }

    /// Whether a decision stage lets the run go on.
    pub fn should_continue(&self) -> bool {
        self.proceed.as_deref() != Some(STOP)
    }

    /// The phase a run with this input starts at.
    pub fn start_phase(&self) -> Phase {
        self.resume_to_phase.unwrap_or(Phase::Insert)
    }

    pub fn with_continue(mut self, value: impl Into<String>) -> Self {
        self.proceed = Some(value.into());
        self
    }

    /// Parse an execution input from JSON.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deployment_input_spelling() {
        let state =
            ExecutionState::from_json(r#"{"resumeTo": "InsertData", "runNext": "YES"}"#).unwrap();
        assert_eq!(state.resume_to_phase, Some(Phase::Insert));
        assert!(state.should_continue());
    }

    #[test]
    fn test_only_exact_no_stops() {
        let stop = ExecutionState::from_json(r#"{"continue": "NO"}"#).unwrap();
        assert!(!stop.should_continue());

        for value in ["no", "No", "YES", "", "maybe"] {
            let state = ExecutionState::default().with_continue(value);
            assert!(state.should_continue(), "{value:?} should proceed");
        }

        let missing = ExecutionState::from_json("{}").unwrap();
        assert!(missing.should_continue());
        assert_eq!(missing.start_phase(), Phase::Insert);
    }

    #[test]
    fn test_extra_fields_pass_through() {
        let state = ExecutionState::from_json(
            r#"{"resumeToPhase": "read", "continue": "YES", "owner": "perf-team", "attempt": 2}"#,
        )
        .unwrap();

        assert_eq!(state.start_phase(), Phase::Read);
        assert_eq!(state.extra.get("owner"), Some(&Value::from("perf-team")));

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["resumeToPhase"], "read");
        assert_eq!(json["continue"], "YES");
        assert_eq!(json["attempt"], 2);
    }

    #[test]
    fn test_unknown_phase_is_rejected() {
        assert!(ExecutionState::from_json(r#"{"resumeTo": "Cleanup"}"#).is_err());
    }
}
