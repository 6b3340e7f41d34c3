//! Load test plans: what an orchestration run targets and how hard.
//!
//! ```yaml
//! tableName: loadtest
//! queueUrl: https://sqs.us-east-1.amazonaws.com/123456789012/redistribution
//! insert:
//!   copies: 3
//!   load: 200
//!   iterations: 60
//!   interval: 1000
//!   increment: 0.3
//!   incrementTime: 10
//!   loadLimit: 1000
//! read:
//!   copies: 9
//! executionInput:
//!   resumeTo: InsertData
//!   runNext: "YES"
//! ```
//!
//! Phases left out of the file get the deployment defaults: 200 items per
//! iteration for 60 iterations one second apart, 3 insert copies, 9 read
//! copies and 3 update copies. Fields left out of a phase that is present
//! take the worker defaults instead.

use crate::machine::PhaseConfigs;
use crate::state::ExecutionState;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use workload_types::{ConfigError, WorkloadConfig, DEFAULT_PARTITION_KEY};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadTestPlan {
    pub table_name: String,

    /// Redistribution queue; resharding is disabled without one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_url: Option<String>,

    #[serde(default = "default_partition_key")]
    pub partition_key: String,

    #[serde(default = "default_insert")]
    pub insert: WorkloadConfig,

    #[serde(default = "default_read")]
    pub read: WorkloadConfig,

    #[serde(default = "default_update")]
    pub update: WorkloadConfig,

    /// Input used when a run is neither resumed nor given one explicitly
    #[serde(default)]
    pub execution_input: ExecutionState,

    /// Where execution state is kept between runs; not persisted when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
}

fn default_partition_key() -> String {
    DEFAULT_PARTITION_KEY.to_string()
}

fn deployment_defaults(copies: u32) -> WorkloadConfig {
    WorkloadConfig {
        copies,
        iterations: 60,
        interval_millis: 1000,
        load: 200,
        increment_rate: 0.0,
        increment_every_n_iterations: 60,
        load_limit: -1,
    }
}

fn default_insert() -> WorkloadConfig {
    deployment_defaults(3)
}

fn default_read() -> WorkloadConfig {
    deployment_defaults(9)
}

fn default_update() -> WorkloadConfig {
    deployment_defaults(3)
}

impl LoadTestPlan {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            queue_url: None,
            partition_key: default_partition_key(),
            insert: default_insert(),
            read: default_read(),
            update: default_update(),
            execution_input: ExecutionState::default(),
            state_dir: None,
        }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let plan: LoadTestPlan = serde_yaml::from_str(yaml).context("Failed to parse load test plan")?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read load test plan {path:?}"))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid load test plan {path:?}"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.table_name.trim().is_empty() {
            return Err(ConfigError::Missing("tableName".to_string()));
        }
        if self.partition_key.is_empty() {
            return Err(ConfigError::invalid("partitionKey", "must not be empty"));
        }
        self.insert.validate()?;
        self.read.validate()?;
        self.update.validate()?;
        Ok(())
    }

    pub fn phases(&self) -> PhaseConfigs {
        PhaseConfigs {
            insert: self.insert.clone(),
            read: self.read.clone(),
            update: self.update.clone(),
        }
    }
}
