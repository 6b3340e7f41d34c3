//! Workload configuration types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error raised when a configuration value is missing or out of range.
///
/// Configuration errors are fatal at process start.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    Missing(String),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Kind of load a worker generates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadRole {
    Insert,
    Read,
    Update,
}

impl WorkloadRole {
    /// Tag used to prefix status lines (`INSERT <id> STATUS: ...`).
    pub fn tag(&self) -> &'static str {
        match self {
            WorkloadRole::Insert => "INSERT",
            WorkloadRole::Read => "READ",
            WorkloadRole::Update => "UPDATE",
        }
    }
}

impl std::fmt::Display for WorkloadRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkloadRole::Insert => write!(f, "insert"),
            WorkloadRole::Read => write!(f, "read"),
            WorkloadRole::Update => write!(f, "update"),
        }
    }
}

impl std::str::FromStr for WorkloadRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "insert" | "write" | "put" => Ok(WorkloadRole::Insert),
            "read" | "query" | "get" => Ok(WorkloadRole::Read),
            "update" => Ok(WorkloadRole::Update),
            _ => Err(format!("Unknown workload role: {s}")),
        }
    }
}

/// Load settings for one worker role.
///
/// Immutable for the lifetime of a driver; the driver's load controller
/// keeps its own copy of the current load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadConfig {
    /// Number of parallel copies of this worker per phase
    #[serde(default = "default_copies")]
    pub copies: u32,
    /// Number of iterations each copy runs
    #[serde(default = "default_iterations")]
    pub iterations: u64,
    /// Fixed wait between iterations, on top of processing time
    #[serde(default = "default_interval_millis", alias = "interval")]
    pub interval_millis: u64,
    /// Items (or capacity units) per iteration
    #[serde(default = "default_load")]
    pub load: u64,
    /// Growth applied at each ramp boundary (0.3 = +30%)
    #[serde(default, alias = "increment")]
    pub increment_rate: f64,
    /// Ramp boundary cadence, in iterations
    #[serde(
        default = "default_increment_every_n_iterations",
        alias = "incrementTime"
    )]
    pub increment_every_n_iterations: u64,
    /// Hard load limit; -1 means unbounded
    #[serde(default = "default_load_limit")]
    pub load_limit: i64,
}

fn default_copies() -> u32 {
    5
}

fn default_iterations() -> u64 {
    600
}

fn default_interval_millis() -> u64 {
    1000
}

fn default_load() -> u64 {
    300
}

fn default_increment_every_n_iterations() -> u64 {
    60
}

fn default_load_limit() -> i64 {
    -1
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            copies: default_copies(),
            iterations: default_iterations(),
            interval_millis: default_interval_millis(),
            load: default_load(),
            increment_rate: 0.0,
            increment_every_n_iterations: default_increment_every_n_iterations(),
            load_limit: default_load_limit(),
        }
    }
}

impl WorkloadConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.copies < 1 {
            return Err(ConfigError::invalid("copies", "must be >= 1"));
        }
        if !self.increment_rate.is_finite() || self.increment_rate < 0.0 {
            return Err(ConfigError::invalid(
                "incrementRate",
                format!("must be a finite value >= 0, got {}", self.increment_rate),
            ));
        }
        if self.increment_every_n_iterations < 1 {
            return Err(ConfigError::invalid(
                "incrementEveryNIterations",
                "must be >= 1",
            ));
        }
        if self.load_limit < -1 {
            return Err(ConfigError::invalid(
                "loadLimit",
                format!("must be -1 (unbounded) or >= 0, got {}", self.load_limit),
            ));
        }
        Ok(())
    }

    /// The load limit, or `None` when unbounded.
    pub fn limit(&self) -> Option<u64> {
        u64::try_from(self.load_limit).ok()
    }

    /// Operations per second at `load`, or `None` for a zero interval.
    pub fn throughput(&self, load: u64) -> Option<f64> {
        if self.interval_millis == 0 {
            return None;
        }
        Some(load as f64 / (self.interval_millis as f64 / 1000.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_workload_config() {
        let config = WorkloadConfig::default();
        assert_eq!(config.copies, 5);
        assert_eq!(config.iterations, 600);
        assert_eq!(config.interval_millis, 1000);
        assert_eq!(config.load, 300);
        assert_eq!(config.increment_rate, 0.0);
        assert_eq!(config.increment_every_n_iterations, 60);
        assert_eq!(config.limit(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_accepts_short_field_aliases() {
        let yaml = r#"
copies: 3
iterations: 60
interval: 500
load: 200
increment: 0.3
incrementTime: 10
loadLimit: 400
"#;
        let config: WorkloadConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.copies, 3);
        assert_eq!(config.interval_millis, 500);
        assert_eq!(config.increment_rate, 0.3);
        assert_eq!(config.increment_every_n_iterations, 10);
        assert_eq!(config.limit(), Some(400));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let bad_copies = WorkloadConfig {
            copies: 0,
            ..Default::default()
        };
        assert!(bad_copies.validate().is_err());

        let bad_rate = WorkloadConfig {
            increment_rate: -0.5,
            ..Default::default()
        };
        assert!(bad_rate.validate().is_err());

        let bad_cadence = WorkloadConfig {
            increment_every_n_iterations: 0,
            ..Default::default()
        };
        assert!(bad_cadence.validate().is_err());

        let bad_limit = WorkloadConfig {
            load_limit: -2,
            ..Default::default()
        };
        assert!(bad_limit.validate().is_err());
    }

    #[test]
    fn test_throughput() {
        let config = WorkloadConfig {
            interval_millis: 500,
            ..Default::default()
        };
        assert_eq!(config.throughput(100), Some(200.0));

        let zero = WorkloadConfig {
            interval_millis: 0,
            ..Default::default()
        };
        assert_eq!(zero.throughput(100), None);
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("INSERT".parse::<WorkloadRole>(), Ok(WorkloadRole::Insert));
        assert_eq!("read".parse::<WorkloadRole>(), Ok(WorkloadRole::Read));
        assert_eq!("Update".parse::<WorkloadRole>(), Ok(WorkloadRole::Update));
        assert!("delete".parse::<WorkloadRole>().is_err());
        assert_eq!(WorkloadRole::Read.tag(), "READ");
    }
}
