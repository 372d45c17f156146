//! Configuration types for Ember

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Names of the scheduler's job catalog
pub mod jobs {
    pub const AGENT_CYCLE: &str = "agent_cycle";
    pub const RELATIONSHIP_DECAY: &str = "relationship_decay";
    pub const MEMORY_CLEANUP: &str = "memory_cleanup";
    pub const TOKEN_RESET: &str = "token_reset";

    pub const ALL: [&str; 4] = [AGENT_CYCLE, RELATIONSHIP_DECAY, MEMORY_CLEANUP, TOKEN_RESET];
}

/// Heat ledger tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeatConfig {
    /// Upper bound of an actor's heat
    pub cap: f64,

    /// Heat added per executed action
    pub per_action: f64,

    /// Heat removed per elapsed minute
    pub decay_per_minute: f64,

    /// Actors above this value may not act
    pub action_threshold: f64,
}

impl Default for HeatConfig {
    fn default() -> Self {
        Self {
            cap: 200.0,
            per_action: 3.0,
            decay_per_minute: 5.0,
            action_threshold: 100.0,
        }
    }
}

/// Loop bounds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoopConfig {
    pub default_max_iterations: u32,

    /// Global ceiling, independent of any workflow's own policy
    pub max_loop_safety: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            default_max_iterations: 3,
            max_loop_safety: 10,
        }
    }
}

/// Run execution settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunConfig {
    /// Concurrent run slots
    pub worker_pool_size: usize,

    /// Timeout applied to each observe/reason/act call
    pub step_timeout_ms: u64,

    /// Hard deadline for a whole run
    pub run_deadline_ms: u64,

    /// Messages of conversation history shown to a replying agent
    pub conversation_window: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: 8,
            step_timeout_ms: 30_000,
            run_deadline_ms: 120_000,
            conversation_window: 20,
        }
    }
}

impl RunConfig {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    pub fn run_deadline(&self) -> Duration {
        Duration::from_millis(self.run_deadline_ms)
    }
}

/// Reasoning oracle endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OracleConfig {
    /// HTTP endpoint; when unset the engine needs an injected oracle
    pub endpoint: Option<String>,

    pub timeout_ms: u64,

    /// Passed through to the oracle untouched
    pub model: Option<String>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: 20_000,
            model: None,
        }
    }
}

/// Cadence of one scheduled job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSchedule {
    pub cadence_secs: u64,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl JobSchedule {
    pub fn every(cadence_secs: u64) -> Self {
        Self {
            cadence_secs,
            enabled: true,
        }
    }

    pub fn cadence(&self) -> Duration {
        Duration::from_secs(self.cadence_secs)
    }
}

/// Scheduler settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulerConfig {
    /// Job runs kept in history
    pub history_limit: usize,

    pub jobs: BTreeMap<String, JobSchedule>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let mut catalog = BTreeMap::new();
        catalog.insert(jobs::AGENT_CYCLE.to_string(), JobSchedule::every(15 * 60));
        catalog.insert(jobs::RELATIONSHIP_DECAY.to_string(), JobSchedule::every(60 * 60));
        catalog.insert(jobs::MEMORY_CLEANUP.to_string(), JobSchedule::every(6 * 60 * 60));
        catalog.insert(jobs::TOKEN_RESET.to_string(), JobSchedule::every(24 * 60 * 60));

        Self {
            history_limit: 100,
            jobs: catalog,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub heat: HeatConfig,

    #[serde(rename = "loop")]
    pub loop_config: LoopConfig,

    #[serde(rename = "engine")]
    pub run: RunConfig,

    pub oracle: OracleConfig,

    pub scheduler: SchedulerConfig,
}

impl EngineConfig {
    /// Load configuration from a YAML or JSON file, chosen by extension
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            _ => {
                return Err(EngineError::Config(format!(
                    "Unsupported config file '{}': expected .yaml, .yml or .json",
                    path.display()
                )))
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Apply `EMBER_*` environment overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(endpoint) = lookup("EMBER_ORACLE_ENDPOINT") {
            self.oracle.endpoint = Some(endpoint);
        }
        if let Some(size) = lookup("EMBER_WORKER_POOL_SIZE") {
            self.run.worker_pool_size = size.parse().map_err(|_| {
                EngineError::Config(format!("EMBER_WORKER_POOL_SIZE is not a number: '{}'", size))
            })?;
        }
        self.validate()
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        let heat = &self.heat;
        let values = [heat.cap, heat.per_action, heat.decay_per_minute, heat.action_threshold];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(EngineError::Config("heat settings must be finite numbers".to_string()));
        }
        if heat.cap <= 0.0 {
            return Err(EngineError::Config("heat.cap must be positive".to_string()));
        }
        if heat.per_action < 0.0 || heat.decay_per_minute < 0.0 {
            return Err(EngineError::Config(
                "heat.perAction and heat.decayPerMinute must not be negative".to_string(),
            ));
        }
        if heat.action_threshold <= 0.0 || heat.action_threshold > heat.cap {
            return Err(EngineError::Config(
                "heat.actionThreshold must be within (0, heat.cap]".to_string(),
            ));
        }
        if self.loop_config.default_max_iterations == 0 {
            return Err(EngineError::Config(
                "loop.defaultMaxIterations must be at least 1".to_string(),
            ));
        }
        if self.loop_config.max_loop_safety < self.loop_config.default_max_iterations {
            return Err(EngineError::Config(
                "loop.maxLoopSafety must be >= loop.defaultMaxIterations".to_string(),
            ));
        }
        if self.run.worker_pool_size == 0 {
            return Err(EngineError::Config(
                "engine.workerPoolSize must be at least 1".to_string(),
            ));
        }
        if self.run.step_timeout_ms == 0 || self.run.run_deadline_ms == 0 {
            return Err(EngineError::Config(
                "engine.stepTimeoutMs and engine.runDeadlineMs must be positive".to_string(),
            ));
        }
        if self.scheduler.history_limit == 0 {
            return Err(EngineError::Config(
                "scheduler.historyLimit must be at least 1".to_string(),
            ));
        }
        for (name, schedule) in &self.scheduler.jobs {
            if schedule.cadence_secs == 0 {
                return Err(EngineError::Config(format!(
                    "scheduler.jobs.{}.cadenceSecs must be positive",
                    name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // ============== Default Tests ==============

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.heat.action_threshold, 100.0);
        assert_eq!(config.heat.per_action, 3.0);
        assert_eq!(config.scheduler.jobs.len(), 4);
    }

    // ============== File Loading Tests ==============

    #[test]
    fn test_partial_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "heat:\n  cap: 150\n  actionThreshold: 90\nloop:\n  maxLoopSafety: 6\n"
        )
        .unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.heat.cap, 150.0);
        assert_eq!(config.heat.action_threshold, 90.0);
        assert_eq!(config.heat.decay_per_minute, 5.0);
        assert_eq!(config.loop_config.max_loop_safety, 6);
        assert_eq!(config.loop_config.default_max_iterations, 3);
    }

    #[test]
    fn test_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"engine": {{"workerPoolSize": 2}}, "scheduler": {{"jobs": {{"agent_cycle": {{"cadenceSecs": 60}}}}}}}}"#
        )
        .unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.run.worker_pool_size, 2);
        assert_eq!(config.scheduler.jobs.len(), 1);
        assert!(config.scheduler.jobs["agent_cycle"].enabled);
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        let result = EngineConfig::from_file(file.path());
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    // ============== Validation Tests ==============

    #[test]
    fn test_threshold_above_cap_rejected() {
        let mut config = EngineConfig::default();
        config.heat.action_threshold = 500.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_finite_heat_rejected() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "heat:\n  cap: .nan\n").unwrap();
        assert!(matches!(EngineConfig::from_file(file.path()), Err(EngineError::Config(_))));

        let mut config = EngineConfig::default();
        config.heat.action_threshold = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.heat.cap = f64::INFINITY;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_safety_below_max_iterations_rejected() {
        let mut config = EngineConfig::default();
        config.loop_config.default_max_iterations = 5;
        config.loop_config.max_loop_safety = 4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = EngineConfig::default();
        config
            .apply_overrides(|key| match key {
                "EMBER_ORACLE_ENDPOINT" => Some("http://oracle.local/decide".to_string()),
                "EMBER_WORKER_POOL_SIZE" => Some("3".to_string()),
                _ => None,
            })
            .unwrap();

        assert_eq!(config.oracle.endpoint.as_deref(), Some("http://oracle.local/decide"));
        assert_eq!(config.run.worker_pool_size, 3);
    }

    #[test]
    fn test_env_override_bad_number() {
        let mut config = EngineConfig::default();
        let result = config.apply_overrides(|key| {
            (key == "EMBER_WORKER_POOL_SIZE").then(|| "many".to_string())
        });
        assert!(result.is_err());
    }
}
