//! Error types for Ember

use crate::action::ActionKind;
use crate::data::DataCategory;
use thiserror::Error;

/// Failure reported by an external collaborator (data service, oracle, mutator)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("timed out after {0}ms")]
    Timeout(u64),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("cancelled")]
    Cancelled,
}

/// Error thrown when a scope builder cannot assemble the context it needs
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot build scope for '{trigger}' (actor '{actor}'): {reason}")]
pub struct ScopeConstructionError {
    pub trigger: String,
    pub actor: String,
    pub reason: String,
}

/// Error thrown when a workflow touches a data category its scope did not declare
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Scope violation: '{trigger}' accessed undeclared category '{category}' for actor '{actor}'")]
pub struct ScopeViolationError {
    pub category: DataCategory,
    pub trigger: String,
    pub actor: String,
}

/// Error thrown when a decision falls outside the scope's allowed actions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Action '{kind}' is not permitted. Allowed actions: {}", allowed.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", "))]
pub struct ActionNotPermittedError {
    pub kind: String,
    pub allowed: Vec<ActionKind>,
}

/// Error thrown when the loop outruns the global safety ceiling
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Safety stop: iteration {iteration} exceeded the loop ceiling of {ceiling}")]
pub struct SafetyStopError {
    pub iteration: u32,
    pub ceiling: u32,
}

/// Error thrown when no workflow handler is registered for a trigger
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("No workflow registered for trigger '{trigger}'. Registered: {}", registered.join(", "))]
pub struct UnknownTriggerError {
    pub trigger: String,
    pub registered: Vec<String>,
}

/// Error thrown when a job name is not registered with the scheduler
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Job '{job}' not found. Available jobs: {}", available.join(", "))]
pub struct UnknownJobError {
    pub job: String,
    pub available: Vec<String>,
}

/// An error recorded into a single run's state.
///
/// None of these ever leave the run that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    ScopeConstruction(#[from] ScopeConstructionError),

    #[error(transparent)]
    ScopeViolation(#[from] ScopeViolationError),

    #[error(transparent)]
    ActionNotPermitted(#[from] ActionNotPermittedError),

    #[error(transparent)]
    SafetyStop(#[from] SafetyStopError),

    #[error("Invalid decision for '{kind}': {reason}")]
    InvalidDecision { kind: ActionKind, reason: String },

    #[error("Failed to fetch '{category}': {error}")]
    DataFetch {
        category: DataCategory,
        error: ServiceError,
    },

    #[error("Reasoning oracle failed: {0}")]
    Oracle(ServiceError),

    #[error("Action '{kind}' failed: {error}")]
    Mutation { kind: ActionKind, error: ServiceError },
}

impl WorkflowError {
    /// Short machine-readable code used in traces and reports
    pub fn code(&self) -> &'static str {
        match self {
            WorkflowError::ScopeConstruction(_) => "scope_construction",
            WorkflowError::ScopeViolation(_) => "scope_violation",
            WorkflowError::ActionNotPermitted(_) => "action_not_permitted",
            WorkflowError::SafetyStop(_) => "safety_stop",
            WorkflowError::InvalidDecision { .. } => "invalid_decision",
            WorkflowError::DataFetch { .. } => "data_fetch",
            WorkflowError::Oracle(_) => "oracle",
            WorkflowError::Mutation { .. } => "mutation",
        }
    }

    /// Errors that indicate a defect in a workflow definition rather than
    /// a runtime condition
    pub fn is_defect(&self) -> bool {
        matches!(
            self,
            WorkflowError::ScopeViolation(_) | WorkflowError::SafetyStop(_)
        )
    }
}

/// General Ember error type
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    UnknownTrigger(#[from] UnknownTriggerError),

    #[error(transparent)]
    UnknownJob(#[from] UnknownJobError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
