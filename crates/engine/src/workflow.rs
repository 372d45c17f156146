//! WorkflowHandler - one kind of workflow: its scope and its loop policy

use crate::state::WorkflowState;
use async_trait::async_trait;
use audit::HeatCheck;
use gateway::DataService;
use scope::WorkflowScope;
use shared::{ActorId, DataCategory, EntityId, ScopeConstructionError, Trigger};

/// Inputs to a scope builder
#[derive(Debug, Clone, Copy)]
pub struct ScopeRequest<'a> {
    pub trigger: &'a Trigger,
    pub actor: &'a ActorId,
    pub subject: Option<&'a EntityId>,

    /// Heat read just before the scope was built
    pub heat: HeatCheck,
}

impl ScopeRequest<'_> {
    /// Construction error for this request
    pub fn error(&self, reason: impl Into<String>) -> ScopeConstructionError {
        ScopeConstructionError {
            trigger: self.trigger.to_string(),
            actor: self.actor.to_string(),
            reason: reason.into(),
        }
    }
}

/// Loop bounds for a workflow kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopSettings {
    pub max_iterations: u32,
    pub heat_cost_per_iteration: f64,
}

/// A workflow kind.
///
/// Handlers are registered in the [`TriggerRouter`](crate::TriggerRouter)
/// under the trigger they answer to.
#[async_trait]
pub trait WorkflowHandler: Send + Sync {
    /// Trigger this handler answers to
    fn trigger(&self) -> Trigger;

    /// Load the context this workflow needs and declare what it may see and do
    async fn build_scope(
        &self,
        request: &ScopeRequest<'_>,
        data: &dyn DataService,
    ) -> Result<WorkflowScope, ScopeConstructionError>;

    fn loop_settings(&self) -> LoopSettings;

    /// Categories Observe fetches each iteration, in order
    fn observations(&self, scope: &WorkflowScope) -> Vec<DataCategory> {
        scope.data_scope().visible().map(|(category, _)| category).collect()
    }

    /// Whether another iteration should run. Must not block.
    fn should_continue(&self, _state: &WorkflowState) -> bool {
        false
    }
}
