//! Autonomous agent cycle

use super::{heat_context, load_actor, persona_context};
use crate::state::{LoopOutcome, WorkflowState};
use crate::workflow::{LoopSettings, ScopeRequest, WorkflowHandler};
use async_trait::async_trait;
use gateway::DataService;
use scope::WorkflowScope;
use serde_json::json;
use shared::{schedules, ActionKind, DataCategory, EngineConfig, QueryParams, ScopeConstructionError, Trigger};

const FEED_LIMIT: usize = 10;
const MEMORIES_LIMIT: usize = 5;

/// Scheduled free action. Loops while the heat budget lasts.
#[derive(Debug, Clone)]
pub struct AgentCycleWorkflow {
    max_iterations: u32,
    heat_cost: f64,
    heat_threshold: f64,
}

impl AgentCycleWorkflow {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            max_iterations: config.loop_config.default_max_iterations,
            heat_cost: config.heat.per_action,
            heat_threshold: config.heat.action_threshold,
        }
    }
}

#[async_trait]
impl WorkflowHandler for AgentCycleWorkflow {
    fn trigger(&self) -> Trigger {
        Trigger::schedule(schedules::AGENT_CYCLE)
    }

    async fn build_scope(
        &self,
        request: &ScopeRequest<'_>,
        data: &dyn DataService,
    ) -> Result<WorkflowScope, ScopeConstructionError> {
        let profile = load_actor(request, data).await?;
        if !profile.active {
            return Err(request.error("actor is inactive"));
        }

        Ok(
            WorkflowScope::builder(request.trigger.clone(), request.actor.clone())
                .visible(DataCategory::Actor, QueryParams::new())
                .visible(DataCategory::Feed, QueryParams::new().with_limit(FEED_LIMIT))
                .visible(DataCategory::Groups, QueryParams::new())
                .visible(DataCategory::Memories, QueryParams::new().with_limit(MEMORIES_LIMIT))
                .visible(DataCategory::Territory, QueryParams::new())
                .allow([
                    ActionKind::CreatePost,
                    ActionKind::Comment,
                    ActionKind::React,
                    ActionKind::JoinGroup,
                    ActionKind::Travel,
                    ActionKind::ClaimTerritory,
                    ActionKind::Rest,
                ])
                .context("persona", persona_context(&profile))
                .context("heat", heat_context(request))
                .context(
                    "budget",
                    json!({ "perAction": self.heat_cost, "maxIterations": self.max_iterations }),
                )
                .build(),
        )
    }

    fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            max_iterations: self.max_iterations,
            heat_cost_per_iteration: self.heat_cost,
        }
    }

    /// Another round only after a real action that left room for one more
    fn should_continue(&self, state: &WorkflowState) -> bool {
        match state.loop_state.current().map(|r| r.outcome) {
            Some(LoopOutcome::Executed { heat }) => heat + self.heat_cost <= self.heat_threshold,
            _ => false,
        }
    }
}
