//! Response to a group invitation

use super::{actor_field, counterpart, heat_context, load_actor, load_subject, persona_context};
use crate::workflow::{LoopSettings, ScopeRequest, WorkflowHandler};
use async_trait::async_trait;
use gateway::DataService;
use scope::WorkflowScope;
use serde_json::json;
use shared::{events, ActionKind, DataCategory, EngineConfig, QueryParams, ScopeConstructionError, Trigger};

#[derive(Debug, Clone)]
pub struct GroupInviteWorkflow {
    heat_cost: f64,
}

impl GroupInviteWorkflow {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            heat_cost: config.heat.per_action,
        }
    }
}

#[async_trait]
impl WorkflowHandler for GroupInviteWorkflow {
    fn trigger(&self) -> Trigger {
        Trigger::event(events::GROUP_INVITE)
    }

    async fn build_scope(
        &self,
        request: &ScopeRequest<'_>,
        data: &dyn DataService,
    ) -> Result<WorkflowScope, ScopeConstructionError> {
        let profile = load_actor(request, data).await?;
        let group = load_subject(request, data, DataCategory::Group).await?;
        let inviter = actor_field(request, &group, "invitedBy")
            .map_err(|_| request.error("no pending invite for this group"))?;

        let mut builder = WorkflowScope::builder(request.trigger.clone(), request.actor.clone())
            .visible(DataCategory::Actor, QueryParams::new())
            .visible(DataCategory::Group, QueryParams::new())
            .visible(DataCategory::Relationship, counterpart(&inviter))
            .allow([ActionKind::JoinGroup, ActionKind::Ignore])
            .context("persona", persona_context(&profile))
            .context("heat", heat_context(request))
            .context(
                "invite",
                json!({ "inviteId": request.subject, "groupId": group["id"], "invitedBy": inviter }),
            );
        if let Some(subject) = request.subject {
            builder = builder.subject(subject.clone());
        }

        Ok(builder.build())
    }

    fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            max_iterations: 1,
            heat_cost_per_iteration: self.heat_cost,
        }
    }
}
