//! Workflow catalog

mod agent_cycle;
mod group_invite;
mod message_received;
mod post_created;

pub use agent_cycle::AgentCycleWorkflow;
pub use group_invite::GroupInviteWorkflow;
pub use message_received::MessageReceivedWorkflow;
pub use post_created::PostCreatedWorkflow;

use crate::workflow::{ScopeRequest, WorkflowHandler};
use gateway::{ActorProfile, DataService};
use serde_json::{json, Value};
use shared::{DataCategory, EngineConfig, QueryParams, ScopeConstructionError};
use std::sync::Arc;

/// Every workflow the engine ships with
pub fn default_workflows(config: &EngineConfig) -> Vec<Arc<dyn WorkflowHandler>> {
    vec![
        Arc::new(MessageReceivedWorkflow::new(config)),
        Arc::new(PostCreatedWorkflow::new(config)),
        Arc::new(GroupInviteWorkflow::new(config)),
        Arc::new(AgentCycleWorkflow::new(config)),
    ]
}

async fn load_actor(
    request: &ScopeRequest<'_>,
    data: &dyn DataService,
) -> Result<ActorProfile, ScopeConstructionError> {
    match data.find_actor(request.actor).await {
        Ok(Some(profile)) => Ok(profile),
        Ok(None) => Err(request.error("actor not found")),
        Err(e) => Err(request.error(format!("actor lookup failed: {}", e))),
    }
}

async fn load_subject(
    request: &ScopeRequest<'_>,
    data: &dyn DataService,
    category: DataCategory,
) -> Result<Value, ScopeConstructionError> {
    let subject = request
        .subject
        .ok_or_else(|| request.error(format!("a subject {} is required", category)))?;
    data.fetch(request.actor, category, &QueryParams::new(), Some(subject))
        .await
        .map_err(|e| request.error(format!("cannot load {} '{}': {}", category, subject, e)))
}

/// Actor id field of a loaded row
fn actor_field(
    request: &ScopeRequest<'_>,
    row: &Value,
    field: &str,
) -> Result<String, ScopeConstructionError> {
    row.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| request.error(format!("subject has no '{}'", field)))
}

fn persona_context(profile: &ActorProfile) -> Value {
    json!({
        "id": profile.id,
        "name": profile.name,
        "persona": profile.persona,
        "location": profile.location,
    })
}

fn heat_context(request: &ScopeRequest<'_>) -> Value {
    json!({
        "currentHeat": request.heat.current_heat,
        "threshold": request.heat.threshold,
        "eligible": request.heat.allowed,
    })
}

fn counterpart(id: &str) -> QueryParams {
    QueryParams::new().with_filter("counterpart", id)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::workflow::ScopeRequest;
    use audit::HeatCheck;
    use shared::{ActorId, EntityId, Trigger};

    pub fn cold() -> HeatCheck {
        HeatCheck {
            allowed: true,
            current_heat: 12.0,
            threshold: 100.0,
        }
    }

    pub fn request<'a>(
        trigger: &'a Trigger,
        actor: &'a ActorId,
        subject: Option<&'a EntityId>,
    ) -> ScopeRequest<'a> {
        ScopeRequest {
            trigger,
            actor,
            subject,
            heat: cold(),
        }
    }
}
