//! Direct message reply

use super::{actor_field, counterpart, heat_context, load_actor, load_subject, persona_context};
use crate::workflow::{LoopSettings, ScopeRequest, WorkflowHandler};
use async_trait::async_trait;
use gateway::DataService;
use scope::WorkflowScope;
use serde_json::json;
use shared::{events, ActionKind, DataCategory, EngineConfig, QueryParams, ScopeConstructionError, Trigger};

/// Replies to one incoming message. Sees the message, its sender, the
/// recent conversation and the relationship; nothing else.
#[derive(Debug, Clone)]
pub struct MessageReceivedWorkflow {
    conversation_window: usize,
    heat_cost: f64,
}

impl MessageReceivedWorkflow {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            conversation_window: config.run.conversation_window,
            heat_cost: config.heat.per_action,
        }
    }
}

#[async_trait]
impl WorkflowHandler for MessageReceivedWorkflow {
    fn trigger(&self) -> Trigger {
        Trigger::event(events::MESSAGE_RECEIVED)
    }

    async fn build_scope(
        &self,
        request: &ScopeRequest<'_>,
        data: &dyn DataService,
    ) -> Result<WorkflowScope, ScopeConstructionError> {
        let profile = load_actor(request, data).await?;
        let message = load_subject(request, data, DataCategory::Message).await?;
        let sender = actor_field(request, &message, "from")?;

        let mut builder = WorkflowScope::builder(request.trigger.clone(), request.actor.clone())
            .visible(DataCategory::Actor, QueryParams::new())
            .visible(DataCategory::Message, QueryParams::new())
            .visible(DataCategory::Sender, counterpart(&sender))
            .visible(
                DataCategory::ConversationHistory,
                counterpart(&sender).with_limit(self.conversation_window),
            )
            .visible(DataCategory::Relationship, counterpart(&sender))
            .allow([ActionKind::Reply, ActionKind::Ignore])
            .context("persona", persona_context(&profile))
            .context("heat", heat_context(request))
            .context("replyTo", json!({ "messageId": request.subject, "sender": sender }));
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::test_support::request;
    use gateway::InMemoryWorld;
    use shared::{ActorId, EntityId};

    fn workflow() -> MessageReceivedWorkflow {
        MessageReceivedWorkflow::new(&EngineConfig::default())
    }

    #[tokio::test]
    async fn test_scope_declares_conversation_only() {
        let world = InMemoryWorld::demo().unwrap();
        let trigger = workflow().trigger();
        let actor = ActorId::new("npc-mira");
        let subject = EntityId::new("msg-1");

        let scope = workflow()
            .build_scope(&request(&trigger, &actor, Some(&subject)), &world)
            .await
            .unwrap();

        let data = scope.data_scope();
        assert_eq!(data.visible().count(), 5);
        assert_eq!(data.get(DataCategory::ConversationHistory).unwrap().limit, Some(20));
        assert_eq!(data.get(DataCategory::Relationship).unwrap().filter["counterpart"], "npc-tobin");
        assert!(!data.is_visible(DataCategory::SocialGraph));
        assert!(!data.is_visible(DataCategory::Feed));

        let allowed: Vec<_> = scope.allowed_actions().iter().copied().collect();
        assert_eq!(allowed, vec![ActionKind::Reply, ActionKind::Ignore]);
        assert_eq!(scope.context_data()["persona"]["name"], "Mira");
        assert_eq!(scope.context_data()["heat"]["eligible"], true);
    }

    #[tokio::test]
    async fn test_missing_actor_fails_construction() {
        let world = InMemoryWorld::demo().unwrap();
        let trigger = workflow().trigger();
        let actor = ActorId::new("ghost");
        let subject = EntityId::new("msg-1");

        let err = workflow()
            .build_scope(&request(&trigger, &actor, Some(&subject)), &world)
            .await
            .unwrap_err();
        assert_eq!(err.reason, "actor not found");
    }

    #[tokio::test]
    async fn test_missing_subject_fails_construction() {
        let world = InMemoryWorld::demo().unwrap();
        let trigger = workflow().trigger();
        let actor = ActorId::new("npc-mira");

        let result = workflow().build_scope(&request(&trigger, &actor, None), &world).await;
        assert!(result.is_err());
    }
}
