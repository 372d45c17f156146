//! Reaction to a new post

use super::{actor_field, counterpart, heat_context, load_actor, load_subject, persona_context};
use crate::workflow::{LoopSettings, ScopeRequest, WorkflowHandler};
use async_trait::async_trait;
use gateway::DataService;
use scope::WorkflowScope;
use serde_json::json;
use shared::{events, ActionKind, DataCategory, EngineConfig, QueryParams, ScopeConstructionError, Trigger};

const COMMENTS_LIMIT: usize = 10;

/// Decides whether to comment on or react to someone else's post.
/// Private messages stay out of view.
#[derive(Debug, Clone)]
pub struct PostCreatedWorkflow {
    heat_cost: f64,
}

impl PostCreatedWorkflow {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            heat_cost: config.heat.per_action,
        }
    }
}

#[async_trait]
impl WorkflowHandler for PostCreatedWorkflow {
    fn trigger(&self) -> Trigger {
        Trigger::event(events::POST_CREATED)
    }

    async fn build_scope(
        &self,
        request: &ScopeRequest<'_>,
        data: &dyn DataService,
    ) -> Result<WorkflowScope, ScopeConstructionError> {
        let profile = load_actor(request, data).await?;
        let post = load_subject(request, data, DataCategory::Post).await?;
        let author = actor_field(request, &post, "author")?;
        if author == request.actor.as_str() {
            return Err(request.error("actor authored the post"));
        }

        let mut builder = WorkflowScope::builder(request.trigger.clone(), request.actor.clone())
            .visible(DataCategory::Actor, QueryParams::new())
            .visible(DataCategory::Post, QueryParams::new())
            .visible(DataCategory::Author, counterpart(&author))
            .visible(DataCategory::Comments, QueryParams::new().with_limit(COMMENTS_LIMIT))
            .visible(DataCategory::Relationship, counterpart(&author))
            .allow([ActionKind::Comment, ActionKind::React, ActionKind::Ignore])
            .context("persona", persona_context(&profile))
            .context("heat", heat_context(request))
            .context("post", json!({ "postId": request.subject, "author": author }));
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

    #[tokio::test]
    async fn test_messages_absent_from_post_scope() {
        let world = InMemoryWorld::demo().unwrap();
        let workflow = PostCreatedWorkflow::new(&EngineConfig::default());
        let trigger = workflow.trigger();
        let actor = ActorId::new("npc-mira");
        let subject = EntityId::new("post-1");

        let scope = workflow
            .build_scope(&request(&trigger, &actor, Some(&subject)), &world)
            .await
            .unwrap();

        let data = scope.data_scope();
        assert!(!data.is_visible(DataCategory::Message));
        assert!(!data.is_visible(DataCategory::ConversationHistory));
        assert_eq!(data.get(DataCategory::Comments).unwrap().limit, Some(10));
        assert!(scope.permits(ActionKind::React));
        assert!(!scope.permits(ActionKind::Reply));
    }

    #[tokio::test]
    async fn test_own_post_is_rejected() {
        let world = InMemoryWorld::demo().unwrap();
        let workflow = PostCreatedWorkflow::new(&EngineConfig::default());
        let trigger = workflow.trigger();
        let actor = ActorId::new("npc-ash");
        let subject = EntityId::new("post-1");

        let err = workflow
            .build_scope(&request(&trigger, &actor, Some(&subject)), &world)
            .await
            .unwrap_err();
        assert_eq!(err.reason, "actor authored the post");
    }
}
