//! Mutator - Write side of the persistence service

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::{Action, ActorId, EntityId, ServiceError};

/// What a mutation produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationOutcome {
    /// Entity created or touched by the action, if any
    pub entity_id: Option<EntityId>,
    pub summary: String,
}

impl MutationOutcome {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            entity_id: None,
            summary: summary.into(),
        }
    }

    /// Builder: set the affected entity
    pub fn with_entity(mut self, entity_id: impl Into<EntityId>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }
}

/// Mutator Trait
///
/// This is a PORT in hexagonal architecture. One call per executed action.
#[async_trait]
pub trait Mutator: Send + Sync {
    async fn execute(&self, actor: &ActorId, action: &Action) -> Result<MutationOutcome, ServiceError>;
}
