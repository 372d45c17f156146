//! Data Service - Read side of the persistence service
//!
//! Every read the engine performs goes through this port, one data
//! category at a time, bounded by the query parameters the run's scope
//! declared for that category.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::{ActorId, DataCategory, EntityId, QueryParams, ServiceError};

/// Identity of an agent as the persistence service knows it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorProfile {
    pub id: ActorId,
    pub name: String,

    #[serde(default)]
    pub persona: String,

    #[serde(default)]
    pub location: Option<String>,

    /// Inactive actors are skipped by scheduled jobs
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Data Service Trait
///
/// This is a PORT in hexagonal architecture.
#[async_trait]
pub trait DataService: Send + Sync {
    /// Fetch the slice of one category visible to `actor`.
    ///
    /// `subject` is the entity the trigger is about, if any. Per-category
    /// arguments (such as the counterpart of a relationship) travel in
    /// `params.filter`.
    async fn fetch(
        &self,
        actor: &ActorId,
        category: DataCategory,
        params: &QueryParams,
        subject: Option<&EntityId>,
    ) -> Result<serde_json::Value, ServiceError>;

    /// Look up one actor
    async fn find_actor(&self, actor: &ActorId) -> Result<Option<ActorProfile>, ServiceError>;

    /// List every known actor
    async fn list_actors(&self) -> Result<Vec<ActorProfile>, ServiceError>;

    /// Weaken the actor's relationships by one decay step, returning how many changed
    async fn decay_relationships(&self, actor: &ActorId) -> Result<usize, ServiceError>;

    /// Drop the actor's least important memories, returning how many were removed
    async fn prune_memories(&self, actor: &ActorId) -> Result<usize, ServiceError>;
}
