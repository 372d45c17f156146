//! In-Memory World
//!
//! A small, self-contained stand-in for the persistence service. It answers
//! category reads and applies mutations against plain records seeded from a
//! YAML fixture. Useful for testing and local runs.

use crate::data_service::{ActorProfile, DataService};
use crate::mutator::{MutationOutcome, Mutator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared::{
    Action, ActionParams, ActorId, DataCategory, EntityId, QueryParams, ServiceError,
};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

const DEMO_WORLD: &str = include_str!("../fixtures/demo_world.yaml");

/// Affinity moved toward zero by one decay step
const RELATIONSHIP_DECAY_STEP: f64 = 1.0;

/// Memories kept per actor by default when pruning
const DEFAULT_MEMORY_RETENTION: usize = 20;

/// Entries kept in each inspection log
const DEFAULT_LOG_LIMIT: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: EntityId,
    pub from: ActorId,
    pub to: ActorId,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    pub id: EntityId,
    pub author: ActorId,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRecord {
    pub id: EntityId,
    pub post: EntityId,
    pub author: ActorId,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionRecord {
    pub post: EntityId,
    pub actor: ActorId,
    pub reaction: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRecord {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub members: Vec<ActorId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteRecord {
    pub id: EntityId,
    pub group: EntityId,
    pub from: ActorId,
    pub to: ActorId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipRecord {
    pub a: ActorId,
    pub b: ActorId,
    pub affinity: f64,
}

impl RelationshipRecord {
    fn involves(&self, actor: &ActorId) -> bool {
        &self.a == actor || &self.b == actor
    }

    fn other(&self, actor: &ActorId) -> &ActorId {
        if &self.a == actor {
            &self.b
        } else {
            &self.a
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRecord {
    pub actor: ActorId,
    pub content: String,
    #[serde(default)]
    pub importance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerritoryRecord {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub owner: Option<ActorId>,
}

/// Everything the world holds. Also the YAML fixture format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorldSeed {
    pub actors: Vec<ActorProfile>,
    pub messages: Vec<MessageRecord>,
    pub posts: Vec<PostRecord>,
    pub comments: Vec<CommentRecord>,
    pub reactions: Vec<ReactionRecord>,
    pub groups: Vec<GroupRecord>,
    pub invites: Vec<InviteRecord>,
    pub relationships: Vec<RelationshipRecord>,
    pub memories: Vec<MemoryRecord>,
    pub territories: Vec<TerritoryRecord>,
}

impl WorldSeed {
    pub fn from_yaml(content: &str) -> shared::Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    fn actor(&self, id: &ActorId) -> Option<&ActorProfile> {
        self.actors.iter().find(|a| &a.id == id)
    }

    fn message(&self, id: &EntityId) -> Option<&MessageRecord> {
        self.messages.iter().find(|m| &m.id == id)
    }

    fn post(&self, id: &EntityId) -> Option<&PostRecord> {
        self.posts.iter().find(|p| &p.id == id)
    }

    fn group_mut(&mut self, id: &EntityId) -> Option<&mut GroupRecord> {
        self.groups.iter_mut().find(|g| &g.id == id)
    }

    fn invite(&self, id: &EntityId) -> Option<&InviteRecord> {
        self.invites.iter().find(|i| &i.id == id)
    }

    fn has_entity(&self, id: &EntityId) -> bool {
        self.messages.iter().any(|m| &m.id == id)
            || self.posts.iter().any(|p| &p.id == id)
            || self.comments.iter().any(|c| &c.id == id)
    }
}

#[derive(Debug, Default)]
struct WorldState {
    world: WorldSeed,
    next_id: u64,
    fetch_log: VecDeque<(ActorId, DataCategory)>,
    mutation_log: VecDeque<(ActorId, Action)>,
    log_limit: usize,
    failing_fetches: HashMap<DataCategory, ServiceError>,
    failing_mutations: Option<ServiceError>,
}

impl WorldState {
    fn record_fetch(&mut self, actor: &ActorId, category: DataCategory) {
        push_bounded(&mut self.fetch_log, (actor.clone(), category), self.log_limit);
    }

    fn record_mutation(&mut self, actor: &ActorId, action: &Action) {
        push_bounded(&mut self.mutation_log, (actor.clone(), action.clone()), self.log_limit);
    }

    /// Next unused id with the given prefix
    fn allocate(&mut self, prefix: &str) -> EntityId {
        loop {
            self.next_id += 1;
            let id = EntityId::new(format!("{}-{}", prefix, self.next_id));
            if !self.world.has_entity(&id) {
                return id;
            }
        }
    }
}

/// In-memory data service and mutator
///
/// Thread-safe implementation using RwLock. Clones share the same world.
#[derive(Debug, Clone)]
pub struct InMemoryWorld {
    state: Arc<RwLock<WorldState>>,
    memory_retention: usize,
}

impl Default for InMemoryWorld {
    fn default() -> Self {
        Self::from_seed(WorldSeed::default())
    }
}

impl InMemoryWorld {
    pub fn from_seed(world: WorldSeed) -> Self {
        Self {
            state: Arc::new(RwLock::new(WorldState {
                world,
                log_limit: DEFAULT_LOG_LIMIT,
                ..WorldState::default()
            })),
            memory_retention: DEFAULT_MEMORY_RETENTION,
        }
    }

    /// Load a world from a YAML fixture file
    pub fn from_yaml_file(path: &Path) -> shared::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_seed(WorldSeed::from_yaml(&content)?))
    }

    /// The built-in demo world
    pub fn demo() -> shared::Result<Self> {
        Ok(Self::from_seed(WorldSeed::from_yaml(DEMO_WORLD)?))
    }

    /// Builder: memories kept per actor when pruning
    pub fn with_memory_retention(mut self, retention: usize) -> Self {
        self.memory_retention = retention;
        self
    }

    /// Builder: entries kept in each inspection log, oldest dropped first
    pub fn with_log_limit(self, limit: usize) -> Self {
        if let Ok(mut state) = self.write() {
            state.log_limit = limit;
            while state.fetch_log.len() > limit {
                state.fetch_log.pop_front();
            }
            while state.mutation_log.len() > limit {
                state.mutation_log.pop_front();
            }
        }
        self
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, WorldState>, ServiceError> {
        self.state
            .read()
            .map_err(|_| ServiceError::Transient("Failed to acquire read lock".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, WorldState>, ServiceError> {
        self.state
            .write()
            .map_err(|_| ServiceError::Transient("Failed to acquire write lock".to_string()))
    }

    // ========== Fault injection ==========

    /// Make every fetch of `category` fail with `error`
    pub fn fail_fetch(&self, category: DataCategory, error: ServiceError) {
        if let Ok(mut state) = self.write() {
            state.failing_fetches.insert(category, error);
        }
    }

    /// Make every mutation fail with `error`
    pub fn fail_mutations(&self, error: ServiceError) {
        if let Ok(mut state) = self.write() {
            state.failing_mutations = Some(error);
        }
    }

    pub fn clear_faults(&self) {
        if let Ok(mut state) = self.write() {
            state.failing_fetches.clear();
            state.failing_mutations = None;
        }
    }

    // ========== Inspection ==========

    /// Most recent fetches served, oldest first
    pub fn fetches(&self) -> Vec<(ActorId, DataCategory)> {
        self.read().map(|s| s.fetch_log.iter().cloned().collect()).unwrap_or_default()
    }

    /// Most recent mutations applied, oldest first
    pub fn mutations(&self) -> Vec<(ActorId, Action)> {
        self.read().map(|s| s.mutation_log.iter().cloned().collect()).unwrap_or_default()
    }

    /// Copy of the current world
    pub fn snapshot(&self) -> WorldSeed {
        self.read().map(|s| s.world.clone()).unwrap_or_default()
    }
}

fn push_bounded<T>(log: &mut VecDeque<T>, entry: T, limit: usize) {
    if limit == 0 {
        return;
    }
    while log.len() >= limit {
        log.pop_front();
    }
    log.push_back(entry);
}

fn limited<T>(items: impl Iterator<Item = T>, limit: Option<usize>) -> Vec<T> {
    items.take(limit.unwrap_or(usize::MAX)).collect()
}

/// Keep the last `limit` items of an ordered list
fn tail<T>(items: Vec<T>, limit: Option<usize>) -> Vec<T> {
    let skip = limit.map(|l| items.len().saturating_sub(l)).unwrap_or(0);
    items.into_iter().skip(skip).collect()
}

fn require_subject<'s>(
    subject: Option<&'s EntityId>,
    category: DataCategory,
) -> Result<&'s EntityId, ServiceError> {
    subject.ok_or_else(|| ServiceError::Malformed(format!("'{}' needs a subject", category)))
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, ServiceError> {
    serde_json::to_value(value).map_err(|e| ServiceError::Malformed(e.to_string()))
}

fn read_category(
    world: &WorldSeed,
    actor: &ActorId,
    category: DataCategory,
    params: &QueryParams,
    subject: Option<&EntityId>,
) -> Result<Value, ServiceError> {
    let limit = params.limit;
    let counterpart = params.filter.get("counterpart").map(|c| ActorId::new(c.as_str()));

    let find_message = || -> Result<&MessageRecord, ServiceError> {
        let id = require_subject(subject, category)?;
        world
            .message(id)
            .filter(|m| &m.to == actor)
            .ok_or_else(|| ServiceError::NotFound(format!("message '{}'", id)))
    };
    let find_post = || -> Result<&PostRecord, ServiceError> {
        let id = require_subject(subject, category)?;
        world
            .post(id)
            .ok_or_else(|| ServiceError::NotFound(format!("post '{}'", id)))
    };
    let profile = |id: &ActorId| -> Result<Value, ServiceError> {
        world
            .actor(id)
            .ok_or_else(|| ServiceError::NotFound(format!("actor '{}'", id)))
            .and_then(to_json)
    };

    match category {
        DataCategory::Actor => profile(actor),
        DataCategory::Message => to_json(find_message()?),
        DataCategory::Sender => match counterpart {
            Some(id) => profile(&id),
            None => profile(&find_message()?.from),
        },
        DataCategory::ConversationHistory => {
            let other = match counterpart {
                Some(id) => id,
                None => find_message()?.from.clone(),
            };
            let history: Vec<&MessageRecord> = world
                .messages
                .iter()
                .filter(|m| {
                    (&m.from == actor && m.to == other) || (m.from == other && &m.to == actor)
                })
                .collect();
            to_json(&tail(history, limit))
        }
        DataCategory::Relationship => {
            let other = counterpart.ok_or_else(|| {
                ServiceError::Malformed("'relationship' needs a counterpart filter".to_string())
            })?;
            let affinity = world
                .relationships
                .iter()
                .find(|r| r.involves(actor) && r.involves(&other))
                .map(|r| r.affinity)
                .unwrap_or(0.0);
            Ok(json!({ "counterpart": other, "affinity": affinity }))
        }
        DataCategory::Post => to_json(find_post()?),
        DataCategory::Author => profile(&find_post()?.author),
        DataCategory::Comments => {
            let post = find_post()?;
            let comments: Vec<&CommentRecord> =
                world.comments.iter().filter(|c| c.post == post.id).collect();
            to_json(&tail(comments, limit))
        }
        DataCategory::Group => {
            let id = require_subject(subject, category)?;
            let (group_id, invited_by) = match world.invite(id) {
                Some(invite) => (&invite.group, Some(&invite.from)),
                None => (id, None),
            };
            let group = world
                .groups
                .iter()
                .find(|g| &g.id == group_id)
                .ok_or_else(|| ServiceError::NotFound(format!("group '{}'", group_id)))?;
            let mut value = to_json(group)?;
            value["invitedBy"] = to_json(&invited_by)?;
            Ok(value)
        }
        DataCategory::Groups => {
            let groups = world.groups.iter().map(|g| {
                json!({
                    "id": g.id,
                    "name": g.name,
                    "memberCount": g.members.len(),
                    "member": g.members.contains(actor),
                })
            });
            Ok(Value::Array(limited(groups, limit)))
        }
        DataCategory::Feed => {
            let feed = world.posts.iter().rev().filter(|p| &p.author != actor);
            to_json(&limited(feed, limit))
        }
        DataCategory::Memories => {
            let mut memories: Vec<&MemoryRecord> =
                world.memories.iter().filter(|m| &m.actor == actor).collect();
            memories.sort_by(|a, b| b.importance.total_cmp(&a.importance));
            to_json(&limited(memories.into_iter(), limit))
        }
        DataCategory::Territory => to_json(&limited(world.territories.iter(), limit)),
        DataCategory::SocialGraph => {
            let edges = world.relationships.iter().filter(|r| r.involves(actor)).map(|r| {
                json!({ "counterpart": r.other(actor), "affinity": r.affinity })
            });
            Ok(Value::Array(limited(edges, limit)))
        }
        DataCategory::Notifications => {
            let invites = world.invites.iter().filter(|i| &i.to == actor);
            to_json(&limited(invites, limit))
        }
    }
}

fn apply_action(
    state: &mut WorldState,
    actor: &ActorId,
    action: &Action,
) -> Result<MutationOutcome, ServiceError> {
    if state.world.actor(actor).is_none() {
        return Err(ServiceError::NotFound(format!("actor '{}'", actor)));
    }
    let target = || {
        action
            .target_id
            .clone()
            .ok_or_else(|| ServiceError::Malformed(format!("{} requires a target", action.kind())))
    };

    match &action.params {
        ActionParams::Ignore => Ok(MutationOutcome::new("ignored")),
        ActionParams::Rest => Ok(MutationOutcome::new("rested")),
        ActionParams::Reply(params) => {
            let target = target()?;
            let original = state
                .world
                .message(&target)
                .filter(|m| &m.to == actor)
                .ok_or_else(|| ServiceError::NotFound(format!("message '{}'", target)))?;
            let to = original.from.clone();
            let id = state.allocate("msg");
            state.world.messages.push(MessageRecord {
                id: id.clone(),
                from: actor.clone(),
                to: to.clone(),
                content: params.content.clone(),
            });
            Ok(MutationOutcome::new(format!("replied to {}", to)).with_entity(id))
        }
        ActionParams::SendMessage(params) => {
            let to = ActorId::new(target()?.as_str());
            if state.world.actor(&to).is_none() {
                return Err(ServiceError::NotFound(format!("actor '{}'", to)));
            }
            let id = state.allocate("msg");
            state.world.messages.push(MessageRecord {
                id: id.clone(),
                from: actor.clone(),
                to: to.clone(),
                content: params.content.clone(),
            });
            Ok(MutationOutcome::new(format!("messaged {}", to)).with_entity(id))
        }
        ActionParams::Comment(params) => {
            let post = target()?;
            if state.world.post(&post).is_none() {
                return Err(ServiceError::NotFound(format!("post '{}'", post)));
            }
            let id = state.allocate("comment");
            state.world.comments.push(CommentRecord {
                id: id.clone(),
                post: post.clone(),
                author: actor.clone(),
                content: params.content.clone(),
            });
            Ok(MutationOutcome::new(format!("commented on {}", post)).with_entity(id))
        }
        ActionParams::React(params) => {
            let post = target()?;
            if state.world.post(&post).is_none() {
                return Err(ServiceError::NotFound(format!("post '{}'", post)));
            }
            state.world.reactions.push(ReactionRecord {
                post: post.clone(),
                actor: actor.clone(),
                reaction: params.reaction.clone(),
            });
            Ok(MutationOutcome::new(format!("reacted '{}' to {}", params.reaction, post))
                .with_entity(post))
        }
        ActionParams::CreatePost(params) => {
            let id = state.allocate("post");
            state.world.posts.push(PostRecord {
                id: id.clone(),
                author: actor.clone(),
                content: params.content.clone(),
                tags: params.tags.clone(),
            });
            Ok(MutationOutcome::new("posted").with_entity(id))
        }
        ActionParams::JoinGroup => {
            let target = target()?;
            let group_id = match state.world.invite(&target) {
                Some(invite) => invite.group.clone(),
                None => target.clone(),
            };
            let group = state
                .world
                .group_mut(&group_id)
                .ok_or_else(|| ServiceError::NotFound(format!("group '{}'", group_id)))?;
            if group.members.contains(actor) {
                return Err(ServiceError::Conflict(format!("already a member of '{}'", group_id)));
            }
            group.members.push(actor.clone());
            state
                .world
                .invites
                .retain(|i| !(i.group == group_id && &i.to == actor));
            Ok(MutationOutcome::new(format!("joined {}", group_id)).with_entity(group_id))
        }
        ActionParams::LeaveGroup => {
            let group_id = target()?;
            let group = state
                .world
                .group_mut(&group_id)
                .ok_or_else(|| ServiceError::NotFound(format!("group '{}'", group_id)))?;
            let before = group.members.len();
            group.members.retain(|m| m != actor);
            if group.members.len() == before {
                return Err(ServiceError::Conflict(format!("not a member of '{}'", group_id)));
            }
            Ok(MutationOutcome::new(format!("left {}", group_id)).with_entity(group_id))
        }
        ActionParams::Travel(params) => {
            if let Some(profile) = state.world.actors.iter_mut().find(|a| &a.id == actor) {
                profile.location = Some(params.destination.clone());
            }
            Ok(MutationOutcome::new(format!("travelled to {}", params.destination)))
        }
        ActionParams::ClaimTerritory => {
            let territory_id = target()?;
            let territory = state
                .world
                .territories
                .iter_mut()
                .find(|t| t.id == territory_id)
                .ok_or_else(|| ServiceError::NotFound(format!("territory '{}'", territory_id)))?;
            if let Some(owner) = &territory.owner {
                return Err(ServiceError::Conflict(format!(
                    "territory '{}' is held by {}",
                    territory_id, owner
                )));
            }
            territory.owner = Some(actor.clone());
            Ok(MutationOutcome::new(format!("claimed {}", territory_id)).with_entity(territory_id))
        }
    }
}

#[async_trait]
impl DataService for InMemoryWorld {
    async fn fetch(
        &self,
        actor: &ActorId,
        category: DataCategory,
        params: &QueryParams,
        subject: Option<&EntityId>,
    ) -> Result<Value, ServiceError> {
        let mut state = self.write()?;
        state.record_fetch(actor, category);
        if let Some(err) = state.failing_fetches.get(&category) {
            return Err(err.clone());
        }
        read_category(&state.world, actor, category, params, subject)
    }

    async fn find_actor(&self, actor: &ActorId) -> Result<Option<ActorProfile>, ServiceError> {
        Ok(self.read()?.world.actor(actor).cloned())
    }

    async fn list_actors(&self) -> Result<Vec<ActorProfile>, ServiceError> {
        Ok(self.read()?.world.actors.clone())
    }

    async fn decay_relationships(&self, actor: &ActorId) -> Result<usize, ServiceError> {
        let mut state = self.write()?;
        let mut changed = 0;
        for relationship in state.world.relationships.iter_mut().filter(|r| r.involves(actor)) {
            let affinity = relationship.affinity;
            if affinity == 0.0 {
                continue;
            }
            relationship.affinity = if affinity > 0.0 {
                (affinity - RELATIONSHIP_DECAY_STEP).max(0.0)
            } else {
                (affinity + RELATIONSHIP_DECAY_STEP).min(0.0)
            };
            changed += 1;
        }
        Ok(changed)
    }

    async fn prune_memories(&self, actor: &ActorId) -> Result<usize, ServiceError> {
        let mut state = self.write()?;
        let (mut own, rest): (Vec<MemoryRecord>, Vec<MemoryRecord>) = state
            .world
            .memories
            .drain(..)
            .partition(|m| &m.actor == actor);

        own.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        let removed = own.len().saturating_sub(self.memory_retention);
        own.truncate(self.memory_retention);

        state.world.memories = rest;
        state.world.memories.extend(own);
        Ok(removed)
    }
}

#[async_trait]
impl Mutator for InMemoryWorld {
    async fn execute(&self, actor: &ActorId, action: &Action) -> Result<MutationOutcome, ServiceError> {
        let mut state = self.write()?;
        if let Some(err) = &state.failing_mutations {
            return Err(err.clone());
        }
        let outcome = apply_action(&mut state, actor, action)?;
        state.record_mutation(actor, action);
        tracing::debug!(actor = %actor, kind = %action.kind(), summary = %outcome.summary, "Applied mutation");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{ContentParams, TravelParams};
    use std::io::Write;

    fn world() -> InMemoryWorld {
        InMemoryWorld::demo().unwrap()
    }

    fn mira() -> ActorId {
        ActorId::new("npc-mira")
    }

    // ============== Loading Tests ==============

    #[test]
    fn test_demo_world_loads() {
        let seed = world().snapshot();
        assert!(seed.actors.len() >= 3);
        assert!(seed.messages.iter().any(|m| m.id.as_str() == "msg-1"));
    }

    #[test]
    fn test_load_from_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "actors:\n  - id: a\n    name: A\n  - id: b\n    name: B\n    active: false\n"
        )
        .unwrap();

        let world = InMemoryWorld::from_yaml_file(file.path()).unwrap();
        let seed = world.snapshot();
        assert_eq!(seed.actors.len(), 2);
        assert!(seed.actors[0].active);
        assert!(!seed.actors[1].active);
    }

    // ============== Fetch Tests ==============

    #[tokio::test]
    async fn test_fetch_message_and_sender() {
        let world = world();
        let subject = EntityId::new("msg-1");

        let message = world
            .fetch(&mira(), DataCategory::Message, &QueryParams::new(), Some(&subject))
            .await
            .unwrap();
        assert_eq!(message["from"], "npc-tobin");

        let sender = world
            .fetch(&mira(), DataCategory::Sender, &QueryParams::new(), Some(&subject))
            .await
            .unwrap();
        assert_eq!(sender["name"], "Tobin");
        assert_eq!(world.fetches().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_message_addressed_to_someone_else() {
        let world = world();
        let result = world
            .fetch(
                &ActorId::new("npc-ash"),
                DataCategory::Message,
                &QueryParams::new(),
                Some(&EntityId::new("msg-1")),
            )
            .await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_conversation_history_respects_limit() {
        let world = world();
        let history = world
            .fetch(
                &mira(),
                DataCategory::ConversationHistory,
                &QueryParams::new().with_limit(1).with_filter("counterpart", "npc-tobin"),
                None,
            )
            .await
            .unwrap();

        let history = history.as_array().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0]["id"], "msg-1");
    }

    #[tokio::test]
    async fn test_relationship_defaults_to_neutral() {
        let world = world();
        let rel = world
            .fetch(
                &mira(),
                DataCategory::Relationship,
                &QueryParams::new().with_filter("counterpart", "npc-nobody"),
                None,
            )
            .await
            .unwrap();
        assert_eq!(rel["affinity"], 0.0);
    }

    #[tokio::test]
    async fn test_feed_excludes_own_posts() {
        let world = world();
        let feed = world
            .fetch(&ActorId::new("npc-ash"), DataCategory::Feed, &QueryParams::new(), None)
            .await
            .unwrap();
        assert!(feed
            .as_array()
            .unwrap()
            .iter()
            .all(|p| p["author"] != "npc-ash"));
    }

    #[tokio::test]
    async fn test_injected_fetch_failure() {
        let world = world();
        world.fail_fetch(DataCategory::Feed, ServiceError::Transient("db down".to_string()));

        let result = world.fetch(&mira(), DataCategory::Feed, &QueryParams::new(), None).await;
        assert_eq!(result, Err(ServiceError::Transient("db down".to_string())));

        world.clear_faults();
        assert!(world.fetch(&mira(), DataCategory::Feed, &QueryParams::new(), None).await.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_log_keeps_most_recent() {
        let world = world().with_log_limit(2);
        for category in [DataCategory::Feed, DataCategory::Territory, DataCategory::Memories] {
            world.fetch(&mira(), category, &QueryParams::new(), None).await.unwrap();
        }

        let categories: Vec<_> = world.fetches().into_iter().map(|(_, c)| c).collect();
        assert_eq!(categories, vec![DataCategory::Territory, DataCategory::Memories]);
    }

    // ============== Mutation Tests ==============

    #[tokio::test]
    async fn test_reply_creates_message_to_sender() {
        let world = world();
        let action = Action::new(ActionParams::Reply(ContentParams {
            content: "On my way".to_string(),
        }))
        .with_target("msg-1");

        let outcome = world.execute(&mira(), &action).await.unwrap();
        let id = outcome.entity_id.unwrap();

        let seed = world.snapshot();
        let reply = seed.messages.iter().find(|m| m.id == id).unwrap();
        assert_eq!(reply.to, ActorId::new("npc-tobin"));
        assert_eq!(world.mutations().len(), 1);
    }

    #[tokio::test]
    async fn test_join_group_through_invite() {
        let world = world();
        let action = Action::new(ActionParams::JoinGroup).with_target("invite-1");

        world.execute(&mira(), &action).await.unwrap();
        let seed = world.snapshot();
        let guild = seed.groups.iter().find(|g| g.id.as_str() == "guild-smiths").unwrap();
        assert!(guild.members.contains(&mira()));
        assert!(seed.invites.iter().all(|i| i.id.as_str() != "invite-1"));

        let again = world.execute(&mira(), &action).await;
        assert!(matches!(again, Err(ServiceError::NotFound(_)) | Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_claim_held_territory_conflicts() {
        let world = world();
        let action = Action::new(ActionParams::ClaimTerritory).with_target("terr-forge");
        let result = world.execute(&mira(), &action).await;
        assert!(matches!(result, Err(ServiceError::Conflict(_))));
        assert!(world.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_travel_moves_actor() {
        let world = world();
        let action = Action::new(ActionParams::Travel(TravelParams {
            destination: "old-mill".to_string(),
        }));
        world.execute(&mira(), &action).await.unwrap();

        let profile = world.find_actor(&mira()).await.unwrap().unwrap();
        assert_eq!(profile.location.as_deref(), Some("old-mill"));
    }

    #[tokio::test]
    async fn test_unknown_actor_cannot_act() {
        let world = world();
        let result = world
            .execute(&ActorId::new("ghost"), &Action::new(ActionParams::Rest))
            .await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    // ============== Maintenance Tests ==============

    #[tokio::test]
    async fn test_decay_relationships_moves_toward_zero() {
        let world = world();
        let changed = world.decay_relationships(&mira()).await.unwrap();
        assert!(changed > 0);

        let seed = world.snapshot();
        let rel = seed
            .relationships
            .iter()
            .find(|r| r.involves(&mira()) && r.involves(&ActorId::new("npc-tobin")))
            .unwrap();
        assert_eq!(rel.affinity, 11.0);
    }

    #[tokio::test]
    async fn test_prune_memories_keeps_most_important() {
        let world = world().with_memory_retention(1);
        let removed = world.prune_memories(&mira()).await.unwrap();
        assert_eq!(removed, 1);

        let seed = world.snapshot();
        let kept: Vec<_> = seed.memories.iter().filter(|m| m.actor == mira()).collect();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].importance, 0.9);
    }
}
