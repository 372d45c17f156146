//! WorkflowScope - the declared boundary of one workflow run

use serde::Serialize;
use shared::{ActionKind, ActorId, DataCategory, EntityId, QueryParams, Trigger};
use std::collections::{BTreeMap, BTreeSet};

/// Visibility of every data category for one run.
///
/// Every category of the catalog has an entry. `None` means
/// "not visible this run".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataScope {
    entries: BTreeMap<DataCategory, Option<QueryParams>>,
}

impl DataScope {
    /// A scope with every category explicitly absent
    pub fn closed() -> Self {
        Self {
            entries: DataCategory::ALL.iter().map(|c| (*c, None)).collect(),
        }
    }

    fn declare(&mut self, category: DataCategory, params: QueryParams) {
        self.entries.insert(category, Some(params));
    }

    /// Query bounds for a visible category
    pub fn get(&self, category: DataCategory) -> Option<&QueryParams> {
        self.entries.get(&category).and_then(|p| p.as_ref())
    }

    pub fn is_visible(&self, category: DataCategory) -> bool {
        self.get(category).is_some()
    }

    /// Visible categories in catalog order
    pub fn visible(&self) -> impl Iterator<Item = (DataCategory, &QueryParams)> {
        self.entries
            .iter()
            .filter_map(|(c, p)| p.as_ref().map(|p| (*c, p)))
    }

    /// Categories explicitly marked absent
    pub fn absent(&self) -> impl Iterator<Item = DataCategory> + '_ {
        self.entries
            .iter()
            .filter(|(_, p)| p.is_none())
            .map(|(c, _)| *c)
    }
}

/// What one workflow run is allowed to observe and do.
///
/// Built once per run through [`WorkflowScopeBuilder`] and never
/// mutated afterwards.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowScope {
    trigger: Trigger,
    actor: ActorId,
    subject: Option<EntityId>,
    data_scope: DataScope,
    allowed_actions: BTreeSet<ActionKind>,
    context_data: serde_json::Value,
}

impl WorkflowScope {
    pub fn builder(trigger: Trigger, actor: ActorId) -> WorkflowScopeBuilder {
        WorkflowScopeBuilder {
            trigger,
            actor,
            subject: None,
            data_scope: DataScope::closed(),
            allowed_actions: BTreeSet::new(),
            context_data: serde_json::Value::Object(Default::default()),
        }
    }

    // ========== Getters ==========

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    pub fn actor(&self) -> &ActorId {
        &self.actor
    }

    pub fn subject(&self) -> Option<&EntityId> {
        self.subject.as_ref()
    }

    pub fn data_scope(&self) -> &DataScope {
        &self.data_scope
    }

    pub fn allowed_actions(&self) -> &BTreeSet<ActionKind> {
        &self.allowed_actions
    }

    pub fn context_data(&self) -> &serde_json::Value {
        &self.context_data
    }

    pub fn permits(&self, kind: ActionKind) -> bool {
        self.allowed_actions.contains(&kind)
    }
}

/// Builder for [`WorkflowScope`]
#[derive(Debug)]
pub struct WorkflowScopeBuilder {
    trigger: Trigger,
    actor: ActorId,
    subject: Option<EntityId>,
    data_scope: DataScope,
    allowed_actions: BTreeSet<ActionKind>,
    context_data: serde_json::Value,
}

impl WorkflowScopeBuilder {
    /// Builder: set the entity the trigger is about
    pub fn subject(mut self, subject: impl Into<EntityId>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Builder: declare a category visible with the given bounds
    pub fn visible(mut self, category: DataCategory, params: QueryParams) -> Self {
        self.data_scope.declare(category, params);
        self
    }

    /// Builder: permit actions
    pub fn allow(mut self, actions: impl IntoIterator<Item = ActionKind>) -> Self {
        self.allowed_actions.extend(actions);
        self
    }

    /// Builder: attach precomputed context, merged key by key
    pub fn context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        if let serde_json::Value::Object(map) = &mut self.context_data {
            map.insert(key.into(), value);
        }
        self
    }

    pub fn build(self) -> WorkflowScope {
        WorkflowScope {
            trigger: self.trigger,
            actor: self.actor,
            subject: self.subject,
            data_scope: self.data_scope,
            allowed_actions: self.allowed_actions,
            context_data: self.context_data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dm_scope() -> WorkflowScope {
        WorkflowScope::builder(Trigger::event("message_received"), ActorId::new("npc-1"))
            .subject("msg-1")
            .visible(DataCategory::Message, QueryParams::new())
            .visible(DataCategory::ConversationHistory, QueryParams::new().with_limit(20))
            .allow([ActionKind::Reply, ActionKind::Ignore])
            .context("persona", json!({"name": "Mira"}))
            .build()
    }

    // ============== DataScope Tests ==============

    #[test]
    fn test_closed_scope_declares_every_category_absent() {
        let scope = DataScope::closed();
        assert_eq!(scope.absent().count(), DataCategory::ALL.len());
        assert_eq!(scope.visible().count(), 0);
    }

    #[test]
    fn test_undeclared_categories_stay_absent() {
        let scope = dm_scope();
        let data = scope.data_scope();

        assert!(data.is_visible(DataCategory::Message));
        assert!(!data.is_visible(DataCategory::SocialGraph));
        assert!(!data.is_visible(DataCategory::Groups));
        assert_eq!(data.absent().count(), DataCategory::ALL.len() - 2);
    }

    #[test]
    fn test_declared_limits_are_kept() {
        let scope = dm_scope();
        let params = scope.data_scope().get(DataCategory::ConversationHistory).unwrap();
        assert_eq!(params.limit, Some(20));
    }

    // ============== WorkflowScope Tests ==============

    #[test]
    fn test_allowed_actions() {
        let scope = dm_scope();
        assert!(scope.permits(ActionKind::Reply));
        assert!(scope.permits(ActionKind::Ignore));
        assert!(!scope.permits(ActionKind::JoinGroup));
    }

    #[test]
    fn test_context_merges_keys() {
        let scope = WorkflowScope::builder(Trigger::schedule("agent_cycle"), ActorId::new("npc-1"))
            .context("a", json!(1))
            .context("b", json!(2))
            .build();

        assert_eq!(scope.context_data(), &json!({"a": 1, "b": 2}));
        assert!(scope.subject().is_none());
    }

    #[test]
    fn test_scope_serializes_absent_categories_as_null() {
        let json = serde_json::to_value(dm_scope()).unwrap();
        assert!(json["dataScope"]["entries"]["social_graph"].is_null());
        assert_eq!(json["dataScope"]["entries"]["conversation_history"]["limit"], 20);
        assert_eq!(json["allowedActions"], json!(["REPLY", "IGNORE"]));
    }
}
