//! Data categories an agent may observe

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Every category of game data a workflow could ask for.
///
/// A workflow scope declares, per category, whether it is visible
/// and with which query bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataCategory {
    /// The acting agent's own profile
    Actor,
    /// The triggering direct message
    Message,
    /// Sender of the triggering message
    Sender,
    ConversationHistory,
    /// Relationship between the actor and the counterpart of this run
    Relationship,
    /// The triggering post
    Post,
    Author,
    Comments,
    /// The group an invite refers to
    Group,
    /// Groups the actor belongs to
    Groups,
    Feed,
    Memories,
    Territory,
    SocialGraph,
    Notifications,
}

impl DataCategory {
    pub const ALL: [DataCategory; 15] = [
        DataCategory::Actor,
        DataCategory::Message,
        DataCategory::Sender,
        DataCategory::ConversationHistory,
        DataCategory::Relationship,
        DataCategory::Post,
        DataCategory::Author,
        DataCategory::Comments,
        DataCategory::Group,
        DataCategory::Groups,
        DataCategory::Feed,
        DataCategory::Memories,
        DataCategory::Territory,
        DataCategory::SocialGraph,
        DataCategory::Notifications,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataCategory::Actor => "actor",
            DataCategory::Message => "message",
            DataCategory::Sender => "sender",
            DataCategory::ConversationHistory => "conversation_history",
            DataCategory::Relationship => "relationship",
            DataCategory::Post => "post",
            DataCategory::Author => "author",
            DataCategory::Comments => "comments",
            DataCategory::Group => "group",
            DataCategory::Groups => "groups",
            DataCategory::Feed => "feed",
            DataCategory::Memories => "memories",
            DataCategory::Territory => "territory",
            DataCategory::SocialGraph => "social_graph",
            DataCategory::Notifications => "notifications",
        }
    }
}

impl core::fmt::Display for DataCategory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bounds on a category fetch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParams {
    /// Maximum number of rows
    pub limit: Option<usize>,

    /// Equality filters understood by the data service
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filter: BTreeMap<String, String>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set row limit
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Builder: add a filter
    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter.insert(key.into(), value.into());
        self
    }
}
