//! Action catalog and typed action parameters

use crate::ids::EntityId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Every action an agent can ever take. Workflows permit a subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    Reply,
    Ignore,
    Comment,
    React,
    CreatePost,
    SendMessage,
    JoinGroup,
    LeaveGroup,
    Travel,
    ClaimTerritory,
    Rest,
}

impl ActionKind {
    /// The global action catalog
    pub const ALL: [ActionKind; 11] = [
        ActionKind::Reply,
        ActionKind::Ignore,
        ActionKind::Comment,
        ActionKind::React,
        ActionKind::CreatePost,
        ActionKind::SendMessage,
        ActionKind::JoinGroup,
        ActionKind::LeaveGroup,
        ActionKind::Travel,
        ActionKind::ClaimTerritory,
        ActionKind::Rest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Reply => "REPLY",
            ActionKind::Ignore => "IGNORE",
            ActionKind::Comment => "COMMENT",
            ActionKind::React => "REACT",
            ActionKind::CreatePost => "CREATE_POST",
            ActionKind::SendMessage => "SEND_MESSAGE",
            ActionKind::JoinGroup => "JOIN_GROUP",
            ActionKind::LeaveGroup => "LEAVE_GROUP",
            ActionKind::Travel => "TRAVEL",
            ActionKind::ClaimTerritory => "CLAIM_TERRITORY",
            ActionKind::Rest => "REST",
        }
    }

    /// Whether the action points at another entity (message, post, group...)
    pub fn requires_target(&self) -> bool {
        matches!(
            self,
            ActionKind::Reply
                | ActionKind::Comment
                | ActionKind::React
                | ActionKind::SendMessage
                | ActionKind::JoinGroup
                | ActionKind::LeaveGroup
                | ActionKind::ClaimTerritory
        )
    }

    /// Passive actions never reach the mutator service
    pub fn is_passive(&self) -> bool {
        matches!(self, ActionKind::Ignore | ActionKind::Rest)
    }
}

impl core::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    /// Case-insensitive; accepts `join_group`, `JOIN_GROUP` and `join-group`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_").to_ascii_uppercase();
        ActionKind::ALL
            .iter()
            .find(|k| k.as_str() == normalized)
            .copied()
            .ok_or_else(|| format!("Unknown action kind '{}'", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentParams {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactParams {
    #[serde(default = "default_reaction")]
    pub reaction: String,
}

fn default_reaction() -> String {
    "like".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePostParams {
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelParams {
    pub destination: String,
}

/// Parameters of an action, one shape per kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "parameters", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionParams {
    Reply(ContentParams),
    Ignore,
    Comment(ContentParams),
    React(ReactParams),
    CreatePost(CreatePostParams),
    SendMessage(ContentParams),
    JoinGroup,
    LeaveGroup,
    Travel(TravelParams),
    ClaimTerritory,
    Rest,
}

impl ActionParams {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionParams::Reply(_) => ActionKind::Reply,
            ActionParams::Ignore => ActionKind::Ignore,
            ActionParams::Comment(_) => ActionKind::Comment,
            ActionParams::React(_) => ActionKind::React,
            ActionParams::CreatePost(_) => ActionKind::CreatePost,
            ActionParams::SendMessage(_) => ActionKind::SendMessage,
            ActionParams::JoinGroup => ActionKind::JoinGroup,
            ActionParams::LeaveGroup => ActionKind::LeaveGroup,
            ActionParams::Travel(_) => ActionKind::Travel,
            ActionParams::ClaimTerritory => ActionKind::ClaimTerritory,
            ActionParams::Rest => ActionKind::Rest,
        }
    }
}

/// A validated, typed action ready for the mutator service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub target_id: Option<EntityId>,
    #[serde(flatten)]
    pub params: ActionParams,
}

impl Action {
    pub fn new(params: ActionParams) -> Self {
        Self {
            target_id: None,
            params,
        }
    }

    /// Builder: set target
    pub fn with_target(mut self, target: impl Into<EntityId>) -> Self {
        self.target_id = Some(target.into());
        self
    }

    pub fn kind(&self) -> ActionKind {
        self.params.kind()
    }

    /// Build a typed action from a loosely-typed decision.
    ///
    /// A `null` parameter payload is treated as an empty object.
    pub fn from_parts(
        kind: ActionKind,
        target_id: Option<EntityId>,
        parameters: &serde_json::Value,
    ) -> Result<Self, String> {
        let params = match kind {
            ActionKind::Reply => ActionParams::Reply(parse(parameters)?),
            ActionKind::Ignore => ActionParams::Ignore,
            ActionKind::Comment => ActionParams::Comment(parse(parameters)?),
            ActionKind::React => ActionParams::React(parse(parameters)?),
            ActionKind::CreatePost => ActionParams::CreatePost(parse(parameters)?),
            ActionKind::SendMessage => ActionParams::SendMessage(parse(parameters)?),
            ActionKind::JoinGroup => ActionParams::JoinGroup,
            ActionKind::LeaveGroup => ActionParams::LeaveGroup,
            ActionKind::Travel => ActionParams::Travel(parse(parameters)?),
            ActionKind::ClaimTerritory => ActionParams::ClaimTerritory,
            ActionKind::Rest => ActionParams::Rest,
        };

        if kind.requires_target() && target_id.is_none() {
            return Err(format!("{} requires a target", kind));
        }

        Ok(Self { target_id, params })
    }
}

fn parse<T: DeserializeOwned>(parameters: &serde_json::Value) -> Result<T, String> {
    let value = if parameters.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        parameters.clone()
    };
    serde_json::from_value(value).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ============== ActionKind Tests ==============

    #[test]
    fn test_parse_action_kind_variants() {
        assert_eq!("REPLY".parse::<ActionKind>().unwrap(), ActionKind::Reply);
        assert_eq!("join_group".parse::<ActionKind>().unwrap(), ActionKind::JoinGroup);
        assert_eq!("claim-territory".parse::<ActionKind>().unwrap(), ActionKind::ClaimTerritory);
        assert!("TELEPORT".parse::<ActionKind>().is_err());
    }

    #[test]
    fn test_action_kind_serde_matches_as_str() {
        for kind in ActionKind::ALL {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, json!(kind.as_str()));
        }
    }

    // ============== Typed Action Tests ==============

    #[test]
    fn test_from_parts_reply() {
        let action = Action::from_parts(
            ActionKind::Reply,
            Some(EntityId::new("msg-1")),
            &json!({"content": "hello"}),
        )
        .unwrap();

        assert_eq!(action.kind(), ActionKind::Reply);
        assert_eq!(
            action.params,
            ActionParams::Reply(ContentParams { content: "hello".to_string() })
        );
    }

    #[test]
    fn test_from_parts_missing_parameter() {
        let result = Action::from_parts(ActionKind::Comment, Some(EntityId::new("p-1")), &json!({}));
        assert!(result.is_err());
    }

    #[test]
    fn test_from_parts_requires_target() {
        let result = Action::from_parts(ActionKind::JoinGroup, None, &serde_json::Value::Null);
        assert!(result.unwrap_err().contains("requires a target"));
    }

    #[test]
    fn test_from_parts_null_parameters_for_passive() {
        let action = Action::from_parts(ActionKind::Ignore, None, &serde_json::Value::Null).unwrap();
        assert_eq!(action.params, ActionParams::Ignore);
        assert!(action.kind().is_passive());
    }

    #[test]
    fn test_react_defaults_reaction() {
        let action =
            Action::from_parts(ActionKind::React, Some(EntityId::new("p-1")), &json!(null)).unwrap();
        assert_eq!(
            action.params,
            ActionParams::React(ReactParams { reaction: "like".to_string() })
        );
    }

    #[test]
    fn test_action_serialization_shape() {
        let action = Action::new(ActionParams::Travel(TravelParams {
            destination: "harbor".to_string(),
        }));
        let json = serde_json::to_value(&action).unwrap();

        assert_eq!(json["kind"], "TRAVEL");
        assert_eq!(json["parameters"]["destination"], "harbor");
        assert!(json["targetId"].is_null());
    }
}
