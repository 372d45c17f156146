//! Reasoning Oracle - Contract of the external decision service

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::{ActionKind, ActorId, EntityId, ServiceError, Trigger};

/// Everything the oracle gets to see for one decision
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleRequest {
    pub actor: ActorId,
    pub trigger: Trigger,
    pub iteration: u32,
    pub available_actions: Vec<ActionKind>,

    /// Precomputed scope context (persona, heat, ...)
    pub context: serde_json::Value,

    /// Data observed this iteration, keyed by category
    pub observations: serde_json::Value,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Decision returned by the oracle.
///
/// `action` is kept as the raw string the oracle produced; it is only
/// resolved to an [`ActionKind`] once it has been checked against the
/// run's allowed actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleDecision {
    pub action: String,

    #[serde(default)]
    pub target_id: Option<EntityId>,

    #[serde(default)]
    pub parameters: serde_json::Value,

    #[serde(default)]
    pub confidence: Option<f64>,

    #[serde(default)]
    pub reasoning: Option<String>,
}

impl OracleDecision {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            target_id: None,
            parameters: serde_json::Value::Null,
            confidence: None,
            reasoning: None,
        }
    }

    /// Builder: set the target entity
    pub fn with_target(mut self, target_id: impl Into<EntityId>) -> Self {
        self.target_id = Some(target_id.into());
        self
    }

    /// Builder: set the action parameters
    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }
}

/// Reasoning Oracle Trait
///
/// This is a PORT in hexagonal architecture.
#[async_trait]
pub trait ReasoningOracle: Send + Sync {
    async fn decide(&self, request: &OracleRequest) -> Result<OracleDecision, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decision_parses_minimal_response() {
        let decision: OracleDecision = serde_json::from_value(json!({"action": "IGNORE"})).unwrap();
        assert_eq!(decision, OracleDecision::new("IGNORE"));
    }

    #[test]
    fn test_decision_parses_full_response() {
        let decision: OracleDecision = serde_json::from_value(json!({
            "action": "REPLY",
            "targetId": "msg-1",
            "parameters": {"content": "See you at the docks"},
            "confidence": 0.8,
            "reasoning": "friendly sender"
        }))
        .unwrap();

        assert_eq!(decision.target_id, Some(EntityId::new("msg-1")));
        assert_eq!(decision.parameters["content"], "See you at the docks");
        assert_eq!(decision.confidence, Some(0.8));
    }

    #[test]
    fn test_request_serializes_camel_case() {
        let request = OracleRequest {
            actor: ActorId::new("npc-1"),
            trigger: Trigger::event("message_received"),
            iteration: 0,
            available_actions: vec![ActionKind::Reply, ActionKind::Ignore],
            context: json!({}),
            observations: json!({}),
            model: None,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["availableActions"], json!(["REPLY", "IGNORE"]));
        assert!(value.get("model").is_none());
    }
}
