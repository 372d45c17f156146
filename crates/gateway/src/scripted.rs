//! ScriptedOracle - deterministic oracle for tests and local runs

use crate::oracle::{OracleDecision, OracleRequest, ReasoningOracle};
use async_trait::async_trait;
use shared::{ActionKind, ServiceError};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Reply {
    Decision(OracleDecision),
    Failure(ServiceError),
}

#[derive(Debug, Default)]
struct Script {
    queue: VecDeque<Reply>,
    requests: Vec<OracleRequest>,
}

/// Answers from a queue of prepared replies.
///
/// Once the queue is empty it falls back to the first passive action the
/// request allows (`IGNORE` or `REST`), or the first available action.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    script: Mutex<Script>,
    delay: Option<Duration>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: queue a decision
    pub fn with_decision(self, decision: OracleDecision) -> Self {
        self.push(decision);
        self
    }

    /// Builder: wait this long before every answer
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push(&self, decision: OracleDecision) {
        self.lock().queue.push_back(Reply::Decision(decision));
    }

    pub fn push_error(&self, error: ServiceError) {
        self.lock().queue.push_back(Reply::Failure(error));
    }

    /// Requests received so far, in order
    pub fn requests(&self) -> Vec<OracleRequest> {
        self.lock().requests.clone()
    }

    pub fn remaining(&self) -> usize {
        self.lock().queue.len()
    }

    fn fallback(request: &OracleRequest) -> Result<OracleDecision, ServiceError> {
        let actions = &request.available_actions;
        actions
            .iter()
            .find(|k| k.is_passive())
            .or_else(|| actions.first())
            .map(|k: &ActionKind| OracleDecision::new(k.as_str()))
            .ok_or_else(|| ServiceError::Malformed("no available actions".to_string()))
    }
}

#[async_trait]
impl ReasoningOracle for ScriptedOracle {
    async fn decide(&self, request: &OracleRequest) -> Result<OracleDecision, ServiceError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = {
            let mut script = self.lock();
            script.requests.push(request.clone());
            script.queue.pop_front()
        };

        match reply {
            Some(Reply::Decision(decision)) => Ok(decision),
            Some(Reply::Failure(error)) => Err(error),
            None => Self::fallback(request),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared::{ActorId, Trigger};

    fn request(actions: Vec<ActionKind>) -> OracleRequest {
        OracleRequest {
            actor: ActorId::new("npc-1"),
            trigger: Trigger::schedule("agent_cycle"),
            iteration: 0,
            available_actions: actions,
            context: json!({}),
            observations: json!({}),
            model: None,
        }
    }

    #[tokio::test]
    async fn test_replies_in_order_then_falls_back() {
        let oracle = ScriptedOracle::new().with_decision(OracleDecision::new("CREATE_POST"));
        oracle.push_error(ServiceError::Timeout(10));

        let actions = vec![ActionKind::CreatePost, ActionKind::Rest];
        assert_eq!(oracle.decide(&request(actions.clone())).await.unwrap().action, "CREATE_POST");
        assert_eq!(oracle.decide(&request(actions.clone())).await, Err(ServiceError::Timeout(10)));
        assert_eq!(oracle.decide(&request(actions)).await.unwrap().action, "REST");
        assert_eq!(oracle.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_fallback_without_passive_action() {
        let oracle = ScriptedOracle::new();
        let decision = oracle.decide(&request(vec![ActionKind::Comment])).await.unwrap();
        assert_eq!(decision.action, "COMMENT");

        assert!(oracle.decide(&request(vec![])).await.is_err());
    }
}
