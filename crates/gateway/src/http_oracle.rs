//! HttpOracle - JSON-over-HTTP reasoning oracle client

use crate::oracle::{OracleDecision, OracleRequest, ReasoningOracle};
use async_trait::async_trait;
use reqwest::StatusCode;
use shared::{EngineError, OracleConfig, ServiceError};
use std::time::Duration;

/// Posts each [`OracleRequest`] to a configured endpoint and parses the
/// body as an [`OracleDecision`]. No retries are made here.
#[derive(Debug, Clone)]
pub struct HttpOracle {
    client: reqwest::Client,
    endpoint: String,
    model: Option<String>,
    timeout: Duration,
}

impl HttpOracle {
    pub fn from_config(config: &OracleConfig) -> shared::Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| EngineError::Config("oracle.endpoint is not set".to_string()))?;

        if reqwest::Url::parse(&endpoint).is_err() {
            return Err(EngineError::Config(format!(
                "oracle.endpoint is not a valid URL: '{}'",
                endpoint
            )));
        }

        let timeout = Duration::from_millis(config.timeout_ms);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            model: config.model.clone(),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn map_transport_error(&self, err: reqwest::Error) -> ServiceError {
        if err.is_timeout() {
            ServiceError::Timeout(self.timeout.as_millis() as u64)
        } else if err.is_decode() {
            ServiceError::Malformed(err.to_string())
        } else {
            ServiceError::Transient(err.to_string())
        }
    }
}

fn map_status(status: StatusCode, body: String) -> ServiceError {
    let detail = format!("oracle returned {}: {}", status, body.trim());
    match status {
        StatusCode::NOT_FOUND => ServiceError::NotFound(detail),
        StatusCode::CONFLICT => ServiceError::Conflict(detail),
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => ServiceError::Transient(detail),
        s if s.is_server_error() => ServiceError::Transient(detail),
        _ => ServiceError::Malformed(detail),
    }
}

#[async_trait]
impl ReasoningOracle for HttpOracle {
    async fn decide(&self, request: &OracleRequest) -> Result<OracleDecision, ServiceError> {
        let mut payload = request.clone();
        if payload.model.is_none() {
            payload.model = self.model.clone();
        }

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, actor = %request.actor, "Oracle rejected request");
            return Err(map_status(status, body));
        }

        let body = response.text().await.map_err(|e| self.map_transport_error(e))?;
        serde_json::from_str(&body).map_err(|e| ServiceError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared::{ActionKind, ActorId, Trigger};

    fn config(endpoint: Option<String>) -> OracleConfig {
        OracleConfig {
            endpoint,
            timeout_ms: 2_000,
            model: Some("tiny".to_string()),
        }
    }

    fn request() -> OracleRequest {
        OracleRequest {
            actor: ActorId::new("npc-1"),
            trigger: Trigger::event("message_received"),
            iteration: 0,
            available_actions: vec![ActionKind::Reply, ActionKind::Ignore],
            context: json!({"persona": "harbor pilot"}),
            observations: json!({"message": {"content": "hello"}}),
            model: None,
        }
    }

    // ============== Construction Tests ==============

    #[test]
    fn test_missing_endpoint_rejected() {
        let result = HttpOracle::from_config(&config(None));
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let result = HttpOracle::from_config(&config(Some("not a url".to_string())));
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    // ============== Decide Tests ==============

    #[tokio::test]
    async fn test_decide_parses_decision_and_sends_model() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/decide")
            .match_body(mockito::Matcher::PartialJson(json!({
                "model": "tiny",
                "availableActions": ["REPLY", "IGNORE"]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"action": "REPLY", "targetId": "msg-1", "parameters": {"content": "hi"}}"#)
            .create_async()
            .await;

        let oracle = HttpOracle::from_config(&config(Some(format!("{}/decide", server.url())))).unwrap();
        let decision = oracle.decide(&request()).await.unwrap();

        assert_eq!(decision.action, "REPLY");
        assert_eq!(decision.parameters["content"], "hi");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_decide_malformed_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/decide")
            .with_status(200)
            .with_body("I think you should reply")
            .create_async()
            .await;

        let oracle = HttpOracle::from_config(&config(Some(format!("{}/decide", server.url())))).unwrap();
        let err = oracle.decide(&request()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_decide_server_error_is_transient() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/decide")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let oracle = HttpOracle::from_config(&config(Some(format!("{}/decide", server.url())))).unwrap();
        let err = oracle.decide(&request()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Transient(ref m) if m.contains("overloaded")));
    }

    #[test]
    fn test_map_status() {
        assert!(matches!(
            map_status(StatusCode::NOT_FOUND, String::new()),
            ServiceError::NotFound(_)
        ));
        assert!(matches!(
            map_status(StatusCode::CONFLICT, String::new()),
            ServiceError::Conflict(_)
        ));
        assert!(matches!(
            map_status(StatusCode::BAD_REQUEST, String::new()),
            ServiceError::Malformed(_)
        ));
    }
}
