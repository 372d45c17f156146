//! Tracer - run tracing with a pluggable sink

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{ActionKind, ActorId, EntityId, RunId, Trigger};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Identifier handed out by a sink when a trace starts
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceId(String);

impl TraceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(format!("trace-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Data recorded when a run begins
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceStart {
    pub run_id: RunId,
    pub trigger: Trigger,
    pub actor: ActorId,
    pub subject: Option<EntityId>,
    pub allowed_actions: Vec<ActionKind>,
    pub started_at: DateTime<Utc>,
}

/// Data recorded when a run finishes
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEnd {
    pub success: bool,
    pub duration_ms: u64,
    pub executed_actions: Vec<ActionKind>,
    pub error_codes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceError {
    #[error("trace sink unavailable: {0}")]
    Unavailable(String),

    #[error("unknown trace '{0}'")]
    UnknownTrace(String),
}

/// Destination for run traces
#[async_trait]
pub trait TraceSink: Send + Sync {
    async fn start_trace(&self, start: &TraceStart) -> Result<TraceId, TraceError>;

    async fn end_trace(&self, trace_id: &TraceId, end: &TraceEnd) -> Result<(), TraceError>;
}

/// Front for an optional sink. Sink failures are logged and never reach
/// the run that is being traced.
#[derive(Clone, Default)]
pub struct Tracer {
    sink: Option<Arc<dyn TraceSink>>,
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer")
            .field("enabled", &self.sink.is_some())
            .finish()
    }
}

impl Tracer {
    pub fn new(sink: Arc<dyn TraceSink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// Tracer that records nothing
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub async fn start(&self, start: &TraceStart) -> Option<TraceId> {
        let sink = self.sink.as_ref()?;
        match sink.start_trace(start).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(run_id = %start.run_id, error = %e, "Failed to start trace");
                None
            }
        }
    }

    pub async fn end(&self, trace_id: Option<&TraceId>, end: &TraceEnd) {
        let (Some(sink), Some(trace_id)) = (self.sink.as_ref(), trace_id) else {
            return;
        };
        if let Err(e) = sink.end_trace(trace_id, end).await {
            tracing::warn!(trace_id = %trace_id, error = %e, "Failed to end trace");
        }
    }
}

/// One stored trace
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEntry {
    pub trace_id: TraceId,
    #[serde(flatten)]
    pub start: TraceStart,
    pub end: Option<TraceEnd>,
}

impl TraceEntry {
    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    pub fn is_failure(&self) -> bool {
        self.end.as_ref().is_some_and(|e| !e.success)
    }
}

/// Trace statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceStats {
    pub total: usize,
    pub open: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Bounded in-process sink; the oldest trace is dropped first
#[derive(Debug)]
pub struct InMemoryTraceSink {
    entries: Mutex<VecDeque<TraceEntry>>,
    max_entries: usize,
}

impl InMemoryTraceSink {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(max_entries.min(1024))),
            max_entries: max_entries.max(1),
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, VecDeque<TraceEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Most recent traces first
    pub fn recent(&self, limit: usize) -> Vec<TraceEntry> {
        self.entries().iter().rev().take(limit).cloned().collect()
    }

    /// Most recent failed traces first
    pub fn failures(&self, limit: usize) -> Vec<TraceEntry> {
        self.entries()
            .iter()
            .rev()
            .filter(|e| e.is_failure())
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> TraceStats {
        let entries = self.entries();
        let open = entries.iter().filter(|e| e.is_open()).count();
        let failed = entries.iter().filter(|e| e.is_failure()).count();
        TraceStats {
            total: entries.len(),
            open,
            succeeded: entries.len() - open - failed,
            failed,
        }
    }

    pub fn export_json(&self) -> serde_json::Value {
        serde_json::to_value(self.entries().iter().collect::<Vec<_>>()).unwrap_or_default()
    }
}

impl Default for InMemoryTraceSink {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl TraceSink for InMemoryTraceSink {
    async fn start_trace(&self, start: &TraceStart) -> Result<TraceId, TraceError> {
        let trace_id = TraceId::generate();
        let mut entries = self.entries();
        if entries.len() >= self.max_entries {
            entries.pop_front();
        }
        entries.push_back(TraceEntry {
            trace_id: trace_id.clone(),
            start: start.clone(),
            end: None,
        });
        Ok(trace_id)
    }

    async fn end_trace(&self, trace_id: &TraceId, end: &TraceEnd) -> Result<(), TraceError> {
        let mut entries = self.entries();
        let entry = entries
            .iter_mut()
            .rev()
            .find(|e| &e.trace_id == trace_id)
            .ok_or_else(|| TraceError::UnknownTrace(trace_id.to_string()))?;
        entry.end = Some(end.clone());
        Ok(())
    }
}
