//! TriggerRouter - maps triggers to workflow handlers

use crate::workflow::WorkflowHandler;
use crate::workflows::default_workflows;
use shared::{EngineConfig, Trigger, TriggerKey, UnknownTriggerError};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Static registry keyed by `(type, name)`.
///
/// Adding a workflow kind is one `register` call; existing handlers are
/// never touched.
#[derive(Clone, Default)]
pub struct TriggerRouter {
    handlers: BTreeMap<TriggerKey, Arc<dyn WorkflowHandler>>,
}

impl std::fmt::Debug for TriggerRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerRouter")
            .field("registered", &self.registered())
            .finish()
    }
}

impl TriggerRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Router with the built-in workflow catalog
    pub fn with_defaults(config: &EngineConfig) -> Self {
        let mut router = Self::new();
        for handler in default_workflows(config) {
            router.register(handler);
        }
        router
    }

    /// Register a handler under its own trigger, replacing any previous one
    pub fn register(&mut self, handler: Arc<dyn WorkflowHandler>) -> &mut Self {
        self.handlers.insert(handler.trigger().key(), handler);
        self
    }

    pub fn route(&self, trigger: &Trigger) -> Result<Arc<dyn WorkflowHandler>, UnknownTriggerError> {
        self.handlers
            .get(&trigger.key())
            .cloned()
            .ok_or_else(|| UnknownTriggerError {
                trigger: trigger.to_string(),
                registered: self.registered(),
            })
    }

    pub fn is_registered(&self, trigger: &Trigger) -> bool {
        self.handlers.contains_key(&trigger.key())
    }

    /// Registered triggers, sorted
    pub fn registered(&self) -> Vec<String> {
        self.handlers.keys().map(|k| k.to_string()).collect()
    }
}
