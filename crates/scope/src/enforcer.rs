//! ScopeEnforcer - checks data access and decisions against a scope

use crate::workflow_scope::WorkflowScope;
use shared::{ActionKind, ActionNotPermittedError, DataCategory, QueryParams, ScopeViolationError};

/// Guards one run's scope.
///
/// Every data fetch goes through [`ScopeEnforcer::assert_visible`] first;
/// every decision goes through [`ScopeEnforcer::assert_permitted`].
#[derive(Debug, Clone, Copy)]
pub struct ScopeEnforcer<'a> {
    scope: &'a WorkflowScope,
}

impl<'a> ScopeEnforcer<'a> {
    pub fn new(scope: &'a WorkflowScope) -> Self {
        Self { scope }
    }

    /// Check if a category is visible
    pub fn is_visible(&self, category: DataCategory) -> bool {
        self.scope.data_scope().is_visible(category)
    }

    /// Check visibility and return the declared bounds.
    ///
    /// A miss means a workflow asked for data it never declared, which is
    /// a defect in that workflow's scope builder.
    pub fn assert_visible(
        &self,
        category: DataCategory,
    ) -> Result<&'a QueryParams, ScopeViolationError> {
        match self.scope.data_scope().get(category) {
            Some(params) => Ok(params),
            None => {
                let err = ScopeViolationError {
                    category,
                    trigger: self.scope.trigger().to_string(),
                    actor: self.scope.actor().to_string(),
                };
                tracing::error!(
                    category = %category,
                    trigger = %self.scope.trigger(),
                    actor = %self.scope.actor(),
                    "SCOPE VIOLATION: workflow requested undeclared data"
                );
                Err(err)
            }
        }
    }

    /// Resolve a raw action kind and check it against the allowed set
    pub fn assert_permitted(&self, raw_kind: &str) -> Result<ActionKind, ActionNotPermittedError> {
        let denied = || ActionNotPermittedError {
            kind: raw_kind.to_string(),
            allowed: self.scope.allowed_actions().iter().copied().collect(),
        };

        let kind: ActionKind = raw_kind.parse().map_err(|_| denied())?;
        if self.scope.permits(kind) {
            Ok(kind)
        } else {
            Err(denied())
        }
    }
}
