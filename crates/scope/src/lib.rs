//! # Ember Scope
//!
//! The isolation boundary of a workflow run.
//!
//! ## Components
//!
//! - `WorkflowScope` - What one run may see and do, built once and immutable
//! - `ScopeEnforcer` - Checks every data access and decision against a scope

pub mod enforcer;
pub mod workflow_scope;

pub use enforcer::ScopeEnforcer;
pub use workflow_scope::{DataScope, WorkflowScope, WorkflowScopeBuilder};
