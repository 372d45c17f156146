//! # Ember Engine
//!
//! Scope-aware agent orchestration.
//!
//! A [`Trigger`](shared::Trigger) is routed to a [`WorkflowHandler`], whose
//! scope builder decides what the agent may see and do. The run then walks
//! `Observe -> Reason -> Act -> LoopCheck` until it completes. The
//! [`Scheduler`] fires recurring jobs that fan runs out across actors.

pub mod router;
pub mod runner;
pub mod scheduler;
pub mod state;
pub mod steps;
pub mod workflow;
pub mod workflows;

pub use router::TriggerRouter;
pub use runner::{RunReport, Services, WorkflowEngine};
pub use scheduler::{
    register_default_jobs, JobHandler, JobOutcome, JobRun, Scheduler, SchedulerStatus,
};
pub use state::{LoopOutcome, LoopRecord, LoopState, Step, StepUpdate, WorkflowState};
pub use workflow::{LoopSettings, ScopeRequest, WorkflowHandler};
