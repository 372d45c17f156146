//! Run state - the mutable record of one workflow run

use chrono::{DateTime, Utc};
use gateway::OracleDecision;
use scope::WorkflowScope;
use serde::Serialize;
use serde_json::{Map, Value};
use shared::{ActionKind, RunId, WorkflowError};
use std::sync::Arc;

/// Position in the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Observe,
    Reason,
    Act,
    LoopCheck,
    Complete,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Step::Observe => "observe",
            Step::Reason => "reason",
            Step::Act => "act",
            Step::LoopCheck => "loop_check",
            Step::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// What Act did with a decision
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum LoopOutcome {
    /// Sent to the mutator; heat after the action
    Executed { heat: f64 },

    /// Passive decision, nothing to execute
    Passive,

    /// Actor was over the heat threshold
    HeatBlocked { heat: f64 },
}

/// One finished Act, kept in loop history
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopRecord {
    pub iteration: u32,
    pub decision: ActionKind,
    #[serde(flatten)]
    pub outcome: LoopOutcome,
}

/// Loop bookkeeping.
///
/// `iteration` counts completed iterations, so it never exceeds
/// `max_iterations + 1` nor the global safety ceiling.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopState {
    pub iteration: u32,
    pub max_iterations: u32,
    pub heat_cost_per_iteration: f64,
    pub should_continue: bool,
    pub history: Vec<LoopRecord>,
}

impl LoopState {
    pub fn new(max_iterations: u32, heat_cost_per_iteration: f64) -> Self {
        Self {
            iteration: 0,
            max_iterations,
            heat_cost_per_iteration,
            should_continue: true,
            history: Vec::new(),
        }
    }

    /// Record of the current iteration's Act, if it ran
    pub fn current(&self) -> Option<&LoopRecord> {
        self.history.last().filter(|r| r.iteration == self.iteration)
    }
}

/// State of one run. Owned by that run only.
#[derive(Debug, Clone)]
pub struct WorkflowState {
    pub run_id: RunId,
    pub scope: Arc<WorkflowScope>,
    pub step: Step,
    pub loop_state: LoopState,
    pub executed_actions: Vec<ActionKind>,
    pub errors: Vec<WorkflowError>,

    /// Observations of the current iteration, keyed by category
    pub metadata: Map<String, Value>,

    /// Decision awaiting Act
    pub decision: Option<OracleDecision>,

    /// Every step taken, in order
    pub step_trace: Vec<Step>,

    pub started_at: DateTime<Utc>,
}

impl WorkflowState {
    pub fn new(run_id: RunId, scope: Arc<WorkflowScope>, loop_state: LoopState) -> Self {
        Self {
            run_id,
            scope,
            step: Step::Observe,
            loop_state,
            executed_actions: Vec::new(),
            errors: Vec::new(),
            metadata: Map::new(),
            decision: None,
            step_trace: Vec::new(),
            started_at: Utc::now(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.step == Step::Complete
    }

    /// Merge the result of the step that just ran
    pub fn apply(&mut self, update: StepUpdate) {
        self.step_trace.push(self.step);

        if let Some(metadata) = update.metadata {
            self.metadata = metadata;
        }
        if update.clear_decision {
            self.decision = None;
        }
        if let Some(decision) = update.decision {
            self.decision = Some(decision);
        }
        if let Some(kind) = update.executed {
            self.executed_actions.push(kind);
        }
        if let Some(record) = update.loop_record {
            self.loop_state.history.push(record);
        }
        if let Some((iteration, should_continue)) = update.loop_advance {
            self.loop_state.iteration = iteration;
            self.loop_state.should_continue = should_continue;
        }
        self.errors.extend(update.errors);
        self.step = update.next;
    }
}

/// Partial state produced by one step
#[derive(Debug, Clone)]
pub struct StepUpdate {
    pub next: Step,
    pub metadata: Option<Map<String, Value>>,
    pub decision: Option<OracleDecision>,
    pub clear_decision: bool,
    pub executed: Option<ActionKind>,
    pub loop_record: Option<LoopRecord>,
    pub loop_advance: Option<(u32, bool)>,
    pub errors: Vec<WorkflowError>,
}

impl StepUpdate {
    pub fn to(next: Step) -> Self {
        Self {
            next,
            metadata: None,
            decision: None,
            clear_decision: false,
            executed: None,
            loop_record: None,
            loop_advance: None,
            errors: Vec::new(),
        }
    }

    /// Record an error and end the run
    pub fn fail(error: impl Into<WorkflowError>) -> Self {
        Self::to(Step::Complete).with_error(error)
    }

    /// Builder: replace observations
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Builder: store a decision for Act
    pub fn with_decision(mut self, decision: OracleDecision) -> Self {
        self.decision = Some(decision);
        self
    }

    /// Builder: consume the pending decision
    pub fn consuming_decision(mut self) -> Self {
        self.clear_decision = true;
        self
    }

    /// Builder: record an executed action
    pub fn with_executed(mut self, kind: ActionKind) -> Self {
        self.executed = Some(kind);
        self
    }

    /// Builder: append loop history
    pub fn with_loop_record(mut self, record: LoopRecord) -> Self {
        self.loop_record = Some(record);
        self
    }

    /// Builder: move the loop counter
    pub fn with_loop_advance(mut self, iteration: u32, should_continue: bool) -> Self {
        self.loop_advance = Some((iteration, should_continue));
        self
    }

    /// Builder: record an error
    pub fn with_error(mut self, error: impl Into<WorkflowError>) -> Self {
        self.errors.push(error.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{ActorId, SafetyStopError, Trigger};

    fn state() -> WorkflowState {
        let scope = WorkflowScope::builder(Trigger::event("message_received"), ActorId::new("npc-1"))
            .allow([ActionKind::Reply, ActionKind::Ignore])
            .build();
        WorkflowState::new(RunId::generate(), Arc::new(scope), LoopState::new(1, 3.0))
    }

    #[test]
    fn test_new_state_starts_at_observe() {
        let state = state();
        assert_eq!(state.step, Step::Observe);
        assert_eq!(state.loop_state.iteration, 0);
        assert!(state.step_trace.is_empty());
    }

    #[test]
    fn test_apply_records_step_and_transitions() {
        let mut state = state();
        state.apply(StepUpdate::to(Step::Reason));
        state.apply(StepUpdate::to(Step::Act).with_decision(OracleDecision::new("REPLY")));

        assert_eq!(state.step, Step::Act);
        assert_eq!(state.step_trace, vec![Step::Observe, Step::Reason]);
        assert!(state.decision.is_some());
    }

    #[test]
    fn test_fail_completes_with_error() {
        let mut state = state();
        state.apply(StepUpdate::fail(SafetyStopError {
            iteration: 10,
            ceiling: 10,
        }));

        assert!(state.is_complete());
        assert_eq!(state.errors.len(), 1);
        assert_eq!(state.errors[0].code(), "safety_stop");
    }

    #[test]
    fn test_current_loop_record() {
        let mut state = state();
        state.apply(
            StepUpdate::to(Step::LoopCheck).with_loop_record(LoopRecord {
                iteration: 0,
                decision: ActionKind::Reply,
                outcome: LoopOutcome::Executed { heat: 53.0 },
            }),
        );
        assert!(state.loop_state.current().is_some());

        state.apply(StepUpdate::to(Step::Observe).with_loop_advance(1, true));
        assert!(state.loop_state.current().is_none());
    }
}
