use super::StepContext;
use crate::state::{Step, StepUpdate, WorkflowState};
use shared::SafetyStopError;

/// Count the finished iteration and decide what comes next. Never blocks.
pub fn loop_check(state: &WorkflowState, ctx: &StepContext<'_>) -> StepUpdate {
    let loop_state = &state.loop_state;
    let iteration = loop_state.iteration + 1;
    let wants_more = ctx.handler.should_continue(state);

    if !wants_more || iteration >= loop_state.max_iterations {
        return StepUpdate::to(Step::Complete).with_loop_advance(iteration, false);
    }

    if iteration >= ctx.max_loop_safety {
        let stop = SafetyStopError {
            iteration,
            ceiling: ctx.max_loop_safety,
        };
        tracing::error!(
            run_id = %state.run_id,
            actor = %state.scope.actor(),
            trigger = %state.scope.trigger(),
            iteration,
            ceiling = ctx.max_loop_safety,
            "SAFETY STOP: loop policy kept the run going past the ceiling"
        );
        return StepUpdate::fail(stop).with_loop_advance(iteration, false);
    }

    StepUpdate::to(Step::Observe).with_loop_advance(iteration, true)
}
