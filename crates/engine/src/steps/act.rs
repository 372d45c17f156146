use super::StepContext;
use crate::state::{LoopOutcome, LoopRecord, Step, StepUpdate, WorkflowState};
use audit::HeatDecision;
use scope::ScopeEnforcer;
use shared::{Action, WorkflowError};

/// Validate the pending decision and execute it.
///
/// Heat is reserved atomically right before the mutator call and handed
/// back if the call fails.
pub async fn act(state: &WorkflowState, ctx: &StepContext<'_>) -> StepUpdate {
    let scope = state.scope.as_ref();
    let actor = scope.actor();
    let iteration = state.loop_state.iteration;

    let Some(decision) = state.decision.as_ref() else {
        return StepUpdate::fail(WorkflowError::InvalidDecision {
            kind: shared::ActionKind::Ignore,
            reason: "no decision to act on".to_string(),
        });
    };

    let kind = match ScopeEnforcer::new(scope).assert_permitted(&decision.action) {
        Ok(kind) => kind,
        Err(denied) => {
            tracing::warn!(run_id = %state.run_id, actor = %actor, error = %denied, "Decision rejected");
            return StepUpdate::fail(denied).consuming_decision();
        }
    };

    let action = match Action::from_parts(kind, decision.target_id.clone(), &decision.parameters) {
        Ok(action) => action,
        Err(reason) => {
            return StepUpdate::fail(WorkflowError::InvalidDecision { kind, reason }).consuming_decision();
        }
    };

    let record = |outcome| LoopRecord {
        iteration,
        decision: kind,
        outcome,
    };

    if kind.is_passive() {
        return StepUpdate::to(Step::LoopCheck)
            .consuming_decision()
            .with_loop_record(record(LoopOutcome::Passive));
    }

    let cost = state.loop_state.heat_cost_per_iteration;
    let heat = match ctx.heat.try_consume(actor, cost) {
        HeatDecision::Applied { new_heat, .. } => new_heat,
        HeatDecision::Blocked {
            current_heat,
            retry_after_secs,
        } => {
            tracing::info!(
                run_id = %state.run_id,
                actor = %actor,
                action = %kind,
                heat = current_heat,
                retry_after_secs,
                "Action skipped: actor over heat threshold"
            );
            return StepUpdate::to(Step::LoopCheck)
                .consuming_decision()
                .with_loop_record(record(LoopOutcome::HeatBlocked { heat: current_heat }));
        }
    };

    match ctx.guarded(ctx.mutator.execute(actor, &action)).await {
        Ok(outcome) => {
            tracing::info!(
                run_id = %state.run_id,
                actor = %actor,
                action = %kind,
                heat,
                summary = %outcome.summary,
                "Action executed"
            );
            StepUpdate::to(Step::LoopCheck)
                .consuming_decision()
                .with_executed(kind)
                .with_loop_record(record(LoopOutcome::Executed { heat }))
        }
        Err(error) => {
            ctx.heat.refund(actor, cost);
            tracing::warn!(
                run_id = %state.run_id,
                actor = %actor,
                action = %kind,
                error = %error,
                "Action failed"
            );
            StepUpdate::fail(WorkflowError::Mutation { kind, error }).consuming_decision()
        }
    }
}
