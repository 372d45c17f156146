use super::StepContext;
use crate::state::{Step, StepUpdate, WorkflowState};
use gateway::OracleRequest;
use serde_json::Value;
use shared::WorkflowError;

/// Ask the oracle for one decision
pub async fn reason(state: &WorkflowState, ctx: &StepContext<'_>) -> StepUpdate {
    let scope = state.scope.as_ref();
    let request = OracleRequest {
        actor: scope.actor().clone(),
        trigger: scope.trigger().clone(),
        iteration: state.loop_state.iteration,
        available_actions: scope.allowed_actions().iter().copied().collect(),
        context: scope.context_data().clone(),
        observations: Value::Object(state.metadata.clone()),
        model: ctx.model.map(str::to_string),
    };

    match ctx.guarded(ctx.oracle.decide(&request)).await {
        Ok(decision) => {
            tracing::debug!(
                run_id = %state.run_id,
                actor = %scope.actor(),
                action = %decision.action,
                confidence = ?decision.confidence,
                "Oracle decided"
            );
            StepUpdate::to(Step::Act).with_decision(decision)
        }
        Err(error) => {
            tracing::warn!(
                run_id = %state.run_id,
                actor = %scope.actor(),
                error = %error,
                "Oracle call failed"
            );
            StepUpdate::fail(WorkflowError::Oracle(error))
        }
    }
}
