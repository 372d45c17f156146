use super::StepContext;
use crate::state::{Step, StepUpdate, WorkflowState};
use scope::ScopeEnforcer;
use serde_json::Map;
use shared::WorkflowError;

/// Fetch every planned category through the scope enforcer.
///
/// The first undeclared category or failed fetch ends the run; nothing is
/// retried here.
pub async fn observe(state: &WorkflowState, ctx: &StepContext<'_>) -> StepUpdate {
    let scope = state.scope.as_ref();
    let enforcer = ScopeEnforcer::new(scope);
    let mut observations = Map::new();

    for category in ctx.handler.observations(scope) {
        let params = match enforcer.assert_visible(category) {
            Ok(params) => params,
            Err(violation) => return StepUpdate::fail(violation),
        };

        let fetched = ctx
            .guarded(ctx.data.fetch(scope.actor(), category, params, scope.subject()))
            .await;

        match fetched {
            Ok(value) => {
                observations.insert(category.as_str().to_string(), value);
            }
            Err(error) => {
                tracing::warn!(
                    run_id = %state.run_id,
                    actor = %scope.actor(),
                    category = %category,
                    error = %error,
                    "Observe fetch failed"
                );
                return StepUpdate::fail(WorkflowError::DataFetch { category, error });
            }
        }
    }

    StepUpdate::to(Step::Reason).with_metadata(observations)
}
