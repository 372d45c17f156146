//! WorkflowEngine - runs one trigger for one actor, start to finish

use crate::router::TriggerRouter;
use crate::state::{LoopRecord, LoopState, Step, WorkflowState};
use crate::steps::{act, loop_check, observe, reason, StepContext};
use crate::workflow::{ScopeRequest, WorkflowHandler};
use audit::{HeatLedger, TraceEnd, TraceId, TraceStart, Tracer};
use chrono::{DateTime, Utc};
use gateway::{DataService, Mutator, ReasoningOracle};
use scope::WorkflowScope;
use serde::{Serialize, Serializer};
use shared::{
    ActionKind, ActorId, EngineConfig, EntityId, RunId, SafetyStopError, ScopeConstructionError,
    Trigger, WorkflowError,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::{OwnedMutexGuard, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

/// External collaborators of the engine
#[derive(Clone)]
pub struct Services {
    pub data: Arc<dyn DataService>,
    pub oracle: Arc<dyn ReasoningOracle>,
    pub mutator: Arc<dyn Mutator>,
}

impl Services {
    pub fn new(
        data: Arc<dyn DataService>,
        oracle: Arc<dyn ReasoningOracle>,
        mutator: Arc<dyn Mutator>,
    ) -> Self {
        Self {
            data,
            oracle,
            mutator,
        }
    }
}

/// Outcome of one dispatched run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: RunId,
    pub trigger: Trigger,
    pub actor: ActorId,
    pub subject: Option<EntityId>,
    pub executed_actions: Vec<ActionKind>,
    #[serde(serialize_with = "serialize_errors")]
    pub errors: Vec<WorkflowError>,
    pub iterations: u32,
    pub decisions: Vec<LoopRecord>,
    pub steps: Vec<Step>,
    pub duration_ms: u64,
    pub trace_id: Option<TraceId>,
}

impl RunReport {
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    /// One-line description for logs and job summaries
    pub fn summary(&self) -> String {
        let actions = if self.executed_actions.is_empty() {
            "no actions".to_string()
        } else {
            self.executed_actions
                .iter()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        match self.errors.first() {
            None => format!("{} for {}: {}", self.trigger, self.actor, actions),
            Some(e) => format!("{} for {}: {} ({})", self.trigger, self.actor, actions, e),
        }
    }
}

fn serialize_errors<S: Serializer>(errors: &[WorkflowError], serializer: S) -> Result<S::Ok, S::Error> {
    let entries: Vec<_> = errors
        .iter()
        .map(|e| serde_json::json!({ "code": e.code(), "message": e.to_string() }))
        .collect();
    entries.serialize(serializer)
}

/// Cancels a token once the run deadline passes
struct DeadlineGuard(tokio::task::JoinHandle<()>);

impl DeadlineGuard {
    fn arm(token: CancellationToken, deadline: std::time::Duration) -> Self {
        Self(tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            token.cancel();
        }))
    }
}

impl Drop for DeadlineGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

type ActorLocks = Mutex<HashMap<ActorId, Arc<tokio::sync::Mutex<()>>>>;

/// One actor's turn on the engine.
///
/// Holds the actor's lock and a worker permit. Dropping it frees both and
/// forgets the lock once nobody else is queued on it.
struct ActorTurn<'a> {
    locks: &'a ActorLocks,
    actor: ActorId,
    lock: Arc<tokio::sync::Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
    permit: Option<OwnedSemaphorePermit>,
}

impl Drop for ActorTurn<'_> {
    fn drop(&mut self) {
        self.permit.take();
        self.guard.take();
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // The map's handle plus ours
        let idle = Arc::strong_count(&self.lock) == 2;
        if idle && locks.get(&self.actor).is_some_and(|l| Arc::ptr_eq(l, &self.lock)) {
            locks.remove(&self.actor);
        }
    }
}

/// Runs workflows.
///
/// Runs for different actors proceed in parallel, at most
/// `run.workerPoolSize` at a time; runs for the same actor are queued
/// behind a per-actor lock.
pub struct WorkflowEngine {
    config: Arc<EngineConfig>,
    router: TriggerRouter,
    services: Services,
    heat: Arc<HeatLedger>,
    tracer: Tracer,
    workers: Arc<Semaphore>,
    actor_locks: ActorLocks,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("router", &self.router)
            .field("tracer", &self.tracer)
            .finish_non_exhaustive()
    }
}

impl WorkflowEngine {
    /// Create an engine with the built-in workflows and a fresh heat ledger
    pub fn new(config: EngineConfig, services: Services) -> Self {
        let router = TriggerRouter::with_defaults(&config);
        let heat = Arc::new(HeatLedger::new(config.heat.clone()));
        let workers = Arc::new(Semaphore::new(config.run.worker_pool_size.max(1)));
        Self {
            config: Arc::new(config),
            router,
            services,
            heat,
            tracer: Tracer::disabled(),
            workers,
            actor_locks: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Builder: replace the router
    pub fn with_router(mut self, router: TriggerRouter) -> Self {
        self.router = router;
        self
    }

    /// Builder: share an existing heat ledger
    pub fn with_heat_ledger(mut self, heat: Arc<HeatLedger>) -> Self {
        self.heat = heat;
        self
    }

    /// Builder: trace runs
    pub fn with_tracer(mut self, tracer: Tracer) -> Self {
        self.tracer = tracer;
        self
    }

    // ========== Getters ==========

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn router(&self) -> &TriggerRouter {
        &self.router
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn heat_ledger(&self) -> &Arc<HeatLedger> {
        &self.heat
    }

    /// Worker pool shared by every run and by maintenance jobs
    pub fn worker_pool(&self) -> &Arc<Semaphore> {
        &self.workers
    }

    /// Token cancelled by [`WorkflowEngine::shutdown`]
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Cancel every in-flight and future run
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Wait for the actor's lock, then for a worker.
    ///
    /// Runs queued behind the same actor never hold a worker.
    async fn take_turn(&self, actor: &ActorId) -> shared::Result<ActorTurn<'_>> {
        let lock = {
            let mut locks = self.actor_locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(actor.clone()).or_default().clone()
        };
        let mut turn = ActorTurn {
            locks: &self.actor_locks,
            actor: actor.clone(),
            lock,
            guard: None,
            permit: None,
        };
        turn.guard = Some(turn.lock.clone().lock_owned().await);
        let permit = self
            .workers
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| shared::EngineError::Other("worker pool closed".to_string()))?;
        turn.permit = Some(permit);
        Ok(turn)
    }

    /// Actors with a lock entry; idle actors are forgotten
    pub fn tracked_actors(&self) -> usize {
        self.actor_locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Route a trigger and run its workflow for one actor.
    ///
    /// Only an unknown trigger (or a closed worker pool) is an error here;
    /// everything that goes wrong inside the run is recorded in the report.
    pub async fn dispatch(
        &self,
        trigger: Trigger,
        actor: ActorId,
        subject: Option<EntityId>,
    ) -> shared::Result<RunReport> {
        let handler = self.router.route(&trigger).map_err(|e| {
            tracing::warn!(trigger = %trigger, actor = %actor, error = %e, "Dropping run");
            e
        })?;

        let _turn = self.take_turn(&actor).await?;

        Ok(self.run(handler.as_ref(), trigger, actor, subject).await)
    }

    async fn run(
        &self,
        handler: &dyn WorkflowHandler,
        trigger: Trigger,
        actor: ActorId,
        subject: Option<EntityId>,
    ) -> RunReport {
        let run_id = RunId::generate();
        let started = Instant::now();
        let started_at = Utc::now();
        let cancel = self.shutdown.child_token();
        let _deadline = DeadlineGuard::arm(cancel.clone(), self.config.run.run_deadline());

        tracing::debug!(run_id = %run_id, trigger = %trigger, actor = %actor, "Run started");

        let scope = match self.build_scope(handler, &trigger, &actor, subject.as_ref(), &cancel).await {
            Ok(scope) => Arc::new(scope),
            Err(e) => {
                tracing::warn!(run_id = %run_id, trigger = %trigger, actor = %actor, error = %e, "Scope construction failed");
                let error = WorkflowError::from(e);
                let duration_ms = started.elapsed().as_millis() as u64;
                let start = TraceStart {
                    run_id,
                    trigger: trigger.clone(),
                    actor: actor.clone(),
                    subject: subject.clone(),
                    allowed_actions: Vec::new(),
                    started_at,
                };
                let trace_id = self.tracer.start(&start).await;
                self.tracer
                    .end(
                        trace_id.as_ref(),
                        &TraceEnd {
                            success: false,
                            duration_ms,
                            executed_actions: Vec::new(),
                            error_codes: vec![error.code().to_string()],
                        },
                    )
                    .await;
                return RunReport {
                    run_id,
                    trigger,
                    actor,
                    subject,
                    executed_actions: Vec::new(),
                    errors: vec![error],
                    iterations: 0,
                    decisions: Vec::new(),
                    steps: Vec::new(),
                    duration_ms,
                    trace_id,
                };
            }
        };

        let trace_id = self.tracer.start(&trace_start(run_id, &scope, started_at)).await;

        let settings = handler.loop_settings();
        let mut state = WorkflowState::new(
            run_id,
            scope,
            LoopState::new(settings.max_iterations, settings.heat_cost_per_iteration),
        );

        let ctx = StepContext {
            handler,
            data: self.services.data.as_ref(),
            oracle: self.services.oracle.as_ref(),
            mutator: self.services.mutator.as_ref(),
            heat: self.heat.as_ref(),
            cancel: &cancel,
            step_timeout: self.config.run.step_timeout(),
            max_loop_safety: self.config.loop_config.max_loop_safety,
            model: self.config.oracle.model.as_deref(),
        };
        drive(&mut state, &ctx).await;

        let duration_ms = started.elapsed().as_millis() as u64;
        self.tracer
            .end(
                trace_id.as_ref(),
                &TraceEnd {
                    success: state.errors.is_empty(),
                    duration_ms,
                    executed_actions: state.executed_actions.clone(),
                    error_codes: state.errors.iter().map(|e| e.code().to_string()).collect(),
                },
            )
            .await;

        let report = RunReport {
            run_id,
            trigger,
            actor,
            subject,
            executed_actions: state.executed_actions,
            errors: state.errors,
            iterations: state.loop_state.iteration,
            decisions: state.loop_state.history,
            steps: state.step_trace,
            duration_ms,
            trace_id,
        };
        tracing::info!(
            run_id = %report.run_id,
            trigger = %report.trigger,
            actor = %report.actor,
            success = report.success(),
            actions = report.executed_actions.len(),
            duration_ms,
            "Run finished"
        );
        report
    }

    async fn build_scope(
        &self,
        handler: &dyn WorkflowHandler,
        trigger: &Trigger,
        actor: &ActorId,
        subject: Option<&EntityId>,
        cancel: &CancellationToken,
    ) -> Result<WorkflowScope, ScopeConstructionError> {
        let request = ScopeRequest {
            trigger,
            actor,
            subject,
            heat: self.heat.check_heat(actor),
        };
        let timeout = self.config.run.step_timeout();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(request.error("cancelled")),
            built = tokio::time::timeout(timeout, handler.build_scope(&request, self.services.data.as_ref())) => {
                built.unwrap_or_else(|_| {
                    Err(request.error(format!("timed out after {}ms", timeout.as_millis())))
                })
            }
        }
    }
}

fn trace_start(run_id: RunId, scope: &WorkflowScope, started_at: DateTime<Utc>) -> TraceStart {
    TraceStart {
        run_id,
        trigger: scope.trigger().clone(),
        actor: scope.actor().clone(),
        subject: scope.subject().cloned(),
        allowed_actions: scope.allowed_actions().iter().copied().collect(),
        started_at,
    }
}

/// Drive the state machine until it completes.
///
/// Besides the loop check's own ceiling, the number of steps is capped so a
/// broken transition can never spin forever.
pub async fn drive(state: &mut WorkflowState, ctx: &StepContext<'_>) {
    let step_budget = (ctx.max_loop_safety as usize + 1) * 4;

    loop {
        if state.step_trace.len() >= step_budget && !state.is_complete() {
            tracing::error!(
                run_id = %state.run_id,
                steps = state.step_trace.len(),
                "SAFETY STOP: step budget exhausted"
            );
            state.errors.push(
                SafetyStopError {
                    iteration: state.loop_state.iteration,
                    ceiling: ctx.max_loop_safety,
                }
                .into(),
            );
            state.step = Step::Complete;
        }

        let update = match state.step {
            Step::Observe => observe(state, ctx).await,
            Step::Reason => reason(state, ctx).await,
            Step::Act => act(state, ctx).await,
            Step::LoopCheck => loop_check(state, ctx),
            Step::Complete => break,
        };
        state.apply(update);
    }
}
