//! Built-in job catalog

use super::{JobHandler, JobOutcome, Scheduler};
use crate::runner::WorkflowEngine;
use async_trait::async_trait;
use gateway::{ActorProfile, DataService};
use shared::{jobs, schedules, ActorId, EngineConfig, Trigger};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Per-actor results of a fan-out job
#[derive(Debug, Default)]
struct Tally {
    ok: usize,
    failed: usize,
}

impl Tally {
    fn outcome(&self) -> JobOutcome {
        let summary = format!(
            "{} actors: {} ok, {} failed",
            self.ok + self.failed,
            self.ok,
            self.failed
        );
        if self.failed == 0 {
            JobOutcome::ok(summary)
        } else {
            JobOutcome::failed(summary)
        }
    }
}

/// Run `work` once per actor.
///
/// With a pool, each task holds one of its permits while it works. Without
/// one, `work` must bound itself (engine dispatches take their own permit).
/// One actor failing never stops the others.
async fn fan_out<F, Fut>(actors: Vec<ActorProfile>, pool: Option<&Arc<Semaphore>>, work: F) -> Tally
where
    F: Fn(ActorId) -> Fut,
    Fut: Future<Output = Result<(), String>> + Send + 'static,
{
    let mut handles = Vec::with_capacity(actors.len());

    for actor in actors {
        let pool = pool.cloned();
        let fut = work(actor.id.clone());
        handles.push(tokio::spawn(async move {
            let _permit = match pool {
                Some(pool) => match pool.acquire_owned().await {
                    Ok(p) => Some(p),
                    Err(_) => return (actor.id, Err("worker pool closed".to_string())),
                },
                None => None,
            };
            (actor.id, fut.await)
        }));
    }

    let mut tally = Tally::default();
    for handle in handles {
        match handle.await {
            Ok((_, Ok(()))) => tally.ok += 1,
            Ok((actor, Err(e))) => {
                tracing::warn!(actor = %actor, error = %e, "Actor task failed");
                tally.failed += 1;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Actor task aborted");
                tally.failed += 1;
            }
        }
    }
    tally
}

async fn active_actors(data: &dyn DataService) -> Result<Vec<ActorProfile>, JobOutcome> {
    data.list_actors()
        .await
        .map(|actors| actors.into_iter().filter(|a| a.active).collect())
        .map_err(|e| JobOutcome::failed(format!("could not list actors: {}", e)))
}

/// Dispatches `schedule:agent_cycle` for every active actor whose heat is
/// under the action threshold
pub struct AgentCycleJob {
    engine: Arc<WorkflowEngine>,
}

impl AgentCycleJob {
    pub fn new(engine: Arc<WorkflowEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl JobHandler for AgentCycleJob {
    async fn run(&self) -> JobOutcome {
        let actors = match active_actors(self.engine.services().data.as_ref()).await {
            Ok(actors) => actors,
            Err(outcome) => return outcome,
        };
        let heat = self.engine.heat_ledger();
        let (eligible, cooling): (Vec<_>, Vec<_>) = actors
            .into_iter()
            .partition(|a| heat.check_heat(&a.id).allowed);
        if !cooling.is_empty() {
            tracing::debug!(skipped = cooling.len(), "Skipping actors over the heat threshold");
        }

        let tally = fan_out(eligible, None, |actor| {
            let engine = self.engine.clone();
            async move {
                let report = engine
                    .dispatch(Trigger::schedule(schedules::AGENT_CYCLE), actor, None)
                    .await
                    .map_err(|e| e.to_string())?;
                if report.success() {
                    Ok(())
                } else {
                    Err(report.summary())
                }
            }
        })
        .await;
        tally.outcome()
    }
}

/// Moves every active actor's relationships toward neutral
pub struct RelationshipDecayJob {
    data: Arc<dyn DataService>,
    pool: Arc<Semaphore>,
}

impl RelationshipDecayJob {
    pub fn new(data: Arc<dyn DataService>, pool: Arc<Semaphore>) -> Self {
        Self { data, pool }
    }
}

#[async_trait]
impl JobHandler for RelationshipDecayJob {
    async fn run(&self) -> JobOutcome {
        let actors = match active_actors(self.data.as_ref()).await {
            Ok(actors) => actors,
            Err(outcome) => return outcome,
        };
        let tally = fan_out(actors, Some(&self.pool), |actor| {
            let data = self.data.clone();
            async move {
                let changed = data.decay_relationships(&actor).await.map_err(|e| e.to_string())?;
                tracing::debug!(actor = %actor, changed, "Relationships decayed");
                Ok(())
            }
        })
        .await;
        tally.outcome()
    }
}

/// Drops each active actor's least important memories
pub struct MemoryCleanupJob {
    data: Arc<dyn DataService>,
    pool: Arc<Semaphore>,
}

impl MemoryCleanupJob {
    pub fn new(data: Arc<dyn DataService>, pool: Arc<Semaphore>) -> Self {
        Self { data, pool }
    }
}

#[async_trait]
impl JobHandler for MemoryCleanupJob {
    async fn run(&self) -> JobOutcome {
        let actors = match active_actors(self.data.as_ref()).await {
            Ok(actors) => actors,
            Err(outcome) => return outcome,
        };
        let tally = fan_out(actors, Some(&self.pool), |actor| {
            let data = self.data.clone();
            async move {
                let pruned = data.prune_memories(&actor).await.map_err(|e| e.to_string())?;
                tracing::debug!(actor = %actor, pruned, "Memories pruned");
                Ok(())
            }
        })
        .await;
        tally.outcome()
    }
}

/// Clears every actor's heat
pub struct TokenResetJob {
    engine: Arc<WorkflowEngine>,
}

impl TokenResetJob {
    pub fn new(engine: Arc<WorkflowEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl JobHandler for TokenResetJob {
    async fn run(&self) -> JobOutcome {
        let count = self.engine.heat_ledger().reset_all();
        JobOutcome::ok(format!("reset heat for {} actors", count))
    }
}

/// Register the built-in catalog using the configured cadences.
///
/// Jobs missing from the configuration are not registered; disabled jobs
/// are registered paused so they can still be triggered by hand.
pub fn register_default_jobs(scheduler: &Scheduler, config: &EngineConfig, engine: Arc<WorkflowEngine>) {
    let data = engine.services().data.clone();
    let pool = engine.worker_pool().clone();

    for name in jobs::ALL {
        let Some(schedule) = config.scheduler.jobs.get(name) else {
            tracing::debug!(job = name, "Job not configured, skipping");
            continue;
        };

        let handler: Arc<dyn JobHandler> = match name {
            jobs::AGENT_CYCLE => Arc::new(AgentCycleJob::new(engine.clone())),
            jobs::RELATIONSHIP_DECAY => Arc::new(RelationshipDecayJob::new(data.clone(), pool.clone())),
            jobs::MEMORY_CLEANUP => Arc::new(MemoryCleanupJob::new(data.clone(), pool.clone())),
            _ => Arc::new(TokenResetJob::new(engine.clone())),
        };

        scheduler.register_job(name, schedule.cadence(), handler);
        if !schedule.enabled {
            let _ = scheduler.set_enabled(name, false);
        }
    }
}
