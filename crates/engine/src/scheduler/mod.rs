//! Scheduler - recurring jobs, manual triggers and run history

mod jobs;

pub use jobs::{
    register_default_jobs, AgentCycleJob, MemoryCleanupJob, RelationshipDecayJob, TokenResetJob,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::UnknownJobError;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Result of one job execution as seen by the job itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub success: bool,
    pub summary: String,
}

impl JobOutcome {
    pub fn ok(summary: impl Into<String>) -> Self {
        Self {
            success: true,
            summary: summary.into(),
        }
    }

    pub fn failed(summary: impl Into<String>) -> Self {
        Self {
            success: false,
            summary: summary.into(),
        }
    }
}

/// Work a scheduled job performs
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(&self) -> JobOutcome;
}

/// One job execution record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRun {
    pub job_name: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub success: bool,
    pub summary: String,
}

/// A registered job
#[derive(Clone)]
pub struct ScheduledJob {
    pub name: String,
    pub cadence: Duration,
    pub enabled: bool,
    handler: Arc<dyn JobHandler>,
    pub last_run: Option<DateTime<Utc>>,
    pub last_result: Option<JobRun>,
}

/// Public view of a registered job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    pub name: String,
    pub cadence_secs: u64,
    pub enabled: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub last_success: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub running: bool,
    pub active_jobs: Vec<JobInfo>,

    /// Most recent first
    pub job_history: Vec<JobRun>,
}

struct Ticking {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

struct SchedulerInner {
    jobs: Mutex<BTreeMap<String, ScheduledJob>>,
    history: Mutex<VecDeque<JobRun>>,
    history_limit: usize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl SchedulerInner {
    fn job(&self, name: &str) -> Result<ScheduledJob, UnknownJobError> {
        let jobs = lock(&self.jobs);
        jobs.get(name).cloned().ok_or_else(|| UnknownJobError {
            job: name.to_string(),
            available: jobs.keys().cloned().collect(),
        })
    }

    async fn execute(&self, job: &ScheduledJob) -> JobRun {
        let started_at = Utc::now();
        let started = Instant::now();
        tracing::info!(job = %job.name, "Job started");

        // Spawned so a panicking handler fails the run, not the scheduler
        let handler = job.handler.clone();
        let outcome = match tokio::spawn(async move { handler.run().await }).await {
            Ok(outcome) => outcome,
            Err(e) => JobOutcome::failed(format!("job aborted: {}", e)),
        };

        let run = JobRun {
            job_name: job.name.clone(),
            started_at,
            duration_ms: started.elapsed().as_millis() as u64,
            success: outcome.success,
            summary: outcome.summary,
        };
        self.record(&run);

        if run.success {
            tracing::info!(job = %run.job_name, duration_ms = run.duration_ms, summary = %run.summary, "Job finished");
        } else {
            tracing::warn!(job = %run.job_name, duration_ms = run.duration_ms, summary = %run.summary, "Job failed");
        }
        run
    }

    fn record(&self, run: &JobRun) {
        if let Some(job) = lock(&self.jobs).get_mut(&run.job_name) {
            job.last_run = Some(run.started_at);
            job.last_result = Some(run.clone());
        }

        let mut history = lock(&self.history);
        history.push_front(run.clone());
        history.truncate(self.history_limit);
    }
}

/// Owns the job registry, the tick loops and the run history.
///
/// Several schedulers can coexist; nothing here is global.
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
    ticking: Mutex<Option<Ticking>>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("jobs", &self.job_names())
            .field("running", &self.is_running())
            .finish()
    }
}

impl Scheduler {
    pub fn new(history_limit: usize) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                jobs: Mutex::new(BTreeMap::new()),
                history: Mutex::new(VecDeque::new()),
                history_limit: history_limit.max(1),
            }),
            ticking: Mutex::new(None),
        }
    }

    /// Register a job, replacing any job with the same name.
    ///
    /// Jobs registered while running start ticking on the next `start`.
    pub fn register_job(
        &self,
        name: impl Into<String>,
        cadence: Duration,
        handler: Arc<dyn JobHandler>,
    ) {
        let name = name.into();
        lock(&self.inner.jobs).insert(
            name.clone(),
            ScheduledJob {
                name,
                cadence,
                enabled: true,
                handler,
                last_run: None,
                last_result: None,
            },
        );
    }

    /// Enable or pause a job's cadence. Paused jobs can still be triggered.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<(), UnknownJobError> {
        let mut jobs = lock(&self.inner.jobs);
        match jobs.get_mut(name) {
            Some(job) => {
                job.enabled = enabled;
                Ok(())
            }
            None => Err(UnknownJobError {
                job: name.to_string(),
                available: jobs.keys().cloned().collect(),
            }),
        }
    }

    pub fn job_names(&self) -> Vec<String> {
        lock(&self.inner.jobs).keys().cloned().collect()
    }

    pub fn is_running(&self) -> bool {
        lock(&self.ticking).is_some()
    }

    /// Start one tick loop per enabled job. Returns false if already running.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(&self) -> bool {
        let mut ticking = lock(&self.ticking);
        if ticking.is_some() {
            return false;
        }

        let token = CancellationToken::new();
        let jobs: Vec<ScheduledJob> = lock(&self.inner.jobs)
            .values()
            .filter(|j| j.enabled)
            .cloned()
            .collect();

        let handles = jobs
            .into_iter()
            .map(|job| {
                let inner = self.inner.clone();
                let token = token.clone();
                tokio::spawn(async move {
                    let first = tokio::time::Instant::now() + job.cadence;
                    let mut interval = tokio::time::interval_at(first, job.cadence);
                    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                    loop {
                        tokio::select! {
                            _ = token.cancelled() => break,
                            _ = interval.tick() => {
                                inner.execute(&job).await;
                            }
                        }
                    }
                })
            })
            .collect::<Vec<_>>();

        tracing::info!(jobs = handles.len(), "Scheduler started");
        *ticking = Some(Ticking { token, handles });
        true
    }

    /// Stop every tick loop and wait for them to exit
    pub async fn stop(&self) {
        let Some(ticking) = lock(&self.ticking).take() else {
            return;
        };
        ticking.token.cancel();
        for handle in ticking.handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Job loop ended abnormally");
            }
        }
        tracing::info!("Scheduler stopped");
    }

    /// Run a job now, outside its cadence.
    ///
    /// An unknown name yields an unsuccessful run that is not recorded in
    /// history.
    pub async fn trigger_job(&self, name: &str) -> JobRun {
        match self.inner.job(name) {
            Ok(job) => self.inner.execute(&job).await,
            Err(e) => {
                tracing::warn!(job = %name, error = %e, "Manual trigger ignored");
                JobRun {
                    job_name: name.to_string(),
                    started_at: Utc::now(),
                    duration_ms: 0,
                    success: false,
                    summary: e.to_string(),
                }
            }
        }
    }

    pub fn status(&self) -> SchedulerStatus {
        let active_jobs = lock(&self.inner.jobs)
            .values()
            .map(|j| JobInfo {
                name: j.name.clone(),
                cadence_secs: j.cadence.as_secs(),
                enabled: j.enabled,
                last_run: j.last_run,
                last_success: j.last_result.as_ref().map(|r| r.success),
            })
            .collect();

        SchedulerStatus {
            running: self.is_running(),
            active_jobs,
            job_history: lock(&self.inner.history).iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingJob {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl JobHandler for CountingJob {
        async fn run(&self) -> JobOutcome {
            let n = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            JobOutcome::ok(format!("run {}", n))
        }
    }

    struct PanickingJob;

    #[async_trait]
    impl JobHandler for PanickingJob {
        async fn run(&self) -> JobOutcome {
            panic!("boom")
        }
    }

    // ============== Manual Trigger Tests ==============

    #[tokio::test]
    async fn test_trigger_job_records_history() {
        let scheduler = Scheduler::new(10);
        let job = Arc::new(CountingJob::default());
        scheduler.register_job("count", Duration::from_secs(60), job.clone());

        let run = scheduler.trigger_job("count").await;
        assert!(run.success);
        assert_eq!(run.summary, "run 1");

        let status = scheduler.status();
        assert_eq!(status.job_history.len(), 1);
        assert_eq!(status.active_jobs[0].last_success, Some(true));
    }

    #[tokio::test]
    async fn test_unknown_job_leaves_history_alone() {
        let scheduler = Scheduler::new(10);
        scheduler.register_job("count", Duration::from_secs(60), Arc::new(CountingJob::default()));
        scheduler.trigger_job("count").await;
        let before = scheduler.status().job_history;

        let run = scheduler.trigger_job("nope").await;
        assert!(!run.success);
        assert!(run.summary.contains("Available jobs: count"));
        assert_eq!(scheduler.status().job_history, before);
    }

    #[tokio::test]
    async fn test_history_is_bounded_and_recent_first() {
        let scheduler = Scheduler::new(2);
        scheduler.register_job("count", Duration::from_secs(60), Arc::new(CountingJob::default()));
        for _ in 0..3 {
            scheduler.trigger_job("count").await;
        }

        let history = scheduler.status().job_history;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].summary, "run 3");
        assert_eq!(history[1].summary, "run 2");
    }

    #[tokio::test]
    async fn test_panicking_job_is_isolated() {
        let scheduler = Scheduler::new(10);
        scheduler.register_job("bad", Duration::from_secs(60), Arc::new(PanickingJob));

        let run = scheduler.trigger_job("bad").await;
        assert!(!run.success);
        assert!(run.summary.contains("job aborted"));
    }

    // ============== Lifecycle Tests ==============

    #[tokio::test(start_paused = true)]
    async fn test_cadence_fires_until_stopped() {
        let scheduler = Scheduler::new(100);
        let job = Arc::new(CountingJob::default());
        scheduler.register_job("count", Duration::from_secs(60), job.clone());

        assert!(scheduler.start());
        assert!(!scheduler.start());
        assert!(scheduler.status().running);

        tokio::time::sleep(Duration::from_secs(185)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 3);

        scheduler.stop().await;
        assert!(!scheduler.is_running());

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_job_does_not_tick() {
        let scheduler = Scheduler::new(100);
        let job = Arc::new(CountingJob::default());
        scheduler.register_job("count", Duration::from_secs(60), job.clone());
        scheduler.set_enabled("count", false).unwrap();
        assert!(scheduler.set_enabled("missing", false).is_err());

        scheduler.start();
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 0);

        assert!(scheduler.trigger_job("count").await.success);
        scheduler.stop().await;
    }
}
