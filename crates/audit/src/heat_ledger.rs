//! HeatLedger - per-agent rate limiting with time decay

use crate::clock::{Clock, SystemClock};
use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::{ActorId, HeatConfig};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Heat state of one actor
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatRecord {
    pub actor_id: ActorId,

    /// Heat as of `settled_at`, always within `[0, cap]`
    pub current_heat: f64,

    pub last_action_at: Option<DateTime<Utc>>,

    /// When `current_heat` was last materialized; decay runs from here
    pub settled_at: DateTime<Utc>,
}

/// Result of an eligibility check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatCheck {
    pub allowed: bool,
    pub current_heat: f64,
    pub threshold: f64,
}

/// Result of an atomic check-and-apply
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeatDecision {
    Applied { previous: f64, new_heat: f64 },
    Blocked { current_heat: f64, retry_after_secs: u64 },
}

impl HeatDecision {
    pub fn is_applied(&self) -> bool {
        matches!(self, HeatDecision::Applied { .. })
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, HeatDecision::Blocked { .. })
    }

    /// Heat after the decision
    pub fn heat(&self) -> f64 {
        match self {
            HeatDecision::Applied { new_heat, .. } => *new_heat,
            HeatDecision::Blocked { current_heat, .. } => *current_heat,
        }
    }
}

/// Heat ledger shared by every run.
///
/// Decay is computed lazily on access. All reads and writes for every actor
/// go through one lock, so `try_consume` is an atomic check-then-apply.
#[derive(Debug)]
pub struct HeatLedger {
    config: HeatConfig,
    records: Mutex<HashMap<ActorId, HeatRecord>>,
    clock: Arc<dyn Clock>,
}

impl HeatLedger {
    /// Create a new HeatLedger on the wall clock
    pub fn new(config: HeatConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: HeatConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            records: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub fn config(&self) -> &HeatConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ActorId, HeatRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn clamp(&self, heat: f64) -> f64 {
        heat.clamp(0.0, self.config.cap)
    }

    fn decayed(&self, record: &HeatRecord, now: DateTime<Utc>) -> f64 {
        let elapsed_ms = (now - record.settled_at).num_milliseconds().max(0);
        let minutes = elapsed_ms as f64 / 60_000.0;
        self.clamp(record.current_heat - self.config.decay_per_minute * minutes)
    }

    /// Materialize decay for an actor and return its record
    fn settle<'m>(
        &self,
        records: &'m mut HashMap<ActorId, HeatRecord>,
        actor_id: &ActorId,
        now: DateTime<Utc>,
    ) -> &'m mut HeatRecord {
        let record = records
            .entry(actor_id.clone())
            .or_insert_with(|| HeatRecord {
                actor_id: actor_id.clone(),
                current_heat: 0.0,
                last_action_at: None,
                settled_at: now,
            });
        record.current_heat = self.decayed(record, now);
        record.settled_at = now;
        record
    }

    fn is_eligible(&self, heat: f64) -> bool {
        heat <= self.config.action_threshold
    }

    fn retry_after_secs(&self, heat: f64) -> u64 {
        if self.config.decay_per_minute <= 0.0 {
            return u64::MAX;
        }
        let excess = (heat - self.config.action_threshold).max(0.0);
        (excess / self.config.decay_per_minute * 60.0).ceil() as u64
    }

    /// Check whether an actor may act right now
    pub fn check_heat(&self, actor_id: &ActorId) -> HeatCheck {
        let now = self.clock.now();
        let records = self.lock();
        let current_heat = records
            .get(actor_id)
            .map(|r| self.decayed(r, now))
            .unwrap_or(0.0);

        HeatCheck {
            allowed: self.is_eligible(current_heat),
            current_heat,
            threshold: self.config.action_threshold,
        }
    }

    /// Add heat for an action and return the new value
    pub fn apply_heat(&self, actor_id: &ActorId, amount: f64) -> f64 {
        let now = self.clock.now();
        let mut records = self.lock();
        let record = self.settle(&mut records, actor_id, now);
        record.current_heat = self.clamp(record.current_heat + amount);
        record.last_action_at = Some(now);
        record.current_heat
    }

    /// Apply pending decay and return the decayed value
    pub fn decay(&self, actor_id: &ActorId) -> f64 {
        let now = self.clock.now();
        let mut records = self.lock();
        match records.get(actor_id) {
            Some(_) => self.settle(&mut records, actor_id, now).current_heat,
            None => 0.0,
        }
    }

    /// Atomically check eligibility and, if eligible, apply `amount`.
    ///
    /// Two runs racing for the same actor can never both pass the check
    /// on a stale value.
    pub fn try_consume(&self, actor_id: &ActorId, amount: f64) -> HeatDecision {
        let now = self.clock.now();
        let mut records = self.lock();
        let record = self.settle(&mut records, actor_id, now);
        let previous = record.current_heat;

        if !self.is_eligible(previous) {
            return HeatDecision::Blocked {
                current_heat: previous,
                retry_after_secs: self.retry_after_secs(previous),
            };
        }

        record.current_heat = self.clamp(previous + amount);
        record.last_action_at = Some(now);
        HeatDecision::Applied {
            previous,
            new_heat: record.current_heat,
        }
    }

    /// Give back heat reserved for an action that did not happen.
    ///
    /// Unlike a negative `apply_heat`, this leaves `last_action_at` alone.
    pub fn refund(&self, actor_id: &ActorId, amount: f64) -> f64 {
        let now = self.clock.now();
        let mut records = self.lock();
        match records.get(actor_id) {
            Some(_) => {
                let record = self.settle(&mut records, actor_id, now);
                record.current_heat = self.clamp(record.current_heat - amount);
                record.current_heat
            }
            None => 0.0,
        }
    }

    /// Overwrite an actor's heat (clamped)
    pub fn set_heat(&self, actor_id: &ActorId, heat: f64) {
        let now = self.clock.now();
        let mut records = self.lock();
        let record = self.settle(&mut records, actor_id, now);
        record.current_heat = self.clamp(heat);
    }

    /// Forget an actor's heat
    pub fn reset(&self, actor_id: &ActorId) {
        self.lock().remove(actor_id);
    }

    /// Forget all heat, returning how many records were cleared
    pub fn reset_all(&self) -> usize {
        let mut records = self.lock();
        let count = records.len();
        records.clear();
        count
    }

    /// Decayed view of every record, sorted by actor
    pub fn snapshot(&self) -> Vec<HeatRecord> {
        let now = self.clock.now();
        let records = self.lock();
        let mut snapshot: Vec<HeatRecord> = records
            .values()
            .map(|r| HeatRecord {
                current_heat: self.decayed(r, now),
                ..r.clone()
            })
            .collect();
        snapshot.sort_by(|a, b| a.actor_id.cmp(&b.actor_id));
        snapshot
    }
}
