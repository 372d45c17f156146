//! # Ember Audit
//!
//! Heat (per-agent rate limiting) and workflow run tracing.

mod clock;
mod heat_ledger;
mod tracer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use heat_ledger::{HeatCheck, HeatDecision, HeatLedger, HeatRecord};
pub use tracer::{
    InMemoryTraceSink, TraceEnd, TraceEntry, TraceError, TraceId, TraceSink, TraceStart,
    TraceStats, Tracer,
};
