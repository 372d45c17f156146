//! The four steps of one iteration.
//!
//! Each step reads the run state and returns a [`StepUpdate`](crate::StepUpdate);
//! none of them mutate the state directly. Observe, Reason and Act may
//! block on external calls, always under the step timeout and the run's
//! cancellation token. LoopCheck never blocks.

mod act;
mod loop_check;
mod observe;
mod reason;

pub use act::act;
pub use loop_check::loop_check;
pub use observe::observe;
pub use reason::reason;

use crate::workflow::WorkflowHandler;
use audit::HeatLedger;
use gateway::{DataService, Mutator, ReasoningOracle};
use shared::ServiceError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Everything a step may touch besides the run state
#[derive(Clone, Copy)]
pub struct StepContext<'a> {
    pub handler: &'a dyn WorkflowHandler,
    pub data: &'a dyn DataService,
    pub oracle: &'a dyn ReasoningOracle,
    pub mutator: &'a dyn Mutator,
    pub heat: &'a HeatLedger,
    pub cancel: &'a CancellationToken,
    pub step_timeout: Duration,
    pub max_loop_safety: u32,
    pub model: Option<&'a str>,
}

impl StepContext<'_> {
    /// Run an external call under the step timeout and cancellation token
    pub async fn guarded<T>(
        &self,
        call: impl Future<Output = Result<T, ServiceError>>,
    ) -> Result<T, ServiceError> {
        if self.cancel.is_cancelled() {
            return Err(ServiceError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ServiceError::Cancelled),
            result = tokio::time::timeout(self.step_timeout, call) => match result {
                Ok(result) => result,
                Err(_) => Err(ServiceError::Timeout(self.step_timeout.as_millis() as u64)),
            },
        }
    }
}
