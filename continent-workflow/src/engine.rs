//! Stepwise executor described in §4.3a: each step is a `Step` value with
//! its own schedule-to-close deadline; the engine wraps invocation in a
//! timeout and retries transient failures with exponential backoff,
//! mirroring this repo's substream retry loop (`ExponentialBackoff::from_millis`)
//! but scoped to a single step's own budget rather than an unbounded stream.
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{timeout, Instant};
use tokio_retry::strategy::ExponentialBackoff;
use tracing::{info, warn};

use crate::error::WorkflowError;

#[async_trait]
pub trait Step: Send + Sync {
    type Request: Clone + Send + Sync;
    type Response: Send;

    fn name(&self) -> &'static str;
    fn deadline(&self) -> Duration;
    async fn run(&self, req: Self::Request) -> Result<Self::Response, WorkflowError>;
}

pub struct WorkflowEngine;

impl WorkflowEngine {
    /// Runs `step` against `req`, retrying transient failures and timeouts
    /// with exponential backoff (starting at 200ms) until the step's
    /// schedule-to-close deadline is exhausted.
    pub async fn execute<S: Step>(step: &S, req: S::Request) -> Result<S::Response, WorkflowError> {
        let deadline = step.deadline();
        let start = Instant::now();
        let mut backoff = ExponentialBackoff::from_millis(200).max_delay(deadline);

        loop {
            let elapsed = start.elapsed();
            if elapsed >= deadline {
                warn!(step = step.name(), "schedule-to-close deadline exhausted");
                return Err(WorkflowError::DeadlineExceeded { step: step.name() });
            }
            let remaining = deadline - elapsed;

            match timeout(remaining, step.run(req.clone())).await {
                Ok(Ok(resp)) => {
                    info!(step = step.name(), "step completed");
                    return Ok(resp);
                }
                Ok(Err(err)) if err.is_terminal() => {
                    warn!(step = step.name(), %err, "step failed terminally");
                    return Err(err);
                }
                Ok(Err(err)) => {
                    warn!(step = step.name(), %err, "step failed transiently, retrying");
                }
                Err(_) => {
                    warn!(step = step.name(), "step attempt timed out, retrying");
                }
            }

            let remaining_after = deadline.saturating_sub(start.elapsed());
            if remaining_after.is_zero() {
                return Err(WorkflowError::DeadlineExceeded { step: step.name() });
            }
            let delay = backoff.next().unwrap_or(remaining_after).min(remaining_after);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
}
