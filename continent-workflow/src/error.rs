use thiserror::Error;

/// Errors surfaced by workflow steps. `is_terminal` decides whether the
/// engine retries (§4.3a).
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("checksum mismatch for {dataset_id}:{version}: existing {existing}, supplied {supplied}")]
    ChecksumMismatch {
        dataset_id: String,
        version: String,
        existing: String,
        supplied: String,
    },

    #[error("durable store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("hot cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("step {step} exceeded its schedule-to-close deadline")]
    DeadlineExceeded { step: &'static str },
}

impl WorkflowError {
    /// Terminal errors fail the workflow immediately; anything else is
    /// retried until the step's deadline is exhausted (§4.3a).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowError::InvalidInput(_) | WorkflowError::ChecksumMismatch { .. }
        )
    }
}
