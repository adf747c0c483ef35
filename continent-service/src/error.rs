use thiserror::Error;

/// Errors surfaced by the four external contracts (§6). Library code
/// returns this; only a hosting binary's `main` would `anyhow::Context`
/// and unwrap it — this workspace has no such binary (§1, Non-goals).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("row count {n_rows} exceeds the maximum of {max}")]
    RowCountExceeded { n_rows: usize, max: usize },

    #[error("{dataset_id}:{version} not found or not ready")]
    NotFound { dataset_id: String, version: String },

    #[error(transparent)]
    Workflow(#[from] continent_workflow::WorkflowError),

    #[error("durable store error: {0}")]
    Store(String),

    #[error("hot cache error: {0}")]
    Cache(String),

    #[error("malformed cache payload: {0}")]
    MalformedCachePayload(String),
}
