use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] diesel_async::pooled_connection::deadpool::PoolError),

    #[error("checksum mismatch for {dataset_id}:{version}: existing ready version has checksum {existing}, got {supplied}")]
    ChecksumMismatch { dataset_id: String, version: String, existing: String, supplied: String },

    #[error("{dataset_id}:{version} not found or not ready")]
    NotFound { dataset_id: String, version: String },

    #[error("migration error: {0}")]
    Migration(#[from] Box<dyn std::error::Error + Send + Sync>),
}
