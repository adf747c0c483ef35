//! The facade that exposes this workspace's four external contracts (§6)
//! over the ingest and projection workflows. No HTTP handler lives here —
//! per §1, the request surface is an external collaborator addressed only
//! through this crate's boundary.

pub mod error;
pub mod service;
pub mod settings;

pub use error::ServiceError;
pub use service::{ContextSet, ContinentService, IngestStarted, SnapshotResponse, SnapshotSource};
pub use settings::Settings;
