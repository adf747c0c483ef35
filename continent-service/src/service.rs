//! The four external contracts (§6) as a facade over the workflow engine
//! and the C1/C2 trait boundaries. There is no HTTP handler in this
//! workspace (§1) — this facade *is* the externally addressable surface.
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::warn;

use continent_cache::RedisHotCache;
use continent_core::canonical::checksum_of;
use continent_core::keys;
use continent_core::model::{
    DeltaRecord, PackagedSnapshot, Row, UserContext, VersionInfo, VersionStatus, CACHE_TTL_SECONDS,
    MAX_ROWS,
};
use continent_core::traits::{DurableStore, HotCache};
use continent_storage::PostgresGateway;
use continent_workflow::ingest::IngestRequest;
use continent_workflow::projection::{ProjectViewOutcome, ProjectionRequest};
use continent_workflow::{IngestWorkflow, ProjectionWorkflow};

use crate::error::ServiceError;
use crate::settings::Settings;

/// Default/maximum page size for `list_versions` (§6 item 3).
const DEFAULT_LIST_LIMIT: u32 = 10;
const MAX_LIST_LIMIT: u32 = 100;

/// Result of `start_ingest` (§6 item 1).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IngestStarted {
    pub workflow_id: String,
    pub version: String,
    pub checksum: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
    Cache,
    Database,
}

/// Result of `get_snapshot` (§6 item 2).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotResponse {
    pub source: SnapshotSource,
    pub data: PackagedSnapshot,
}

/// Result of `set_context` (§6 item 4): the projection workflow's outcome,
/// with the `workflow_id` it ran under attached for the caller's logs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContextSet {
    pub workflow_id: String,
    pub outcome: ProjectViewOutcome,
}

fn store_err<E: std::error::Error>(err: E) -> ServiceError {
    ServiceError::Store(err.to_string())
}

fn cache_err<E: std::error::Error>(err: E) -> ServiceError {
    ServiceError::Cache(err.to_string())
}

/// The externally addressable surface (§6), generic over the C1/C2 trait
/// boundaries so tests can swap in `continent_workflow::test_support`'s
/// in-memory fakes instead of a real Postgres + Redis pair.
pub struct ContinentService<D, C> {
    store: Arc<D>,
    cache: Arc<C>,
    ingest: IngestWorkflow<D, C>,
    projection: ProjectionWorkflow<D, C>,
    /// Bounds concurrent workflow executions to `Settings::worker_concurrency`
    /// (§5: "a bounded worker pool ... services workflow executions").
    permits: Arc<Semaphore>,
}

impl<D: DurableStore, C: HotCache> ContinentService<D, C> {
    pub fn new(store: Arc<D>, cache: Arc<C>, worker_concurrency: usize) -> Self {
        let ingest = IngestWorkflow::new(store.clone(), cache.clone());
        let projection = ProjectionWorkflow::new(store.clone(), cache.clone());
        Self {
            store,
            cache,
            ingest,
            projection,
            permits: Arc::new(Semaphore::new(worker_concurrency.max(1))),
        }
    }

    /// §6 item 1: computes the checksum and version identifier, then runs
    /// the ingest workflow to completion.
    pub async fn start_ingest(&self, dataset_id: &str, rows: Vec<Row>) -> Result<IngestStarted, ServiceError> {
        if dataset_id.is_empty() {
            return Err(ServiceError::InvalidInput("dataset_id must not be empty".into()));
        }
        if rows.is_empty() {
            return Err(ServiceError::InvalidInput("rows must not be empty".into()));
        }
        if rows.len() > MAX_ROWS {
            return Err(ServiceError::RowCountExceeded { n_rows: rows.len(), max: MAX_ROWS });
        }

        let ts = chrono::Utc::now().timestamp();
        let checksum = checksum_of(&rows);
        let version = format!("v{ts}.{}", &checksum[..8]);
        let workflow_id = format!("continent-{dataset_id}-{version}-{ts}");

        let _permit = self.permits.clone().acquire_owned().await.expect("semaphore is never closed");
        self.ingest
            .run(IngestRequest {
                dataset_id: dataset_id.to_owned(),
                version: version.clone(),
                checksum: checksum.clone(),
                rows,
                ts,
            })
            .await?;

        Ok(IngestStarted { workflow_id, version, checksum })
    }

    /// §6 item 2: cache-first read with database fallback; populates the
    /// cache on a miss before returning.
    pub async fn get_snapshot(
        &self,
        dataset_id: &str,
        version: Option<&str>,
    ) -> Result<SnapshotResponse, ServiceError> {
        let resolved_version = match version {
            Some(v) => v.to_owned(),
            None => match self.cache.get(&keys::latest(dataset_id)).await.map_err(cache_err)? {
                Some(bytes) => String::from_utf8(bytes)
                    .map_err(|_| ServiceError::MalformedCachePayload("latest-version key is not UTF-8".into()))?,
                None => self
                    .store
                    .latest_ready_version(dataset_id, None)
                    .await
                    .map_err(store_err)?
                    .ok_or_else(|| ServiceError::NotFound {
                        dataset_id: dataset_id.to_owned(),
                        version: "latest".to_owned(),
                    })?,
            },
        };

        if let Some(bytes) = self.cache.get(&keys::snapshot(dataset_id, &resolved_version)).await.map_err(cache_err)? {
            let snapshot: PackagedSnapshot = serde_json::from_slice(&bytes)
                .map_err(|err| ServiceError::MalformedCachePayload(err.to_string()))?;
            return Ok(SnapshotResponse { source: SnapshotSource::Cache, data: snapshot });
        }

        let record = self
            .store
            .get_version(dataset_id, &resolved_version)
            .await
            .map_err(store_err)?
            .filter(|v| v.status == VersionStatus::Ready)
            .ok_or_else(|| ServiceError::NotFound {
                dataset_id: dataset_id.to_owned(),
                version: resolved_version.clone(),
            })?;
        let rows = self.store.get_rows(dataset_id, &resolved_version).await.map_err(store_err)?;
        let snapshot = PackagedSnapshot {
            version: record.version.clone(),
            checksum: record.checksum.clone(),
            ts: record.ts,
            count: rows.len(),
            rows,
            parent_version: record.parent_version.clone(),
            diff_checksum: record.diff_checksum.clone(),
        };

        let payload = serde_json::to_vec(&snapshot).expect("PackagedSnapshot always serializes");
        if let Err(err) = self
            .cache
            .set_with_ttl(&keys::snapshot(dataset_id, &resolved_version), &payload, CACHE_TTL_SECONDS)
            .await
        {
            warn!(dataset_id, version = %resolved_version, %err, "failed to populate snapshot cache after database read");
        }
        if let Err(err) = self
            .cache
            .set_with_ttl(&keys::latest(dataset_id), resolved_version.as_bytes(), CACHE_TTL_SECONDS)
            .await
        {
            warn!(dataset_id, version = %resolved_version, %err, "failed to populate latest-version cache after database read");
        }

        Ok(SnapshotResponse { source: SnapshotSource::Database, data: snapshot })
    }

    /// §6 item 3: the newest `limit` (default 10, max 100) `ready` versions.
    pub async fn list_versions(&self, dataset_id: &str, limit: Option<u32>) -> Result<Vec<VersionInfo>, ServiceError> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        self.store.list_ready_versions(dataset_id, limit).await.map_err(store_err)
    }

    /// §6 item 3.
    pub async fn get_deltas(&self, dataset_id: &str, version: &str) -> Result<Vec<DeltaRecord>, ServiceError> {
        self.store.get_deltas(dataset_id, version).await.map_err(store_err)
    }

    /// §6 item 3: validates both endpoints are `ready`, then returns the
    /// deltas stored against `to_version`. Applying them atop the caller's
    /// local copy of `from_version` is the caller's responsibility.
    pub async fn get_incremental(
        &self,
        dataset_id: &str,
        from_version: &str,
        to_version: &str,
    ) -> Result<Vec<DeltaRecord>, ServiceError> {
        for v in [from_version, to_version] {
            let ready = self
                .store
                .get_version(dataset_id, v)
                .await
                .map_err(store_err)?
                .map(|rec| rec.status == VersionStatus::Ready)
                .unwrap_or(false);
            if !ready {
                return Err(ServiceError::NotFound { dataset_id: dataset_id.to_owned(), version: v.to_owned() });
            }
        }
        self.store.get_deltas(dataset_id, to_version).await.map_err(store_err)
    }

    /// §6 item 4: enqueues (here: runs to completion) a projection workflow
    /// for `(user_id, dataset_id)`.
    pub async fn set_context(
        &self,
        user_id: &str,
        dataset_id: &str,
        mut ctx: UserContext,
    ) -> Result<ContextSet, ServiceError> {
        let ts = chrono::Utc::now().timestamp();
        ctx.ts = ts;
        let workflow_id = format!("uctx-{user_id}-{dataset_id}-{ts}");

        let _permit = self.permits.clone().acquire_owned().await.expect("semaphore is never closed");
        let outcome = self
            .projection
            .run(ProjectionRequest { user_id: user_id.to_owned(), dataset_id: dataset_id.to_owned(), ctx })
            .await?;

        Ok(ContextSet { workflow_id, outcome })
    }
}

impl ContinentService<PostgresGateway, RedisHotCache> {
    /// Production wiring: a `deadpool`-backed Postgres gateway sized to
    /// `Settings::worker_concurrency`, plus a `redis` connection-manager
    /// cache client.
    pub async fn connect(settings: &Settings) -> Result<Self, ServiceError> {
        let store = PostgresGateway::new(&settings.database_url, settings.worker_concurrency)
            .map_err(store_err)?;
        let cache = RedisHotCache::connect(&settings.redis_url).await.map_err(cache_err)?;
        Ok(Self::new(Arc::new(store), Arc::new(cache), settings.worker_concurrency))
    }
}
