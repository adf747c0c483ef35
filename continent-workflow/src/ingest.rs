//! C3: the ingest workflow — validate → cache → diff → commit → fanout
//! (§4.3). Each step is a [`Step`] impl; [`IngestWorkflow::run`] drives them
//! in order through [`WorkflowEngine::execute`].
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{instrument, warn};

use continent_core::canonical::checksum_of;
use continent_core::diff::compute_diff;
use continent_core::grammar::is_valid_version_grammar;
use continent_core::keys;
use continent_core::model::{PackagedSnapshot, Row, VersionStatus, CACHE_TTL_SECONDS, MAX_ROWS};
use continent_core::traits::{DurableStore, HotCache};

use crate::engine::{Step, WorkflowEngine};
use crate::error::WorkflowError;

/// Input to a full ingest workflow run (§6 item 1 supplies `dataset_id`,
/// `version`, `checksum`; this crate does not derive them, §9).
#[derive(Clone, Debug)]
pub struct IngestRequest {
    pub dataset_id: String,
    pub version: String,
    pub checksum: String,
    pub rows: Vec<Row>,
    pub ts: i64,
}

/// What the caller learns once the workflow completes successfully.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub dataset_id: String,
    pub version: String,
    pub checksum: String,
    pub parent_version: Option<String>,
    pub diff_checksum: String,
    pub diff_count: usize,
}

fn map_cache_err<E: std::error::Error>(err: E) -> WorkflowError {
    WorkflowError::CacheUnavailable(err.to_string())
}

fn map_store_err<E: std::error::Error>(err: E) -> WorkflowError {
    WorkflowError::StoreUnavailable(err.to_string())
}

// --- validate -------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct ValidateRequest {
    pub dataset_id: String,
    pub version: String,
    pub checksum: String,
    pub n_rows: usize,
}

pub struct ValidateStep<C> {
    pub cache: Arc<C>,
}

#[async_trait]
impl<C: HotCache> Step for ValidateStep<C> {
    type Request = ValidateRequest;
    type Response = ();

    fn name(&self) -> &'static str {
        "validate"
    }

    fn deadline(&self) -> Duration {
        Duration::from_secs(30)
    }

    #[instrument(skip(self, req), fields(dataset_id = %req.dataset_id, version = %req.version))]
    async fn run(&self, req: Self::Request) -> Result<Self::Response, WorkflowError> {
        if req.dataset_id.is_empty() || req.version.is_empty() || req.checksum.is_empty() {
            return Err(WorkflowError::InvalidInput("missing required fields".into()));
        }
        if !is_valid_version_grammar(&req.version) {
            return Err(WorkflowError::InvalidInput(format!(
                "version {:?} does not match the v{{uint}}.{{hex8}} grammar",
                req.version
            )));
        }
        if req.n_rows > MAX_ROWS {
            return Err(WorkflowError::InvalidInput(format!(
                "row count {} exceeds the maximum of {}",
                req.n_rows, MAX_ROWS
            )));
        }

        let key = keys::seen(&req.dataset_id, &req.version);
        let reserved = self
            .cache
            .setnx_with_ttl(&key, req.checksum.as_bytes(), CACHE_TTL_SECONDS)
            .await
            .map_err(map_cache_err)?;
        if reserved {
            return Ok(());
        }

        let existing = self.cache.get(&key).await.map_err(map_cache_err)?;
        match existing {
            Some(bytes) if bytes == req.checksum.as_bytes() => Ok(()),
            Some(bytes) => Err(WorkflowError::ChecksumMismatch {
                dataset_id: req.dataset_id.clone(),
                version: req.version.clone(),
                existing: String::from_utf8_lossy(&bytes).into_owned(),
                supplied: req.checksum.clone(),
            }),
            // The reservation expired between setnx and get; treat as a
            // fresh admission rather than failing the workflow.
            None => Ok(()),
        }
    }
}

// --- cache ------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct CacheRequest {
    pub dataset_id: String,
    pub version: String,
    pub checksum: String,
    pub rows: Vec<Row>,
    pub ts: i64,
}

pub struct CacheStep<D, C> {
    pub store: Arc<D>,
    pub cache: Arc<C>,
}

#[async_trait]
impl<D: DurableStore, C: HotCache> Step for CacheStep<D, C> {
    type Request = CacheRequest;
    type Response = ();

    fn name(&self) -> &'static str {
        "cache"
    }

    fn deadline(&self) -> Duration {
        Duration::from_secs(60)
    }

    #[instrument(skip(self, req), fields(dataset_id = %req.dataset_id, version = %req.version))]
    async fn run(&self, req: Self::Request) -> Result<Self::Response, WorkflowError> {
        let snapshot = PackagedSnapshot {
            version: req.version.clone(),
            checksum: req.checksum.clone(),
            ts: req.ts,
            count: req.rows.len(),
            rows: req.rows,
            parent_version: None,
            diff_checksum: None,
        };
        let payload = serde_json::to_vec(&snapshot).expect("PackagedSnapshot always serializes");

        self.cache
            .set_with_ttl(&keys::snapshot(&req.dataset_id, &req.version), &payload, CACHE_TTL_SECONDS)
            .await
            .map_err(map_cache_err)?;

        // Best-effort mirror into the durable store; never fails the step.
        if let Err(err) = self
            .store
            .upsert_cache_mirror(&req.dataset_id, &req.version, &snapshot, req.ts + CACHE_TTL_SECONDS as i64)
            .await
        {
            warn!(dataset_id = %req.dataset_id, version = %req.version, %err, "cache mirror write failed, continuing");
        }

        Ok(())
    }
}

// --- diff ---------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct DiffRequest {
    pub dataset_id: String,
    pub version: String,
    pub rows: Vec<Row>,
    pub ts: i64,
}

#[derive(Clone, Debug)]
pub struct DiffResponse {
    pub parent_version: Option<String>,
    pub diff_checksum: String,
    pub diff_count: usize,
}

pub struct DiffStep<D> {
    pub store: Arc<D>,
}

#[async_trait]
impl<D: DurableStore> Step for DiffStep<D> {
    type Request = DiffRequest;
    type Response = DiffResponse;

    fn name(&self) -> &'static str {
        "diff"
    }

    fn deadline(&self) -> Duration {
        Duration::from_secs(120)
    }

    #[instrument(skip(self, req), fields(dataset_id = %req.dataset_id, version = %req.version))]
    async fn run(&self, req: Self::Request) -> Result<Self::Response, WorkflowError> {
        // Exclude `req.version` itself: a reingest of an already-`ready`
        // version must resolve the same parent its first ingest did, not
        // name itself its own parent (§8 idempotent ingest).
        let parent_version = self
            .store
            .latest_ready_version(&req.dataset_id, Some(&req.version))
            .await
            .map_err(map_store_err)?;

        let old_rows = match &parent_version {
            Some(parent) => self.store.get_rows(&req.dataset_id, parent).await.map_err(map_store_err)?,
            None => Vec::new(),
        };

        let deltas = compute_diff(&req.dataset_id, &req.version, &old_rows, &req.rows, req.ts);
        let diff_checksum = checksum_of(&deltas);

        self.store
            .append_deltas(&req.dataset_id, &req.version, &deltas)
            .await
            .map_err(map_store_err)?;

        Ok(DiffResponse { parent_version, diff_checksum, diff_count: deltas.len() })
    }
}

// --- commit ---------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct CommitRequest {
    pub dataset_id: String,
    pub version: String,
    pub checksum: String,
    pub rows: Vec<Row>,
    pub parent_version: Option<String>,
    pub diff_checksum: String,
    pub ts: i64,
}

pub struct CommitStep<D> {
    pub store: Arc<D>,
}

#[async_trait]
impl<D: DurableStore> Step for CommitStep<D> {
    type Request = CommitRequest;
    type Response = ();

    fn name(&self) -> &'static str {
        "commit"
    }

    fn deadline(&self) -> Duration {
        Duration::from_secs(180)
    }

    #[instrument(skip(self, req), fields(dataset_id = %req.dataset_id, version = %req.version))]
    async fn run(&self, req: Self::Request) -> Result<Self::Response, WorkflowError> {
        // Post-TTL divergence check (§9, §1b): the `seen:` reservation may
        // have expired, so commit re-checks a checksum mismatch against any
        // existing `ready` row itself rather than trusting validate alone.
        if let Some(existing) = self.store.get_version(&req.dataset_id, &req.version).await.map_err(map_store_err)? {
            if existing.status == VersionStatus::Ready && existing.checksum != req.checksum {
                return Err(WorkflowError::ChecksumMismatch {
                    dataset_id: req.dataset_id.clone(),
                    version: req.version.clone(),
                    existing: existing.checksum,
                    supplied: req.checksum.clone(),
                });
            }
        }

        // Rows first, status flip last (§4.3 step 4): a reader must never
        // observe a `ready` version with a partial row sequence.
        self.store
            .replace_rows(&req.dataset_id, &req.version, &req.rows)
            .await
            .map_err(map_store_err)?;

        self.store
            .upsert_version(
                &req.dataset_id,
                &req.version,
                &req.checksum,
                req.ts,
                req.parent_version.as_deref(),
                Some(&req.diff_checksum),
                VersionStatus::Ready,
            )
            .await
            .map_err(map_store_err)?;

        Ok(())
    }
}

// --- fanout -----------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct FanoutRequest {
    pub dataset_id: String,
    pub version: String,
}

pub struct FanoutStep<C> {
    pub cache: Arc<C>,
}

#[async_trait]
impl<C: HotCache> Step for FanoutStep<C> {
    type Request = FanoutRequest;
    type Response = ();

    fn name(&self) -> &'static str {
        "fanout"
    }

    fn deadline(&self) -> Duration {
        Duration::from_secs(15)
    }

    #[instrument(skip(self, req), fields(dataset_id = %req.dataset_id, version = %req.version))]
    async fn run(&self, req: Self::Request) -> Result<Self::Response, WorkflowError> {
        let payload = json!({
            "type": "continent_update",
            "dataset_id": req.dataset_id,
            "version": req.version,
        });
        let bytes = serde_json::to_vec(&payload).expect("fanout payload always serializes");
        // Best-effort: never fails the workflow (§7).
        if let Err(err) = self.cache.publish(&keys::dataset_topic(&req.dataset_id), &bytes).await {
            warn!(dataset_id = %req.dataset_id, version = %req.version, %err, "fanout publish failed, continuing");
        }
        Ok(())
    }
}

// --- workflow ---------------------------------------------------------------

/// Drives the five ingest steps sequentially for one `(dataset, version)`.
pub struct IngestWorkflow<D, C> {
    store: Arc<D>,
    cache: Arc<C>,
}

impl<D: DurableStore, C: HotCache> IngestWorkflow<D, C> {
    pub fn new(store: Arc<D>, cache: Arc<C>) -> Self {
        Self { store, cache }
    }

    #[instrument(skip(self, req), fields(dataset_id = %req.dataset_id, version = %req.version))]
    pub async fn run(&self, req: IngestRequest) -> Result<IngestOutcome, WorkflowError> {
        let validate = ValidateStep { cache: self.cache.clone() };
        WorkflowEngine::execute(
            &validate,
            ValidateRequest {
                dataset_id: req.dataset_id.clone(),
                version: req.version.clone(),
                checksum: req.checksum.clone(),
                n_rows: req.rows.len(),
            },
        )
        .await?;

        let cache_step = CacheStep { store: self.store.clone(), cache: self.cache.clone() };
        WorkflowEngine::execute(
            &cache_step,
            CacheRequest {
                dataset_id: req.dataset_id.clone(),
                version: req.version.clone(),
                checksum: req.checksum.clone(),
                rows: req.rows.clone(),
                ts: req.ts,
            },
        )
        .await?;

        let diff_step = DiffStep { store: self.store.clone() };
        let diff = WorkflowEngine::execute(
            &diff_step,
            DiffRequest {
                dataset_id: req.dataset_id.clone(),
                version: req.version.clone(),
                rows: req.rows.clone(),
                ts: req.ts,
            },
        )
        .await?;

        let commit_step = CommitStep { store: self.store.clone() };
        WorkflowEngine::execute(
            &commit_step,
            CommitRequest {
                dataset_id: req.dataset_id.clone(),
                version: req.version.clone(),
                checksum: req.checksum.clone(),
                rows: req.rows.clone(),
                parent_version: diff.parent_version.clone(),
                diff_checksum: diff.diff_checksum.clone(),
                ts: req.ts,
            },
        )
        .await?;

        let fanout_step = FanoutStep { cache: self.cache.clone() };
        WorkflowEngine::execute(
            &fanout_step,
            FanoutRequest { dataset_id: req.dataset_id.clone(), version: req.version.clone() },
        )
        .await?;

        Ok(IngestOutcome {
            dataset_id: req.dataset_id,
            version: req.version,
            checksum: req.checksum,
            parent_version: diff.parent_version,
            diff_checksum: diff.diff_checksum,
            diff_count: diff.diff_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeCache, FakeStore};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn first_version_commits_all_adds_with_no_parent() {
        let store = Arc::new(FakeStore::default());
        let cache = Arc::new(FakeCache::default());
        let workflow = IngestWorkflow::new(store.clone(), cache.clone());

        let rows = vec![json!({"id": 1, "s": "a"}), json!({"id": 2, "s": "b"})];
        let req = IngestRequest {
            dataset_id: "D1".into(),
            version: "v1.aaaaaaaa".into(),
            checksum: "c1".into(),
            rows,
            ts: 100,
        };

        let outcome = workflow.run(req).await.expect("ingest succeeds");
        assert_eq!(outcome.parent_version, None);
        assert_eq!(outcome.diff_count, 2);

        let version = store.get_version("D1", "v1.aaaaaaaa").await.unwrap().unwrap();
        assert_eq!(version.status, VersionStatus::Ready);
        assert_eq!(store.get_rows("D1", "v1.aaaaaaaa").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn reingest_identical_checksum_is_a_no_op() {
        let store = Arc::new(FakeStore::default());
        let cache = Arc::new(FakeCache::default());
        let workflow = IngestWorkflow::new(store.clone(), cache.clone());

        let rows = vec![json!({"id": 1, "s": "a"})];
        let req = IngestRequest {
            dataset_id: "D1".into(),
            version: "v1.aaaaaaaa".into(),
            checksum: "c1".into(),
            rows: rows.clone(),
            ts: 100,
        };
        workflow.run(req.clone()).await.expect("first ingest succeeds");
        let deltas_after_first = store.get_deltas("D1", "v1.aaaaaaaa").await.unwrap().len();

        workflow.run(req).await.expect("reingest is idempotent");
        let deltas_after_second = store.get_deltas("D1", "v1.aaaaaaaa").await.unwrap().len();
        assert_eq!(deltas_after_first, deltas_after_second);
    }

    #[tokio::test]
    async fn reingest_divergent_checksum_fails_terminally() {
        let store = Arc::new(FakeStore::default());
        let cache = Arc::new(FakeCache::default());
        let workflow = IngestWorkflow::new(store.clone(), cache.clone());

        let req = IngestRequest {
            dataset_id: "D1".into(),
            version: "v1.aaaaaaaa".into(),
            checksum: "c1".into(),
            rows: vec![json!({"id": 1})],
            ts: 100,
        };
        workflow.run(req).await.expect("first ingest succeeds");

        let divergent = IngestRequest {
            dataset_id: "D1".into(),
            version: "v1.aaaaaaaa".into(),
            checksum: "c2".into(),
            rows: vec![json!({"id": 1}), json!({"id": 2})],
            ts: 101,
        };
        let err = workflow.run(divergent).await.expect_err("checksum diverges");
        assert!(matches!(err, WorkflowError::ChecksumMismatch { .. }));
    }

    #[tokio::test]
    async fn rejects_oversized_row_counts() {
        let store = Arc::new(FakeStore::default());
        let cache = Arc::new(FakeCache::default());
        let workflow = IngestWorkflow::new(store, cache);

        let rows: Vec<Row> = (0..MAX_ROWS + 1).map(|i| json!({"id": i})).collect();
        let req = IngestRequest {
            dataset_id: "D1".into(),
            version: "v1.aaaaaaaa".into(),
            checksum: "c1".into(),
            rows,
            ts: 100,
        };
        let err = workflow.run(req).await.expect_err("row count exceeds maximum");
        assert!(matches!(err, WorkflowError::InvalidInput(_)));
    }
}
