//! C5: the projection workflow — store_user_ctx → project_view (§4.5).
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{instrument, warn};

use continent_core::keys;
use continent_core::model::UserContext;
use continent_core::projection::apply_context;
use continent_core::traits::{DurableStore, HotCache};

use crate::engine::{Step, WorkflowEngine};
use crate::error::WorkflowError;

/// Input to a full projection workflow run.
#[derive(Clone, Debug)]
pub struct ProjectionRequest {
    pub user_id: String,
    pub dataset_id: String,
    pub ctx: UserContext,
}

/// Outcome of `project_view`; `version` is `None` when the dataset has no
/// ready version yet, in which case no output is produced (§4.5 step 1).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectViewOutcome {
    pub version: Option<String>,
    pub count: usize,
}

fn map_cache_err<E: std::error::Error>(err: E) -> WorkflowError {
    WorkflowError::CacheUnavailable(err.to_string())
}

fn map_store_err<E: std::error::Error>(err: E) -> WorkflowError {
    WorkflowError::StoreUnavailable(err.to_string())
}

// --- store_user_ctx ----------------------------------------------------------

#[derive(Clone, Debug)]
pub struct StoreUserCtxRequest {
    pub user_id: String,
    pub dataset_id: String,
    pub ctx: UserContext,
}

pub struct StoreUserCtxStep<D> {
    pub store: Arc<D>,
}

#[async_trait]
impl<D: DurableStore> Step for StoreUserCtxStep<D> {
    type Request = StoreUserCtxRequest;
    type Response = ();

    fn name(&self) -> &'static str {
        "store_user_ctx"
    }

    fn deadline(&self) -> Duration {
        Duration::from_secs(10)
    }

    #[instrument(skip(self, req), fields(user_id = %req.user_id, dataset_id = %req.dataset_id))]
    async fn run(&self, req: Self::Request) -> Result<Self::Response, WorkflowError> {
        self.store
            .upsert_user_context(&req.user_id, &req.dataset_id, &req.ctx)
            .await
            .map_err(map_store_err)
    }
}

// --- project_view --------------------------------------------------------

#[derive(Clone, Debug)]
pub struct ProjectViewRequest {
    pub user_id: String,
    pub dataset_id: String,
}

pub struct ProjectViewStep<D, C> {
    pub store: Arc<D>,
    pub cache: Arc<C>,
}

#[async_trait]
impl<D: DurableStore, C: HotCache> Step for ProjectViewStep<D, C> {
    type Request = ProjectViewRequest;
    type Response = ProjectViewOutcome;

    fn name(&self) -> &'static str {
        "project_view"
    }

    fn deadline(&self) -> Duration {
        Duration::from_secs(60)
    }

    #[instrument(skip(self, req), fields(user_id = %req.user_id, dataset_id = %req.dataset_id))]
    async fn run(&self, req: Self::Request) -> Result<Self::Response, WorkflowError> {
        let version = match self.store.latest_ready_version(&req.dataset_id, None).await.map_err(map_store_err)? {
            Some(v) => v,
            None => return Ok(ProjectViewOutcome { version: None, count: 0 }),
        };

        let ctx = self
            .store
            .get_user_context(&req.user_id, &req.dataset_id)
            .await
            .map_err(map_store_err)?
            .unwrap_or_default();

        let rows = self.store.get_rows(&req.dataset_id, &version).await.map_err(map_store_err)?;
        let projected = apply_context(&rows, &ctx);

        self.store
            .replace_user_view(&req.user_id, &req.dataset_id, &version, &projected)
            .await
            .map_err(map_store_err)?;

        let payload = json!({
            "type": "view_ready",
            "dataset_id": req.dataset_id,
            "version": version,
            "user_id": req.user_id,
        });
        let bytes = serde_json::to_vec(&payload).expect("view_ready payload always serializes");
        if let Err(err) = self.cache.publish(&keys::user_topic(&req.dataset_id, &req.user_id), &bytes).await {
            warn!(user_id = %req.user_id, dataset_id = %req.dataset_id, %err, "view-ready publish failed, continuing");
        }

        Ok(ProjectViewOutcome { version: Some(version), count: projected.len() })
    }
}

// --- workflow -----------------------------------------------------------

/// Drives `store_user_ctx` then `project_view` for one `(user, dataset)`.
pub struct ProjectionWorkflow<D, C> {
    store: Arc<D>,
    cache: Arc<C>,
}

impl<D: DurableStore, C: HotCache> ProjectionWorkflow<D, C> {
    pub fn new(store: Arc<D>, cache: Arc<C>) -> Self {
        Self { store, cache }
    }

    #[instrument(skip(self, req), fields(user_id = %req.user_id, dataset_id = %req.dataset_id))]
    pub async fn run(&self, req: ProjectionRequest) -> Result<ProjectViewOutcome, WorkflowError> {
        let store_ctx = StoreUserCtxStep { store: self.store.clone() };
        WorkflowEngine::execute(
            &store_ctx,
            StoreUserCtxRequest {
                user_id: req.user_id.clone(),
                dataset_id: req.dataset_id.clone(),
                ctx: req.ctx,
            },
        )
        .await?;

        let project = ProjectViewStep { store: self.store.clone(), cache: self.cache.clone() };
        WorkflowEngine::execute(
            &project,
            ProjectViewRequest { user_id: req.user_id, dataset_id: req.dataset_id },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{IngestRequest, IngestWorkflow};
    use crate::test_support::{FakeCache, FakeStore};
    use continent_core::model::{FilterValue, SortSpec};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn no_ready_version_yields_no_output() {
        let store = Arc::new(FakeStore::default());
        let cache = Arc::new(FakeCache::default());
        let workflow = ProjectionWorkflow::new(store, cache);

        let outcome = workflow
            .run(ProjectionRequest { user_id: "u1".into(), dataset_id: "D1".into(), ctx: UserContext::default() })
            .await
            .expect("projection runs without error");
        assert_eq!(outcome.version, None);
        assert_eq!(outcome.count, 0);
    }

    #[tokio::test]
    async fn filter_and_sort_scenario_6() {
        let store = Arc::new(FakeStore::default());
        let cache = Arc::new(FakeCache::default());
        let ingest = IngestWorkflow::new(store.clone(), cache.clone());

        let rows = vec![
            json!({"id": 1, "status": "new", "country": "IN", "amount": 1200}),
            json!({"id": 2, "status": "shipped", "country": "US", "amount": 800}),
            json!({"id": 3, "status": "new", "country": "IN", "amount": 1500}),
        ];
        ingest
            .run(IngestRequest {
                dataset_id: "D1".into(),
                version: "v1.aaaaaaaa".into(),
                checksum: "c1".into(),
                rows,
                ts: 100,
            })
            .await
            .expect("ingest succeeds");

        let mut filters = BTreeMap::new();
        filters.insert("status".to_owned(), FilterValue::Many(vec![json!("new")]));
        filters.insert("country".to_owned(), FilterValue::One(json!("IN")));
        let ctx = UserContext {
            filters,
            sort: Some(SortSpec { by: "amount".to_owned(), desc: true }),
            selection: None,
            ts: 100,
        };

        let workflow = ProjectionWorkflow::new(store.clone(), cache.clone());
        let outcome = workflow
            .run(ProjectionRequest { user_id: "u1".into(), dataset_id: "D1".into(), ctx })
            .await
            .expect("projection succeeds");

        assert_eq!(outcome.version, Some("v1.aaaaaaaa".to_owned()));
        assert_eq!(outcome.count, 2);

        let view = store.user_view("u1", "D1", "v1.aaaaaaaa");
        let ids: Vec<_> = view.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![3, 1]);

        let published = cache.published_on(&keys::user_topic("D1", "u1"));
        assert_eq!(published.len(), 1);
    }
}
