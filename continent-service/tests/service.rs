//! End-to-end exercises of the four external contracts (§6) against the
//! in-memory fakes, covering the §8 scenarios this crate is responsible
//! for wiring together (ingest → snapshot/list/deltas, context → view).
use std::sync::Arc;

use continent_core::model::{FilterValue, SortSpec, UserContext};
use continent_service::{ContinentService, ServiceError, SnapshotSource};
use continent_workflow::test_support::{FakeCache, FakeStore};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::BTreeMap;

fn service() -> ContinentService<FakeStore, FakeCache> {
    ContinentService::new(Arc::new(FakeStore::default()), Arc::new(FakeCache::default()), 4)
}

#[tokio::test]
async fn start_ingest_then_get_snapshot_round_trips() {
    let svc = service();
    let rows = vec![json!({"id": 1, "s": "a"}), json!({"id": 2, "s": "b"})];

    let started = svc.start_ingest("D1", rows.clone()).await.expect("ingest starts");
    assert!(started.version.starts_with('v'));
    assert_eq!(started.checksum.len(), 64);

    let snapshot = svc.get_snapshot("D1", Some(&started.version)).await.expect("snapshot readable");
    assert_eq!(snapshot.source, SnapshotSource::Cache);
    assert_eq!(snapshot.data.rows, rows);
    assert_eq!(snapshot.data.checksum, started.checksum);
}

#[tokio::test]
async fn get_snapshot_without_version_resolves_latest() {
    let svc = service();
    svc.start_ingest("D1", vec![json!({"id": 1})]).await.expect("first ingest");
    // `version` embeds the ingest-time second, and the latest-version tie
    // break is lexicographic on `version` when `ts` is equal (§3); sleeping
    // past the second boundary keeps this test's "latest" assertion tied to
    // wall-clock order rather than to how two checksums happen to compare.
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    let second = svc.start_ingest("D1", vec![json!({"id": 1}), json!({"id": 2})]).await.expect("second ingest");

    let snapshot = svc.get_snapshot("D1", None).await.expect("latest snapshot readable");
    assert_eq!(snapshot.data.version, second.version);
}

#[tokio::test]
async fn get_snapshot_for_unknown_version_is_not_found() {
    let svc = service();
    svc.start_ingest("D1", vec![json!({"id": 1})]).await.expect("ingest succeeds");

    let err = svc.get_snapshot("D1", Some("v0.deadbeef")).await.expect_err("unknown version");
    assert!(matches!(err, ServiceError::NotFound { .. }));
}

#[tokio::test]
async fn empty_row_set_is_rejected() {
    let svc = service();
    let err = svc.start_ingest("D1", vec![]).await.expect_err("empty rows rejected");
    assert!(matches!(err, ServiceError::InvalidInput(_)));
}

#[tokio::test]
async fn list_versions_and_get_deltas_reflect_ingest_history() {
    let svc = service();
    let v1 = svc.start_ingest("D1", vec![json!({"id": 1, "s": "a"}), json!({"id": 2, "s": "b"})]).await.unwrap();
    // See the sleep comment in `get_snapshot_without_version_resolves_latest`:
    // keeps `ts` strictly increasing so ordering doesn't depend on how the
    // two checksums happen to compare lexicographically.
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    let v2 = svc.start_ingest("D1", vec![json!({"id": 1, "s": "a"}), json!({"id": 2, "s": "c"})]).await.unwrap();

    let versions = svc.list_versions("D1", None).await.expect("list succeeds");
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0].version, v2.version);
    assert_eq!(versions[1].version, v1.version);

    let deltas = svc.get_deltas("D1", &v2.version).await.expect("deltas readable");
    assert_eq!(deltas.len(), 1);
    assert_eq!(deltas[0].item_id, "2");

    let incremental = svc.get_incremental("D1", &v1.version, &v2.version).await.expect("incremental readable");
    assert_eq!(incremental, deltas);
}

#[tokio::test]
async fn get_incremental_rejects_non_ready_endpoint() {
    let svc = service();
    svc.start_ingest("D1", vec![json!({"id": 1})]).await.unwrap();

    let err = svc.get_incremental("D1", "v0.notreal0", "v0.notreal0").await.expect_err("unknown version");
    assert!(matches!(err, ServiceError::NotFound { .. }));
}

#[tokio::test]
async fn set_context_projects_current_version() {
    let svc = service();
    svc.start_ingest(
        "D1",
        vec![
            json!({"id": 1, "status": "new", "country": "IN", "amount": 1200}),
            json!({"id": 2, "status": "shipped", "country": "US", "amount": 800}),
            json!({"id": 3, "status": "new", "country": "IN", "amount": 1500}),
        ],
    )
    .await
    .unwrap();

    let mut filters = BTreeMap::new();
    filters.insert("status".to_owned(), FilterValue::Many(vec![json!("new")]));
    filters.insert("country".to_owned(), FilterValue::One(json!("IN")));
    let ctx = UserContext {
        filters,
        sort: Some(SortSpec { by: "amount".to_owned(), desc: true }),
        selection: None,
        ts: 0,
    };

    let result = svc.set_context("u1", "D1", ctx).await.expect("set_context succeeds");
    assert_eq!(result.outcome.count, 2);
    assert!(result.workflow_id.starts_with("uctx-u1-D1-"));
}

#[tokio::test]
async fn set_context_before_any_ingest_produces_no_view() {
    let svc = service();
    let result = svc.set_context("u1", "D1", UserContext::default()).await.expect("set_context succeeds");
    assert_eq!(result.outcome.version, None);
    assert_eq!(result.outcome.count, 0);
}

#[tokio::test]
async fn reingest_identical_rows_is_a_no_op() {
    let svc = service();
    let rows = vec![json!({"id": 1, "s": "a"})];
    let first = svc.start_ingest("D1", rows.clone()).await.unwrap();
    let second = svc.start_ingest("D1", rows).await.unwrap();

    // `version` embeds the checksum, so an identical resubmission derives
    // the same identifier and the underlying ingest workflow treats it as
    // an idempotent retry (exercised directly in continent-workflow's own
    // tests, including the divergent-checksum failure case).
    assert_eq!(first.version, second.version);
    assert_eq!(first.checksum, second.checksum);
}
