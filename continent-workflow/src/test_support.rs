//! In-memory fakes of the `DurableStore` / `HotCache` trait boundaries,
//! used by this crate's workflow tests instead of a mocking framework —
//! the boundary is already trait-based, so a fake implementation is enough.
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

use continent_core::model::{
    DeltaRecord, PackagedSnapshot, Row, UserContext, VersionInfo, VersionRecord, VersionStatus,
};
use continent_core::traits::{DurableStore, HotCache};

#[derive(Debug, Error)]
pub enum FakeStoreError {
    #[error("checksum mismatch for {dataset_id}:{version}: existing ready version has checksum {existing}, got {supplied}")]
    ChecksumMismatch { dataset_id: String, version: String, existing: String, supplied: String },
}

#[derive(Default)]
struct FakeStoreState {
    versions: HashMap<(String, String), VersionRecord>,
    rows: HashMap<(String, String), Vec<Row>>,
    deltas: HashMap<(String, String), Vec<DeltaRecord>>,
    user_contexts: HashMap<(String, String), UserContext>,
    user_views: HashMap<(String, String, String), Vec<Row>>,
}

#[derive(Default)]
pub struct FakeStore {
    state: Mutex<FakeStoreState>,
}

#[async_trait]
impl DurableStore for FakeStore {
    type Error = FakeStoreError;

    async fn upsert_version(
        &self,
        dataset_id: &str,
        version: &str,
        checksum: &str,
        ts: i64,
        parent_version: Option<&str>,
        diff_checksum: Option<&str>,
        status: VersionStatus,
    ) -> Result<VersionRecord, Self::Error> {
        let mut state = self.state.lock().unwrap();
        let key = (dataset_id.to_owned(), version.to_owned());

        if status == VersionStatus::Ready {
            if let Some(existing) = state.versions.get(&key) {
                if existing.status == VersionStatus::Ready && existing.checksum != checksum {
                    return Err(FakeStoreError::ChecksumMismatch {
                        dataset_id: dataset_id.to_owned(),
                        version: version.to_owned(),
                        existing: existing.checksum.clone(),
                        supplied: checksum.to_owned(),
                    });
                }
            }
        }

        let record = VersionRecord {
            dataset_id: dataset_id.to_owned(),
            version: version.to_owned(),
            checksum: checksum.to_owned(),
            ts,
            parent_version: parent_version.map(str::to_owned),
            diff_checksum: diff_checksum.map(str::to_owned),
            status,
        };
        state.versions.insert(key, record.clone());
        Ok(record)
    }

    async fn get_version(
        &self,
        dataset_id: &str,
        version: &str,
    ) -> Result<Option<VersionRecord>, Self::Error> {
        let state = self.state.lock().unwrap();
        Ok(state.versions.get(&(dataset_id.to_owned(), version.to_owned())).cloned())
    }

    async fn replace_rows(&self, dataset_id: &str, version: &str, rows: &[Row]) -> Result<(), Self::Error> {
        let mut state = self.state.lock().unwrap();
        state.rows.insert((dataset_id.to_owned(), version.to_owned()), rows.to_vec());
        Ok(())
    }

    async fn append_deltas(
        &self,
        dataset_id: &str,
        version: &str,
        deltas: &[DeltaRecord],
    ) -> Result<(), Self::Error> {
        let mut state = self.state.lock().unwrap();
        let entry = state.deltas.entry((dataset_id.to_owned(), version.to_owned())).or_default();
        for d in deltas {
            let already = entry.iter().any(|existing| existing.item_id == d.item_id && existing.kind == d.kind);
            if !already {
                entry.push(d.clone());
            }
        }
        Ok(())
    }

    async fn latest_ready_version(
        &self,
        dataset_id: &str,
        exclude_version: Option<&str>,
    ) -> Result<Option<String>, Self::Error> {
        let state = self.state.lock().unwrap();
        let mut candidates: Vec<&VersionRecord> = state
            .versions
            .values()
            .filter(|v| v.dataset_id == dataset_id && v.status == VersionStatus::Ready)
            .filter(|v| Some(v.version.as_str()) != exclude_version)
            .collect();
        candidates.sort_by(|a, b| b.ts.cmp(&a.ts).then_with(|| b.version.cmp(&a.version)));
        Ok(candidates.first().map(|v| v.version.clone()))
    }

    async fn get_rows(&self, dataset_id: &str, version: &str) -> Result<Vec<Row>, Self::Error> {
        let state = self.state.lock().unwrap();
        Ok(state.rows.get(&(dataset_id.to_owned(), version.to_owned())).cloned().unwrap_or_default())
    }

    async fn get_deltas(&self, dataset_id: &str, version: &str) -> Result<Vec<DeltaRecord>, Self::Error> {
        let state = self.state.lock().unwrap();
        Ok(state.deltas.get(&(dataset_id.to_owned(), version.to_owned())).cloned().unwrap_or_default())
    }

    async fn list_ready_versions(&self, dataset_id: &str, limit: u32) -> Result<Vec<VersionInfo>, Self::Error> {
        let state = self.state.lock().unwrap();
        let mut candidates: Vec<&VersionRecord> = state
            .versions
            .values()
            .filter(|v| v.dataset_id == dataset_id && v.status == VersionStatus::Ready)
            .collect();
        candidates.sort_by(|a, b| b.ts.cmp(&a.ts).then_with(|| b.version.cmp(&a.version)));
        Ok(candidates
            .into_iter()
            .take(limit as usize)
            .map(|v| VersionInfo {
                version: v.version.clone(),
                checksum: v.checksum.clone(),
                ts: v.ts,
                parent_version: v.parent_version.clone(),
            })
            .collect())
    }

    async fn upsert_user_context(&self, user_id: &str, dataset_id: &str, ctx: &UserContext) -> Result<(), Self::Error> {
        let mut state = self.state.lock().unwrap();
        state.user_contexts.insert((user_id.to_owned(), dataset_id.to_owned()), ctx.clone());
        Ok(())
    }

    async fn get_user_context(&self, user_id: &str, dataset_id: &str) -> Result<Option<UserContext>, Self::Error> {
        let state = self.state.lock().unwrap();
        Ok(state.user_contexts.get(&(user_id.to_owned(), dataset_id.to_owned())).cloned())
    }

    async fn replace_user_view(
        &self,
        user_id: &str,
        dataset_id: &str,
        version: &str,
        rows: &[Row],
    ) -> Result<(), Self::Error> {
        let mut state = self.state.lock().unwrap();
        state
            .user_views
            .insert((user_id.to_owned(), dataset_id.to_owned(), version.to_owned()), rows.to_vec());
        Ok(())
    }

    async fn upsert_cache_mirror(
        &self,
        _dataset_id: &str,
        _version: &str,
        _snapshot: &PackagedSnapshot,
        _expires_at: i64,
    ) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl FakeStore {
    /// Test helper: read back a materialized view written by `project_view`.
    pub fn user_view(&self, user_id: &str, dataset_id: &str, version: &str) -> Vec<Row> {
        let state = self.state.lock().unwrap();
        state
            .user_views
            .get(&(user_id.to_owned(), dataset_id.to_owned(), version.to_owned()))
            .cloned()
            .unwrap_or_default()
    }
}

#[derive(Debug, Error)]
pub enum FakeCacheError {}

#[derive(Default)]
pub struct FakeCache {
    kv: Mutex<HashMap<String, Vec<u8>>>,
    published: Mutex<Vec<(String, Vec<u8>)>>,
}

#[async_trait]
impl HotCache for FakeCache {
    type Error = FakeCacheError;

    async fn setnx_with_ttl(&self, key: &str, value: &[u8], _ttl_seconds: u64) -> Result<bool, Self::Error> {
        let mut kv = self.kv.lock().unwrap();
        if kv.contains_key(key) {
            Ok(false)
        } else {
            kv.insert(key.to_owned(), value.to_vec());
            Ok(true)
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], _ttl_seconds: u64) -> Result<(), Self::Error> {
        self.kv.lock().unwrap().insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.kv.lock().unwrap().get(key).cloned())
    }

    async fn hset_mapping(&self, key: &str, mapping: &[(String, Vec<u8>)]) -> Result<(), Self::Error> {
        let mut kv = self.kv.lock().unwrap();
        for (field, value) in mapping {
            kv.insert(format!("{key}:{field}"), value.clone());
        }
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), Self::Error> {
        self.published.lock().unwrap().push((topic.to_owned(), payload.to_vec()));
        Ok(())
    }
}

impl FakeCache {
    pub fn published_on(&self, topic: &str) -> Vec<Vec<u8>> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, payload)| payload.clone())
            .collect()
    }
}
