use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum number of rows a single ingest may submit (§6).
pub const MAX_ROWS: usize = 10_000;

/// TTL, in seconds, applied to every Hot Cache key this crate writes (§4.2).
pub const CACHE_TTL_SECONDS: u64 = 86_400;

/// A single row of a dataset version. Rows are arbitrary structured records;
/// the only thing this crate relies on is an `id` field used for diffing.
pub type Row = Value;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStatus {
    #[default]
    Pending,
    Ready,
}

/// A `(dataset_id, version)` record (§3).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub dataset_id: String,
    pub version: String,
    pub checksum: String,
    pub ts: i64,
    pub parent_version: Option<String>,
    pub diff_checksum: Option<String>,
    pub status: VersionStatus,
}

/// Summary returned by `list_ready_versions`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub checksum: String,
    pub ts: i64,
    pub parent_version: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaKind {
    Add,
    Update,
    Delete,
}

/// A single `add`/`update`/`delete` delta record (§3).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeltaRecord {
    pub dataset_id: String,
    pub version: String,
    pub kind: DeltaKind,
    pub item_id: String,
    pub old_item: Option<Value>,
    pub new_item: Option<Value>,
    pub ts: i64,
}

/// A field → value-or-values filter entry for a user context.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Many(Vec<Value>),
    One(Value),
}

impl FilterValue {
    /// True iff `value` satisfies this filter entry per §4.5 step 4.
    pub fn matches(&self, value: Option<&Value>) -> bool {
        match (self, value) {
            (FilterValue::Many(allowed), Some(v)) => allowed.contains(v),
            (FilterValue::One(Value::Null), None) => true,
            (FilterValue::One(expected), Some(v)) => expected == v,
            (_, None) => false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SortSpec {
    pub by: String,
    #[serde(default)]
    pub desc: bool,
}

/// A per-`(user_id, dataset_id)` filter/sort/selection descriptor (§3).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    #[serde(default)]
    pub filters: std::collections::BTreeMap<String, FilterValue>,
    #[serde(default)]
    pub sort: Option<SortSpec>,
    /// Persisted verbatim; never consulted by projection (§9).
    #[serde(default)]
    pub selection: Option<Value>,
    #[serde(default)]
    pub ts: i64,
}

/// A materialized projection row, keyed by `(user_id, dataset_id, version, item)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectedViewRow {
    pub user_id: String,
    pub dataset_id: String,
    pub version: String,
    pub item: Value,
    pub ts: i64,
}

/// The cacheable bundle written to `continent:{dataset_id}:{version}` (§4.2).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PackagedSnapshot {
    pub version: String,
    pub checksum: String,
    pub ts: i64,
    pub rows: Vec<Row>,
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_checksum: Option<String>,
}
