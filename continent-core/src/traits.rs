//! Trait boundaries for C1 (Durable Store) and C2 (Hot Cache).
//!
//! These are the seams `continent-storage` and `continent-cache` implement
//! and `continent-workflow` depends on only through `dyn`/generic bounds —
//! mirroring this organization's existing gateway-trait split between a
//! storage-agnostic core and a Postgres-specific implementation.
use async_trait::async_trait;

use crate::model::{
    DeltaRecord, PackagedSnapshot, Row, UserContext, VersionInfo, VersionRecord, VersionStatus,
};

/// C1: the only authoritative store (§4.1).
#[async_trait]
pub trait DurableStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Inserts or overwrites a version row. Returns the record as persisted.
    async fn upsert_version(
        &self,
        dataset_id: &str,
        version: &str,
        checksum: &str,
        ts: i64,
        parent_version: Option<&str>,
        diff_checksum: Option<&str>,
        status: VersionStatus,
    ) -> Result<VersionRecord, Self::Error>;

    /// Looks up a single version record regardless of status.
    async fn get_version(
        &self,
        dataset_id: &str,
        version: &str,
    ) -> Result<Option<VersionRecord>, Self::Error>;

    /// Atomically clears and writes the row sequence for a version, in
    /// batches of 1,000 (§4.1).
    async fn replace_rows(
        &self,
        dataset_id: &str,
        version: &str,
        rows: &[Row],
    ) -> Result<(), Self::Error>;

    /// Bulk-appends delta records in batches of 500 (§4.1). Implementations
    /// must make repeated calls for the same `(dataset_id, version)`
    /// idempotent (§4.3: clear-then-insert, or a primary key on
    /// `(dataset_id, version, item_id, kind)`).
    async fn append_deltas(
        &self,
        dataset_id: &str,
        version: &str,
        deltas: &[DeltaRecord],
    ) -> Result<(), Self::Error>;

    /// The `ready` version with the greatest `ts` for `dataset_id`, ties
    /// broken by `version` lexicographically descending. `exclude_version`,
    /// when set, omits that one version from consideration — used by the
    /// diff step so a reingest of an already-`ready` version resolves its
    /// parent the same way the original ingest did, rather than naming
    /// itself its own parent.
    async fn latest_ready_version(
        &self,
        dataset_id: &str,
        exclude_version: Option<&str>,
    ) -> Result<Option<String>, Self::Error>;

    async fn get_rows(&self, dataset_id: &str, version: &str) -> Result<Vec<Row>, Self::Error>;

    async fn get_deltas(
        &self,
        dataset_id: &str,
        version: &str,
    ) -> Result<Vec<DeltaRecord>, Self::Error>;

    /// The newest `limit` `ready` versions, descending `ts`.
    async fn list_ready_versions(
        &self,
        dataset_id: &str,
        limit: u32,
    ) -> Result<Vec<VersionInfo>, Self::Error>;

    async fn upsert_user_context(
        &self,
        user_id: &str,
        dataset_id: &str,
        ctx: &UserContext,
    ) -> Result<(), Self::Error>;

    async fn get_user_context(
        &self,
        user_id: &str,
        dataset_id: &str,
    ) -> Result<Option<UserContext>, Self::Error>;

    /// Rewrites `user_views` for `(user_id, dataset_id, version)` end to end.
    async fn replace_user_view(
        &self,
        user_id: &str,
        dataset_id: &str,
        version: &str,
        rows: &[Row],
    ) -> Result<(), Self::Error>;

    /// Best-effort mirror of the packaged snapshot written to the Hot Cache.
    /// Callers treat failure here as non-fatal (§4.1).
    async fn upsert_cache_mirror(
        &self,
        dataset_id: &str,
        version: &str,
        snapshot: &PackagedSnapshot,
        expires_at: i64,
    ) -> Result<(), Self::Error>;
}

/// C2: low-latency key/value + pub/sub fabric (§4.2).
#[async_trait]
pub trait HotCache: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Atomic "first writer wins". Returns `true` iff the key did not
    /// previously exist.
    async fn setnx_with_ttl(
        &self,
        key: &str,
        value: &[u8],
        ttl_seconds: u64,
    ) -> Result<bool, Self::Error>;

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &[u8],
        ttl_seconds: u64,
    ) -> Result<(), Self::Error>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Self::Error>;

    async fn hset_mapping(
        &self,
        key: &str,
        mapping: &[(String, Vec<u8>)],
    ) -> Result<(), Self::Error>;

    /// Best-effort fanout; delivery is not guaranteed (§4.2).
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), Self::Error>;
}
