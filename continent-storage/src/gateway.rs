//! C1: the Postgres-backed `DurableStore` implementation.
//!
//! Operations receive their own pooled connection rather than a shared
//! handle; where an operation needs multiple statements to stay consistent
//! (commit's version-upsert plus row-replace), it opens its own
//! transaction rather than asking the caller to thread one through,
//! matching this repo's "operations receive a connection reference, which
//! may be a transactional one" design, simplified to a single-owner pool
//! since this crate has no multi-step caller-composed transactions.
use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::{
    pooled_connection::{deadpool::Pool, AsyncDieselConnectionManager},
    scoped_futures::ScopedFutureExt,
    AsyncConnection, AsyncPgConnection, RunQueryDsl,
};
use tracing::{debug, instrument, warn};

use continent_core::model::{
    DeltaKind, DeltaRecord, PackagedSnapshot, Row, UserContext, VersionInfo, VersionRecord,
    VersionStatus,
};
use continent_core::traits::DurableStore;

use crate::error::StorageError;
use crate::orm;
use crate::schema::{cache, deltas, rows, user_contexts, user_views, versions};

/// Row batch size for `replace_rows` (§4.1).
const ROW_BATCH: usize = 1_000;
/// Delta batch size for `append_deltas` (§4.1).
const DELTA_BATCH: usize = 500;

pub struct PostgresGateway {
    pool: Pool<AsyncPgConnection>,
}

impl PostgresGateway {
    /// Builds a gateway around a `deadpool`-backed connection pool sized to
    /// `pool_size` (recommended ≈ worker concurrency, §5).
    pub fn new(database_url: &str, pool_size: usize) -> Result<Self, StorageError> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
        let pool = Pool::builder(manager)
            .max_size(pool_size)
            .build()
            .expect("pool configuration is valid");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: Pool<AsyncPgConnection>) -> Self {
        Self { pool }
    }
}

fn kind_str(kind: DeltaKind) -> &'static str {
    match kind {
        DeltaKind::Add => "add",
        DeltaKind::Update => "update",
        DeltaKind::Delete => "delete",
    }
}

fn kind_from_str(s: &str) -> DeltaKind {
    match s {
        "add" => DeltaKind::Add,
        "delete" => DeltaKind::Delete,
        _ => DeltaKind::Update,
    }
}

fn status_str(status: VersionStatus) -> &'static str {
    match status {
        VersionStatus::Pending => "pending",
        VersionStatus::Ready => "ready",
    }
}

impl From<orm::VersionRow> for VersionRecord {
    fn from(r: orm::VersionRow) -> Self {
        VersionRecord {
            dataset_id: r.dataset_id,
            version: r.version,
            checksum: r.checksum,
            ts: r.ts,
            parent_version: r.parent_version,
            diff_checksum: r.diff_checksum,
            status: if r.status == "ready" { VersionStatus::Ready } else { VersionStatus::Pending },
        }
    }
}

impl From<orm::DeltaRow> for DeltaRecord {
    fn from(r: orm::DeltaRow) -> Self {
        DeltaRecord {
            dataset_id: r.dataset_id,
            version: r.version,
            kind: kind_from_str(&r.kind),
            item_id: r.item_id,
            old_item: r.old_item,
            new_item: r.new_item,
            ts: r.ts,
        }
    }
}

#[async_trait]
impl DurableStore for PostgresGateway {
    type Error = StorageError;

    #[instrument(skip(self, checksum, diff_checksum))]
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
        let mut conn = self.pool.get().await?;

        if status == VersionStatus::Ready {
            let existing = versions::table
                .filter(versions::dataset_id.eq(dataset_id))
                .filter(versions::version.eq(version))
                .select(orm::VersionRow::as_select())
                .first(&mut conn)
                .await
                .optional()?
                .map(VersionRecord::from);
            if let Some(existing) = existing {
                if existing.status == VersionStatus::Ready && existing.checksum != checksum {
                    return Err(StorageError::ChecksumMismatch {
                        dataset_id: dataset_id.to_owned(),
                        version: version.to_owned(),
                        existing: existing.checksum,
                        supplied: checksum.to_owned(),
                    });
                }
            }
        }

        let status_s = status_str(status);
        let new_row = orm::NewVersionRow {
            dataset_id,
            version,
            checksum,
            ts,
            parent_version,
            diff_checksum,
            status: status_s,
        };

        diesel::insert_into(versions::table)
            .values(&new_row)
            .on_conflict((versions::dataset_id, versions::version))
            .do_update()
            .set((
                versions::checksum.eq(checksum),
                versions::ts.eq(ts),
                versions::parent_version.eq(parent_version),
                versions::diff_checksum.eq(diff_checksum),
                versions::status.eq(status_s),
            ))
            .execute(&mut conn)
            .await?;

        Ok(VersionRecord {
            dataset_id: dataset_id.to_owned(),
            version: version.to_owned(),
            checksum: checksum.to_owned(),
            ts,
            parent_version: parent_version.map(str::to_owned),
            diff_checksum: diff_checksum.map(str::to_owned),
            status,
        })
    }

    async fn get_version(
        &self,
        dataset_id: &str,
        version: &str,
    ) -> Result<Option<VersionRecord>, Self::Error> {
        let mut conn = self.pool.get().await?;
        let row = versions::table
            .filter(versions::dataset_id.eq(dataset_id))
            .filter(versions::version.eq(version))
            .select(orm::VersionRow::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(row.map(VersionRecord::from))
    }

    #[instrument(skip(self, rows_data))]
    async fn replace_rows(
        &self,
        dataset_id: &str,
        version: &str,
        rows_data: &[Row],
    ) -> Result<(), Self::Error> {
        let mut conn = self.pool.get().await?;
        (&mut conn)
            .transaction(|conn| {
                async move {
                    diesel::delete(
                        rows::table
                            .filter(rows::dataset_id.eq(dataset_id))
                            .filter(rows::version.eq(version)),
                    )
                    .execute(conn)
                    .await?;

                    for (batch_idx, chunk) in rows_data.chunks(ROW_BATCH).enumerate() {
                        let base = batch_idx * ROW_BATCH;
                        let new_rows: Vec<orm::NewRowRecord> = chunk
                            .iter()
                            .enumerate()
                            .map(|(i, item)| orm::NewRowRecord {
                                dataset_id,
                                version,
                                ordinal: (base + i) as i64,
                                item: item.clone(),
                            })
                            .collect();
                        diesel::insert_into(rows::table)
                            .values(&new_rows)
                            .execute(conn)
                            .await?;
                    }
                    Ok::<_, diesel::result::Error>(())
                }
                .scope_boxed()
            })
            .await?;
        Ok(())
    }

    #[instrument(skip(self, delta_records))]
    async fn append_deltas(
        &self,
        dataset_id: &str,
        version: &str,
        delta_records: &[DeltaRecord],
    ) -> Result<(), Self::Error> {
        let mut conn = self.pool.get().await?;
        for chunk in delta_records.chunks(DELTA_BATCH) {
            let new_rows: Vec<orm::NewDeltaRow> = chunk
                .iter()
                .map(|d| orm::NewDeltaRow {
                    dataset_id,
                    version,
                    kind: kind_str(d.kind),
                    item_id: &d.item_id,
                    old_item: d.old_item.clone(),
                    new_item: d.new_item.clone(),
                    ts: d.ts,
                })
                .collect();
            diesel::insert_into(deltas::table)
                .values(&new_rows)
                .on_conflict((deltas::dataset_id, deltas::version, deltas::item_id, deltas::kind))
                .do_nothing()
                .execute(&mut conn)
                .await?;
        }
        Ok(())
    }

    async fn latest_ready_version(
        &self,
        dataset_id: &str,
        exclude_version: Option<&str>,
    ) -> Result<Option<String>, Self::Error> {
        let mut conn = self.pool.get().await?;
        let mut query = versions::table
            .filter(versions::dataset_id.eq(dataset_id))
            .filter(versions::status.eq("ready"))
            .into_boxed();
        if let Some(exclude) = exclude_version {
            query = query.filter(versions::version.ne(exclude));
        }
        let version = query
            .order((versions::ts.desc(), versions::version.desc()))
            .select(versions::version)
            .first(&mut conn)
            .await
            .optional()?;
        Ok(version)
    }

    async fn get_rows(&self, dataset_id: &str, version: &str) -> Result<Vec<Row>, Self::Error> {
        let mut conn = self.pool.get().await?;
        let items = rows::table
            .filter(rows::dataset_id.eq(dataset_id))
            .filter(rows::version.eq(version))
            .order(rows::ordinal.asc())
            .select(rows::item)
            .load(&mut conn)
            .await?;
        Ok(items)
    }

    async fn get_deltas(
        &self,
        dataset_id: &str,
        version: &str,
    ) -> Result<Vec<DeltaRecord>, Self::Error> {
        let mut conn = self.pool.get().await?;
        let loaded = deltas::table
            .filter(deltas::dataset_id.eq(dataset_id))
            .filter(deltas::version.eq(version))
            .order(deltas::id.asc())
            .select(orm::DeltaRow::as_select())
            .load(&mut conn)
            .await?;
        Ok(loaded.into_iter().map(DeltaRecord::from).collect())
    }

    async fn list_ready_versions(
        &self,
        dataset_id: &str,
        limit: u32,
    ) -> Result<Vec<VersionInfo>, Self::Error> {
        let mut conn = self.pool.get().await?;
        let loaded = versions::table
            .filter(versions::dataset_id.eq(dataset_id))
            .filter(versions::status.eq("ready"))
            .order((versions::ts.desc(), versions::version.desc()))
            .limit(limit as i64)
            .select(orm::VersionRow::as_select())
            .load(&mut conn)
            .await?;
        Ok(loaded
            .into_iter()
            .map(|r| VersionInfo {
                version: r.version,
                checksum: r.checksum,
                ts: r.ts,
                parent_version: r.parent_version,
            })
            .collect())
    }

    async fn upsert_user_context(
        &self,
        user_id: &str,
        dataset_id: &str,
        ctx: &UserContext,
    ) -> Result<(), Self::Error> {
        let mut conn = self.pool.get().await?;
        let ctx_json = serde_json::to_value(ctx).expect("UserContext always serializes");
        diesel::insert_into(user_contexts::table)
            .values(orm::UserContextRow {
                user_id: user_id.to_owned(),
                dataset_id: dataset_id.to_owned(),
                ctx: ctx_json.clone(),
                ts: ctx.ts,
            })
            .on_conflict((user_contexts::user_id, user_contexts::dataset_id))
            .do_update()
            .set((user_contexts::ctx.eq(ctx_json), user_contexts::ts.eq(ctx.ts)))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn get_user_context(
        &self,
        user_id: &str,
        dataset_id: &str,
    ) -> Result<Option<UserContext>, Self::Error> {
        let mut conn = self.pool.get().await?;
        let row = user_contexts::table
            .filter(user_contexts::user_id.eq(user_id))
            .filter(user_contexts::dataset_id.eq(dataset_id))
            .select(orm::UserContextRow::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(match row {
            Some(r) => Some(serde_json::from_value(r.ctx).unwrap_or_else(|err| {
                warn!(%err, "stored user context failed to deserialize, using default");
                UserContext::default()
            })),
            None => None,
        })
    }

    #[instrument(skip(self, view_rows))]
    async fn replace_user_view(
        &self,
        user_id: &str,
        dataset_id: &str,
        version: &str,
        view_rows: &[Row],
    ) -> Result<(), Self::Error> {
        let mut conn = self.pool.get().await?;
        (&mut conn)
            .transaction(|conn| {
                async move {
                    diesel::delete(
                        user_views::table
                            .filter(user_views::user_id.eq(user_id))
                            .filter(user_views::dataset_id.eq(dataset_id))
                            .filter(user_views::version.eq(version)),
                    )
                    .execute(conn)
                    .await?;

                    if view_rows.is_empty() {
                        debug!("projected view is empty, nothing to insert");
                        return Ok::<_, diesel::result::Error>(());
                    }

                    let now = chrono::Utc::now().timestamp();
                    let new_rows: Vec<orm::NewUserViewRow> = view_rows
                        .iter()
                        .enumerate()
                        .map(|(i, item)| orm::NewUserViewRow {
                            user_id,
                            dataset_id,
                            version,
                            ordinal: i as i64,
                            item: item.clone(),
                            ts: now,
                        })
                        .collect();
                    diesel::insert_into(user_views::table)
                        .values(&new_rows)
                        .execute(conn)
                        .await?;
                    Ok(())
                }
                .scope_boxed()
            })
            .await?;
        Ok(())
    }

    async fn upsert_cache_mirror(
        &self,
        dataset_id: &str,
        version: &str,
        snapshot: &PackagedSnapshot,
        expires_at: i64,
    ) -> Result<(), Self::Error> {
        let mut conn = self.pool.get().await?;
        let data = serde_json::to_value(snapshot).expect("PackagedSnapshot always serializes");
        diesel::insert_into(cache::table)
            .values(orm::CacheRow {
                dataset_id: dataset_id.to_owned(),
                version: version.to_owned(),
                data: data.clone(),
                checksum: snapshot.checksum.clone(),
                ts: snapshot.ts,
                expires_at,
            })
            .on_conflict((cache::dataset_id, cache::version))
            .do_update()
            .set((
                cache::data.eq(data),
                cache::checksum.eq(&snapshot.checksum),
                cache::ts.eq(snapshot.ts),
                cache::expires_at.eq(expires_at),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }
}
