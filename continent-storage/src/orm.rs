//! Diesel row types for the tables defined in `schema.rs`.
//!
//! Following this repo's convention, the ORM layer stays a thin mirror of
//! the tables; translation to/from `continent_core::model` happens in
//! `gateway.rs`, never here.
use diesel::prelude::*;
use serde_json::Value;

use crate::schema::{cache, deltas, rows, user_contexts, user_views, versions};

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = versions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct VersionRow {
    pub id: i64,
    pub dataset_id: String,
    pub version: String,
    pub checksum: String,
    pub ts: i64,
    pub parent_version: Option<String>,
    pub diff_checksum: Option<String>,
    pub status: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = versions)]
pub struct NewVersionRow<'a> {
    pub dataset_id: &'a str,
    pub version: &'a str,
    pub checksum: &'a str,
    pub ts: i64,
    pub parent_version: Option<&'a str>,
    pub diff_checksum: Option<&'a str>,
    pub status: &'a str,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = rows)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RowRecord {
    pub id: i64,
    pub dataset_id: String,
    pub version: String,
    pub ordinal: i64,
    pub item: Value,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = rows)]
pub struct NewRowRecord<'a> {
    pub dataset_id: &'a str,
    pub version: &'a str,
    pub ordinal: i64,
    pub item: Value,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = deltas)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DeltaRow {
    pub id: i64,
    pub dataset_id: String,
    pub version: String,
    pub kind: String,
    pub item_id: String,
    pub old_item: Option<Value>,
    pub new_item: Option<Value>,
    pub ts: i64,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = deltas)]
pub struct NewDeltaRow<'a> {
    pub dataset_id: &'a str,
    pub version: &'a str,
    pub kind: &'a str,
    pub item_id: &'a str,
    pub old_item: Option<Value>,
    pub new_item: Option<Value>,
    pub ts: i64,
}

#[derive(Queryable, Selectable, Insertable, Identifiable, Debug, Clone)]
#[diesel(table_name = cache)]
#[diesel(primary_key(dataset_id, version))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CacheRow {
    pub dataset_id: String,
    pub version: String,
    pub data: Value,
    pub checksum: String,
    pub ts: i64,
    pub expires_at: i64,
}

#[derive(Queryable, Selectable, Insertable, Identifiable, Debug, Clone)]
#[diesel(table_name = user_contexts)]
#[diesel(primary_key(user_id, dataset_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserContextRow {
    pub user_id: String,
    pub dataset_id: String,
    pub ctx: Value,
    pub ts: i64,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = user_views)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserViewRow {
    pub id: i64,
    pub user_id: String,
    pub dataset_id: String,
    pub version: String,
    pub ordinal: i64,
    pub item: Value,
    pub ts: i64,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = user_views)]
pub struct NewUserViewRow<'a> {
    pub user_id: &'a str,
    pub dataset_id: &'a str,
    pub version: &'a str,
    pub ordinal: i64,
    pub item: Value,
    pub ts: i64,
}
