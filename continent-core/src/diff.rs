//! C4: the diff engine.
//!
//! A pure function of two row sequences plus a clock reading used only to
//! stamp the produced records. No external state, stable under
//! re-invocation, bounded to roughly `|old| + |new|` map entries.
use std::collections::HashMap;

use serde_json::Value;
use tracing::warn;

use crate::model::{DeltaKind, DeltaRecord, Row};

/// Extracts the item identity used for diffing: the row's `id` field,
/// coerced to its string form. Rows without an `id` are skipped (§4.3,
/// `DiffItemMissingId`), not treated as fatal.
fn extract_id(row: &Row) -> Option<String> {
    let id = row.get("id")?;
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => None,
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Builds an identity → row map while recording first-seen order, skipping
/// rows with no usable `id`.
fn index_by_id(rows: &[Row]) -> (HashMap<String, &Row>, Vec<String>) {
    let mut map = HashMap::with_capacity(rows.len());
    let mut order = Vec::with_capacity(rows.len());
    for row in rows {
        match extract_id(row) {
            Some(id) => {
                if !map.contains_key(&id) {
                    order.push(id.clone());
                }
                map.insert(id, row);
            }
            None => warn!("row missing usable 'id' field, skipping during diff"),
        }
    }
    (map, order)
}

/// Computes add/update/delete records between `old_rows` (the parent
/// version's rows, empty if there is no parent) and `new_rows` (the version
/// being ingested). `ts` stamps every produced record.
///
/// Ordering (part of the `diff_checksum` contract, §4.3): `add`/`update`
/// records in the order their keys first appear in `new_rows`, followed by
/// `delete` records in the order their keys first appear in `old_rows`.
pub fn compute_diff(
    dataset_id: &str,
    version: &str,
    old_rows: &[Row],
    new_rows: &[Row],
    ts: i64,
) -> Vec<DeltaRecord> {
    let (old_map, _) = index_by_id(old_rows);
    let (new_map, new_order) = index_by_id(new_rows);
    let (_, old_order) = index_by_id(old_rows);

    let mut out = Vec::new();

    for item_id in &new_order {
        let new_item = new_map[item_id];
        match old_map.get(item_id) {
            None => out.push(DeltaRecord {
                dataset_id: dataset_id.to_owned(),
                version: version.to_owned(),
                kind: DeltaKind::Add,
                item_id: item_id.clone(),
                old_item: None,
                new_item: Some(new_item.clone()),
                ts,
            }),
            Some(old_item) => {
                if *old_item != new_item {
                    out.push(DeltaRecord {
                        dataset_id: dataset_id.to_owned(),
                        version: version.to_owned(),
                        kind: DeltaKind::Update,
                        item_id: item_id.clone(),
                        old_item: Some((*old_item).clone()),
                        new_item: Some(new_item.clone()),
                        ts,
                    });
                }
            }
        }
    }

    for item_id in &old_order {
        if !new_map.contains_key(item_id) {
            let old_item = old_map[item_id];
            out.push(DeltaRecord {
                dataset_id: dataset_id.to_owned(),
                version: version.to_owned(),
                kind: DeltaKind::Delete,
                item_id: item_id.clone(),
                old_item: Some(old_item.clone()),
                new_item: None,
                ts,
            });
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn first_version_is_all_adds() {
        let rows = vec![json!({"id": 1, "s": "a"}), json!({"id": 2, "s": "b"})];
        let deltas = compute_diff("D1", "v1", &[], &rows, 100);
        assert_eq!(deltas.len(), 2);
        assert!(deltas.iter().all(|d| d.kind == DeltaKind::Add));
        assert_eq!(deltas[0].item_id, "1");
        assert_eq!(deltas[1].item_id, "2");
    }

    #[test]
    fn pure_update() {
        let old = vec![json!({"id": 1, "s": "a"}), json!({"id": 2, "s": "b"})];
        let new = vec![json!({"id": 1, "s": "a"}), json!({"id": 2, "s": "c"})];
        let deltas = compute_diff("D1", "v2", &old, &new, 200);
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].kind, DeltaKind::Update);
        assert_eq!(deltas[0].item_id, "2");
        assert_eq!(deltas[0].old_item, Some(json!({"id": 2, "s": "b"})));
        assert_eq!(deltas[0].new_item, Some(json!({"id": 2, "s": "c"})));
    }

    #[test]
    fn delete_and_add_in_canonical_order() {
        let old = vec![json!({"id": 1, "s": "a"}), json!({"id": 2, "s": "c"})];
        let new = vec![json!({"id": 2, "s": "c"}), json!({"id": 3, "s": "d"})];
        let deltas = compute_diff("D1", "v3", &old, &new, 300);
        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0].kind, DeltaKind::Add);
        assert_eq!(deltas[0].item_id, "3");
        assert_eq!(deltas[1].kind, DeltaKind::Delete);
        assert_eq!(deltas[1].item_id, "1");
    }

    #[test]
    fn reingest_identical_rows_yields_no_deltas() {
        let rows = vec![json!({"id": 1, "s": "a"}), json!({"id": 2, "s": "c"})];
        let deltas = compute_diff("D1", "v2b", &rows, &rows, 400);
        assert!(deltas.is_empty());
    }

    #[test]
    fn rows_missing_id_are_skipped_not_fatal() {
        let old = vec![json!({"id": 1, "s": "a"})];
        let new = vec![json!({"s": "no id here"}), json!({"id": 1, "s": "a"})];
        let deltas = compute_diff("D1", "v2", &old, &new, 500);
        assert!(deltas.is_empty());
    }

    #[test]
    fn numeric_literal_distinction_is_preserved() {
        let old = vec![json!({"id": 1, "amount": 1})];
        let new = vec![json!({"id": 1, "amount": 1.0})];
        let deltas = compute_diff("D1", "v2", &old, &new, 600);
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].kind, DeltaKind::Update);
    }
}
