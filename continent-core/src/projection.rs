//! C5 business logic: applying a `UserContext` (filter + sort) to a row
//! sequence. Pure and deterministic (§3 invariant, §8 "Projection
//! determinism"); the workflow crate is responsible for persistence and
//! notification around this function.
use std::cmp::Ordering;

use serde_json::Value;

use crate::model::{Row, SortSpec, UserContext};

/// A row passes iff every `(field, value)` entry in `ctx.filters` matches
/// (§4.5 step 4).
fn passes_filters(row: &Row, ctx: &UserContext) -> bool {
    ctx.filters
        .iter()
        .all(|(field, expected)| expected.matches(row.get(field)))
}

/// Total order over JSON values used for sorting: `null < bool < number <
/// string < array < object`, then within-type comparison. This is not part
/// of the wire contract — it only needs to be *consistent*, since the only
/// tested cross-row comparisons are same-typed (§8 scenario 6).
fn value_cmp(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .unwrap_or(f64::NAN)
            .partial_cmp(&y.as_f64().unwrap_or(f64::NAN))
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Sort key: missing fields sort as absent, treated as the minimum for
/// ascending order (§4.5 step 5).
fn sort_key_cmp(a: &Row, b: &Row, by: &str) -> Ordering {
    match (a.get(by), b.get(by)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => value_cmp(x, y),
    }
}

/// Applies `ctx`'s filter and sort to `rows`, returning the projected
/// sequence. Filtering keeps input order; sort, when present, is stable.
pub fn apply_context(rows: &[Row], ctx: &UserContext) -> Vec<Row> {
    let mut out: Vec<Row> = rows
        .iter()
        .filter(|row| passes_filters(row, ctx))
        .cloned()
        .collect();

    if let Some(SortSpec { by, desc }) = &ctx.sort {
        out.sort_by(|a, b| {
            let ord = sort_key_cmp(a, b, by);
            if *desc {
                ord.reverse()
            } else {
                ord
            }
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FilterValue;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn filter_and_sort_matches_scenario_6() {
        let rows = vec![
            json!({"id": 1, "status": "new", "country": "IN", "amount": 1200}),
            json!({"id": 2, "status": "shipped", "country": "US", "amount": 800}),
            json!({"id": 3, "status": "new", "country": "IN", "amount": 1500}),
        ];
        let mut filters = BTreeMap::new();
        filters.insert("status".to_owned(), FilterValue::Many(vec![json!("new")]));
        filters.insert("country".to_owned(), FilterValue::One(json!("IN")));
        let ctx = UserContext {
            filters,
            sort: Some(SortSpec { by: "amount".to_owned(), desc: true }),
            selection: None,
            ts: 0,
        };

        let projected = apply_context(&rows, &ctx);
        let ids: Vec<_> = projected.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[test]
    fn missing_sort_key_sorts_as_minimum_ascending() {
        let rows = vec![json!({"id": 1, "amount": 5}), json!({"id": 2}), json!({"id": 3, "amount": 1})];
        let ctx = UserContext {
            sort: Some(SortSpec { by: "amount".to_owned(), desc: false }),
            ..Default::default()
        };
        let projected = apply_context(&rows, &ctx);
        let ids: Vec<_> = projected.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn empty_filters_pass_everything() {
        let rows = vec![json!({"id": 1}), json!({"id": 2})];
        let ctx = UserContext::default();
        assert_eq!(apply_context(&rows, &ctx).len(), 2);
    }
}
