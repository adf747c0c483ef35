//! Canonical JSON serialization and checksum helpers.
//!
//! "Canonical" here means: UTF-8 JSON, maps encoded with their keys sorted
//! (achieved for free by `serde_json::Value`'s `Object` variant, which is
//! backed by a `BTreeMap` unless the `preserve_order` feature is enabled —
//! it is not, in this workspace), and no insignificant whitespace. Two
//! structurally equal values always canonicalize to the same bytes
//! regardless of the order their fields were constructed in.
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Serializes `value` to its canonical byte representation: field-sorted
/// maps, no insignificant whitespace.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    // Route through `serde_json::Value` first rather than calling
    // `serde_json::to_vec` on `value` directly: a plain struct serializes
    // its fields in declaration order, not sorted, and only `Value`'s
    // `Object` variant (a key-ordered map) guarantees the sort this
    // function's contract promises.
    let value = serde_json::to_value(value).expect("canonical serialization is infallible for our types");
    serde_json::to_vec(&value).expect("canonical serialization is infallible for our types")
}

/// Hex-encoded SHA-256 of `value`'s canonical serialization.
pub fn checksum_of<T: Serialize>(value: &T) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_bytes(value));
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn checksum_is_stable_under_key_reordering() {
        let a = json!({"id": 1, "s": "a"});
        let b = json!({"s": "a", "id": 1});
        assert_eq!(checksum_of(&a), checksum_of(&b));
    }

    #[test]
    fn checksum_distinguishes_int_and_float() {
        let int_val = json!({"id": 1, "amount": 1});
        let float_val = json!({"id": 1, "amount": 1.0});
        assert_ne!(checksum_of(&int_val), checksum_of(&float_val));
    }

    #[test]
    fn plain_structs_are_canonicalized_field_sorted() {
        use crate::model::{DeltaKind, DeltaRecord};

        let record = DeltaRecord {
            dataset_id: "D1".to_owned(),
            version: "v1.aaaaaaaa".to_owned(),
            kind: DeltaKind::Add,
            item_id: "1".to_owned(),
            old_item: None,
            new_item: Some(json!({"id": 1})),
            ts: 100,
        };
        let bytes = canonical_bytes(&record);
        let text = String::from_utf8(bytes).expect("utf-8");
        // `DeltaRecord` declares `kind` before `item_id`, but alphabetically
        // `item_id` sorts first — a discriminating check that this goes
        // through key-sorted `Value` encoding rather than struct
        // declaration order.
        let kind_pos = text.find("\"kind\"").expect("kind key present");
        let item_id_pos = text.find("\"item_id\"").expect("item_id key present");
        assert!(item_id_pos < kind_pos, "expected field-sorted encoding, got: {text}");
    }
}
