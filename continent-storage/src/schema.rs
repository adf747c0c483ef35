// @generated by hand, mirroring this crate's migrations/ directory.
diesel::table! {
    versions (id) {
        id -> BigInt,
        dataset_id -> Text,
        version -> Text,
        checksum -> Text,
        ts -> BigInt,
        parent_version -> Nullable<Text>,
        diff_checksum -> Nullable<Text>,
        status -> Text,
    }
}

diesel::table! {
    rows (id) {
        id -> BigInt,
        dataset_id -> Text,
        version -> Text,
        ordinal -> BigInt,
        item -> Jsonb,
    }
}

diesel::table! {
    deltas (id) {
        id -> BigInt,
        dataset_id -> Text,
        version -> Text,
        kind -> Text,
        item_id -> Text,
        old_item -> Nullable<Jsonb>,
        new_item -> Nullable<Jsonb>,
        ts -> BigInt,
    }
}

diesel::table! {
    cache (dataset_id, version) {
        dataset_id -> Text,
        version -> Text,
        data -> Jsonb,
        checksum -> Text,
        ts -> BigInt,
        expires_at -> BigInt,
    }
}

diesel::table! {
    user_contexts (user_id, dataset_id) {
        user_id -> Text,
        dataset_id -> Text,
        ctx -> Jsonb,
        ts -> BigInt,
    }
}

diesel::table! {
    user_views (id) {
        id -> BigInt,
        user_id -> Text,
        dataset_id -> Text,
        version -> Text,
        ordinal -> BigInt,
        item -> Jsonb,
        ts -> BigInt,
    }
}

diesel::allow_tables_to_appear_in_same_query!(versions, rows, deltas, cache, user_contexts, user_views);
