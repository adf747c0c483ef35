//! Key and topic namespace builders for the Hot Cache (§4.2).
//!
//! Canonical home for these so `continent-workflow` and any future facade
//! can address the same keys the `continent-cache` implementation uses,
//! without depending on a concrete cache backend.

pub fn seen(dataset_id: &str, version: &str) -> String {
    format!("seen:{dataset_id}:{version}")
}

pub fn snapshot(dataset_id: &str, version: &str) -> String {
    format!("continent:{dataset_id}:{version}")
}

pub fn latest(dataset_id: &str) -> String {
    format!("continent:{dataset_id}:latest")
}

pub fn dataset_topic(dataset_id: &str) -> String {
    format!("topic:{dataset_id}")
}

pub fn user_topic(dataset_id: &str, user_id: &str) -> String {
    format!("topic:{dataset_id}:{user_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_expected_namespaces() {
        assert_eq!(seen("ds", "v1.abc"), "seen:ds:v1.abc");
        assert_eq!(snapshot("ds", "v1.abc"), "continent:ds:v1.abc");
        assert_eq!(latest("ds"), "continent:ds:latest");
        assert_eq!(dataset_topic("ds"), "topic:ds");
        assert_eq!(user_topic("ds", "u1"), "topic:ds:u1");
    }
}
