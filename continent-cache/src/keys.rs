//! Key and topic namespace builders for the Hot Cache (§4.2).
//!
//! Re-exported from `continent_core::keys`, the canonical home, so callers
//! that already depend on this crate for `HotCache` don't need a second
//! import for the namespace they're addressing.
pub use continent_core::keys::{dataset_topic, latest, seen, snapshot, user_topic};
