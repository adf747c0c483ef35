//! Storage-agnostic core of the versioned dataset distribution engine:
//! data model, canonical serialization, the diff engine (C4), projection
//! (C5 business logic), and the trait boundaries `continent-storage` (C1)
//! and `continent-cache` (C2) implement.

pub mod canonical;
pub mod diff;
pub mod grammar;
pub mod keys;
pub mod model;
pub mod projection;
pub mod traits;
