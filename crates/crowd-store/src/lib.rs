//! Collaborator interfaces for the CrowdCount core.
//!
//! This crate provides:
//! - `ZoneStore`, `ThresholdSource` and `PersistenceSink` traits
//! - A JSON zone-file store (`zones_{area}.json`)
//! - An in-memory store implementing all three traits

pub mod error;
pub mod memory;
pub mod traits;
pub mod zone_file;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use traits::{PersistenceSink, Revision, ThresholdSource, ZoneStore};
pub use zone_file::ZoneFileStore;
