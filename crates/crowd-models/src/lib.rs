//! Shared data models for the CrowdCount occupancy core.
//!
//! This crate provides Serde-serializable types for:
//! - Monitored areas and their published count snapshots
//! - Per-frame detections and bounding-box geometry
//! - Zone polygons
//! - Alerts, threshold violations and historical snapshots

pub mod alert;
pub mod area;
pub mod detection;
pub mod geometry;
pub mod snapshot;
pub mod zone;

// Re-export common types
pub use alert::{Alert, AlertId, AlertStatus, NewAlert, NewViolation, Threshold, ThresholdViolation};
pub use area::{AreaId, AreaStatus};
pub use detection::Detection;
pub use geometry::{BoundingBox, Point};
pub use snapshot::{HistoricalSnapshot, ZoneCountSnapshot, ZoneRef};
pub use zone::{Zone, ZoneError};
