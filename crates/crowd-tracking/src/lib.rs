//! Per-area people tracking.
//!
//! This crate provides:
//! - A 7-state Kalman motion estimator per track
//! - Two-round greedy IoU association of detections to tracks
//! - Point-in-polygon zone occupancy counting
//! - Per-area trackers and the registry that owns them
//!
//! Everything here is synchronous and CPU-only. Failures (missing zones,
//! degenerate boxes, singular covariances) degrade and are logged rather
//! than returned.

pub mod area_tracker;
pub mod associator;
pub mod config;
pub mod motion;
pub mod registry;
pub mod zones;

pub use area_tracker::{AreaTracker, FrameOutcome};
pub use associator::{greedy_iou_match, AssociationOutcome, Associator, Matching, Track, VisibleTrack};
pub use config::TrackerConfig;
pub use motion::MotionEstimator;
pub use registry::AreaRegistry;
pub use zones::{count_occupancy, point_in_polygon, ZoneOccupancy};
