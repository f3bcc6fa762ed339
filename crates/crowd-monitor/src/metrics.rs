//! Metrics for frame processing, alerting and recording.
//!
//! No exporter is installed here; without a recorder these calls are no-ops.

use metrics::{counter, gauge};

use crowd_models::AreaId;

/// Metric names as constants for consistency.
pub mod names {
    // Tracking metrics
    pub const FRAMES_PROCESSED_TOTAL: &str = "crowd_frames_processed_total";
    pub const TRACKS_CREATED_TOTAL: &str = "crowd_tracks_created_total";
    pub const LIVE_PEOPLE: &str = "crowd_live_people";

    // Alert metrics
    pub const ALERTS_RAISED_TOTAL: &str = "crowd_alerts_raised_total";
    pub const ALERTS_SUPPRESSED_TOTAL: &str = "crowd_alerts_suppressed_total";

    // Persistence metrics
    pub const PERSISTENCE_FAILURES_TOTAL: &str = "crowd_persistence_failures_total";
    pub const SNAPSHOTS_WRITTEN_TOTAL: &str = "crowd_snapshots_written_total";
}

/// Record a processed frame and the live count it produced.
pub fn record_frame(area: &AreaId, live_people: u32, tracks_created: usize) {
    let labels = [("area", area.to_string())];
    counter!(names::FRAMES_PROCESSED_TOTAL, &labels).increment(1);
    if tracks_created > 0 {
        counter!(names::TRACKS_CREATED_TOTAL, &labels).increment(tracks_created as u64);
    }
    gauge!(names::LIVE_PEOPLE, &labels).set(live_people as f64);
}

pub fn record_alert_raised(area: &AreaId) {
    let labels = [("area", area.to_string())];
    counter!(names::ALERTS_RAISED_TOTAL, &labels).increment(1);
}

/// Record a breach dropped because the area was in cooldown.
pub fn record_alert_suppressed(area: &AreaId) {
    let labels = [("area", area.to_string())];
    counter!(names::ALERTS_SUPPRESSED_TOTAL, &labels).increment(1);
}

/// Record a failed or timed-out persistence call.
pub fn record_persistence_failure(op: &'static str) {
    counter!(names::PERSISTENCE_FAILURES_TOTAL, "op" => op).increment(1);
}

pub fn record_snapshots_written(count: u64) {
    counter!(names::SNAPSHOTS_WRITTEN_TOTAL).increment(count);
}
