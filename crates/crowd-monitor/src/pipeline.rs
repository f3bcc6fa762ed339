//! Frame pipeline: track, count, publish, alert.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crowd_models::{Alert, AreaId, AreaStatus, Detection, ZoneCountSnapshot};
use crowd_tracking::{AreaRegistry, AreaTracker, VisibleTrack};

use crate::alerts::AlertManager;
use crate::logging::AreaLogger;
use crate::metrics;
use crate::state::StateBoard;

/// One line of detector output: `{"area": "...", "detections": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameInput {
    pub area: AreaId,
    #[serde(default)]
    pub detections: Vec<Detection>,
}

impl FrameInput {
    /// Parse a JSON line. Blank lines yield `None`.
    pub fn parse_line(line: &str) -> Result<Option<Self>, serde_json::Error> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        serde_json::from_str(line).map(Some)
    }
}

/// What one processed frame produced.
#[derive(Debug, Clone)]
pub struct ProcessedFrame {
    /// Snapshot published to the state board
    pub snapshot: Arc<ZoneCountSnapshot>,
    /// Tracks matched in this frame
    pub tracks: Vec<VisibleTrack>,
    /// Alert raised by this frame, if any
    pub alert: Option<Alert>,
}

/// Drives frames through the registry, the state board and the alert manager.
pub struct FramePipeline {
    registry: Arc<AreaRegistry>,
    board: Arc<StateBoard>,
    alerts: Arc<AlertManager>,
}

impl FramePipeline {
    pub fn new(registry: Arc<AreaRegistry>, board: Arc<StateBoard>, alerts: Arc<AlertManager>) -> Self {
        Self {
            registry,
            board,
            alerts,
        }
    }

    pub fn registry(&self) -> &Arc<AreaRegistry> {
        &self.registry
    }

    pub fn board(&self) -> &Arc<StateBoard> {
        &self.board
    }

    pub fn alerts(&self) -> &Arc<AlertManager> {
        &self.alerts
    }

    /// Create an area's tracker and make it visible on the board before any frame.
    pub fn register_area(&self, area: &AreaId) {
        self.registry.tracker(area);
        self.board.register(area);
    }

    /// Process one frame of detections for an area.
    ///
    /// The snapshot is published while the area is still locked, so the board
    /// never goes back to an older frame. The threshold check runs after the
    /// lock is released.
    pub async fn process_frame(&self, area: &AreaId, detections: &[Detection]) -> ProcessedFrame {
        if !self.registry.contains(area) {
            self.create_tracker(area).await;
        }

        let logger = AreaLogger::new(area, "frame");
        let (snapshot, outcome) = logger.create_span().in_scope(|| {
            self.registry.with_area(area, |tracker| {
                let outcome = tracker.process_frame(detections);
                (self.publish_state(tracker), outcome)
            })
        });

        logger.log_frame(snapshot.live_people, outcome.tracks.len(), outcome.created.len());
        metrics::record_frame(area, snapshot.live_people, outcome.created.len());

        let alert = self
            .alerts
            .check_threshold(area, snapshot.live_people, &snapshot.zone_counts)
            .await;

        ProcessedFrame {
            snapshot,
            tracks: outcome.tracks,
            alert,
        }
    }

    /// Create a tracker off the async workers, since it reads the zone store.
    async fn create_tracker(&self, area: &AreaId) {
        let registry = Arc::clone(&self.registry);
        let owned = area.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || {
            registry.tracker(&owned);
        })
        .await
        {
            warn!(area = %area, error = %e, "Tracker creation task failed");
        }
    }

    /// Reload an area's zones and publish its zeroed counts.
    pub fn reload_zones(&self, area: &AreaId) -> usize {
        let (loaded, _) = self
            .registry
            .reload_with(area, |tracker| self.publish_state(tracker));
        loaded
    }

    /// Zero an area's zone counts without reloading, and publish them.
    pub fn reset_counts(&self, area: &AreaId) {
        self.registry.with_area(area, |tracker| {
            tracker.reset_counts();
            self.publish_state(tracker);
        });
    }

    /// Reload every area whose zone definition changed and publish each
    /// reloaded area's zeroed counts. Reads the zone store, so async callers
    /// run it on a blocking thread.
    pub fn sync_zones(&self) -> Vec<AreaId> {
        let reloaded = self.registry.refresh_changed_with(|tracker| {
            self.publish_state(tracker);
        });
        for area in &reloaded {
            AreaLogger::new(area, "zone_sync").log_info("Zone definition changed, reloaded");
        }
        reloaded
    }

    /// Publish a tracker's current state. Callers hold the area lock, so
    /// publishes for one area are ordered the same as tracker changes.
    fn publish_state(&self, tracker: &AreaTracker) -> Arc<ZoneCountSnapshot> {
        let status = if tracker.frames_processed() > 0 {
            AreaStatus::Active
        } else {
            AreaStatus::Initializing
        };
        self.board.publish(ZoneCountSnapshot {
            area: tracker.area().clone(),
            live_people: tracker.live_people(),
            zone_counts: tracker.zone_counts().clone(),
            timestamp: Utc::now(),
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crowd_models::BoundingBox;

    #[test]
    fn test_parse_line() {
        let line = r#"{"area": "entrance", "detections": [{"bbox": [100, 100, 200, 200], "score": 0.9}]}"#;
        let frame = FrameInput::parse_line(line).unwrap().unwrap();

        assert_eq!(frame.area, AreaId::from("entrance"));
        assert_eq!(frame.detections[0].bbox, BoundingBox::new(100.0, 100.0, 200.0, 200.0));
        assert_eq!(frame.detections[0].score, 0.9);
    }

    #[test]
    fn test_parse_blank_and_missing_detections() {
        assert!(FrameInput::parse_line("   ").unwrap().is_none());

        let frame = FrameInput::parse_line(r#"{"area": "retail"}"#).unwrap().unwrap();
        assert!(frame.detections.is_empty());

        assert!(FrameInput::parse_line("{oops").is_err());
    }
}
