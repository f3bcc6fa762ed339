//! Tracker configuration.

/// Association and track-lifetime settings shared by every area.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Detections scoring at or above this are high-confidence
    pub track_thresh: f32,
    /// Minimum IoU for a track/detection pair to match
    pub match_thresh: f64,
    /// Consecutive missed frames before a track is removed
    pub track_buffer: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            track_thresh: 0.5,
            match_thresh: 0.7,
            track_buffer: 30,
        }
    }
}

impl TrackerConfig {
    /// Load from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            track_thresh: std::env::var("CROWD_TRACK_THRESH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.track_thresh),
            match_thresh: std::env::var("CROWD_MATCH_THRESH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.match_thresh),
            track_buffer: std::env::var("CROWD_TRACK_BUFFER")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.track_buffer),
        }
    }
}
