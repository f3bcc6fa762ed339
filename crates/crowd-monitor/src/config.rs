//! Monitor configuration.

use std::path::PathBuf;
use std::time::Duration;

use crowd_models::AreaId;
use crowd_tracking::TrackerConfig;

/// Monitor configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Association and track-lifetime settings
    pub tracker: TrackerConfig,
    /// Minimum time between two alerts for the same area
    pub alert_cooldown: Duration,
    /// Historical recorder period
    pub record_interval: Duration,
    /// How often zone definitions are checked for changes
    pub zone_sync_interval: Duration,
    /// Upper bound on any single persistence call
    pub persist_timeout: Duration,
    /// Directory holding `zones_{area}.json` files
    pub zone_dir: PathBuf,
    /// Areas registered at startup, before their first frame
    pub areas: Vec<AreaId>,
    /// Threshold seeded into the in-memory store
    pub default_threshold: u32,
    /// Whether the historical recorder runs
    pub enable_recorder: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            alert_cooldown: Duration::from_secs(20),
            record_interval: Duration::from_secs(5),
            zone_sync_interval: Duration::from_secs(5),
            persist_timeout: Duration::from_millis(2000),
            zone_dir: PathBuf::from("zones"),
            areas: Vec::new(),
            default_threshold: 50,
            enable_recorder: true,
        }
    }
}

fn parse_areas(raw: &str) -> Vec<AreaId> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(AreaId::from)
        .collect()
}

impl MonitorConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            tracker: TrackerConfig::from_env(),
            alert_cooldown: Duration::from_secs(
                std::env::var("CROWD_ALERT_COOLDOWN_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(20),
            ),
            record_interval: Duration::from_secs(
                std::env::var("CROWD_RECORD_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            zone_sync_interval: Duration::from_secs(
                std::env::var("CROWD_ZONE_SYNC_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            persist_timeout: Duration::from_millis(
                std::env::var("CROWD_PERSIST_TIMEOUT_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2000),
            ),
            zone_dir: std::env::var("CROWD_ZONE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("zones")),
            areas: std::env::var("CROWD_AREAS")
                .map(|s| parse_areas(&s))
                .unwrap_or_default(),
            default_threshold: std::env::var("CROWD_DEFAULT_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(50),
            enable_recorder: std::env::var("CROWD_ENABLE_RECORDER")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.alert_cooldown, Duration::from_secs(20));
        assert_eq!(config.record_interval, Duration::from_secs(5));
        assert_eq!(config.tracker.track_buffer, 30);
        assert!(config.enable_recorder);
    }

    #[test]
    fn test_parse_areas_skips_blanks() {
        let areas = parse_areas(" entrance, ,foodcourt,");
        assert_eq!(areas, vec![AreaId::from("entrance"), AreaId::from("foodcourt")]);
    }
}
