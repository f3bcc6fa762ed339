//! Tracking state of one monitored area.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::debug;

use crowd_models::{AreaId, Detection, Zone};
use crowd_store::Revision;

use crate::associator::{Associator, Track, VisibleTrack};
use crate::config::TrackerConfig;
use crate::zones::count_occupancy;

/// Result of processing one frame in one area.
#[derive(Debug, Clone, Default)]
pub struct FrameOutcome {
    /// Raw detection count of the frame
    pub live_people: u32,
    /// Occupancy per zone id, every loaded zone included
    pub zone_counts: BTreeMap<u32, u32>,
    /// Tracks matched this frame
    pub tracks: Vec<VisibleTrack>,
    /// Ids of tracks created this frame
    pub created: Vec<u64>,
    /// Ids of tracks dropped this frame
    pub removed: Vec<u64>,
}

/// One area's associator, zone set and last counts.
///
/// Areas never share trackers; ids are unique only within one tracker.
#[derive(Debug)]
pub struct AreaTracker {
    area: AreaId,
    associator: Associator,
    zones: Vec<Zone>,
    zone_counts: BTreeMap<u32, u32>,
    live_people: u32,
    /// Zones each track occupied in the last counted frame
    zone_memory: HashMap<u64, BTreeSet<u32>>,
    revision: Option<Revision>,
    frames_processed: u64,
}

fn zeroed_counts(zones: &[Zone]) -> BTreeMap<u32, u32> {
    zones.iter().map(|z| (z.id, 0)).collect()
}

impl AreaTracker {
    pub fn new(area: AreaId, config: TrackerConfig, zones: Vec<Zone>, revision: Option<Revision>) -> Self {
        Self {
            area,
            associator: Associator::new(config),
            zone_counts: zeroed_counts(&zones),
            live_people: 0,
            zones,
            zone_memory: HashMap::new(),
            revision,
            frames_processed: 0,
        }
    }

    /// Associate one frame's detections and recount zones.
    pub fn process_frame(&mut self, detections: &[Detection]) -> FrameOutcome {
        let association = self.associator.update(detections);
        let occupancy = count_occupancy(&self.zones, &association.visible);

        for id in &association.created {
            debug!(area = %self.area, track_id = id, "New track");
        }
        self.log_zone_transitions(&occupancy.membership);

        self.zone_memory = occupancy.membership;
        self.zone_counts = occupancy.counts;
        self.live_people = u32::try_from(detections.len()).unwrap_or(u32::MAX);
        self.frames_processed += 1;

        FrameOutcome {
            live_people: self.live_people,
            zone_counts: self.zone_counts.clone(),
            tracks: association.visible,
            created: association.created,
            removed: association.removed,
        }
    }

    fn log_zone_transitions(&self, current: &HashMap<u64, BTreeSet<u32>>) {
        let empty = BTreeSet::new();
        for (track_id, zones) in current {
            let previous = self.zone_memory.get(track_id).unwrap_or(&empty);
            for zone_id in zones.difference(previous) {
                debug!(area = %self.area, track_id, zone_id, "Track entered zone");
            }
        }
        for (track_id, zones) in &self.zone_memory {
            let now = current.get(track_id).unwrap_or(&empty);
            for zone_id in zones.difference(now) {
                debug!(area = %self.area, track_id, zone_id, "Track left zone");
            }
        }
    }

    /// Replace the zone set. Counts are zeroed and zone memory cleared; tracks are kept.
    pub fn reload(&mut self, zones: Vec<Zone>, revision: Option<Revision>) {
        debug!(area = %self.area, zones = zones.len(), "Reloaded zones");
        self.zone_counts = zeroed_counts(&zones);
        self.zones = zones;
        self.zone_memory.clear();
        self.revision = revision;
    }

    /// Zero counts and forget zone memory without touching zones or tracks.
    pub fn reset_counts(&mut self) {
        self.zone_counts.values_mut().for_each(|c| *c = 0);
        self.zone_memory.clear();
    }

    pub fn area(&self) -> &AreaId {
        &self.area
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn zone_counts(&self) -> &BTreeMap<u32, u32> {
        &self.zone_counts
    }

    /// Raw detection count of the last processed frame. Reloads keep it.
    pub fn live_people(&self) -> u32 {
        self.live_people
    }

    /// Zones a track occupied in the last counted frame.
    pub fn zones_of(&self, track_id: u64) -> Option<&BTreeSet<u32>> {
        self.zone_memory.get(&track_id)
    }

    /// Every retained track, including ones currently missed.
    pub fn tracks(&self) -> &[Track] {
        self.associator.tracks()
    }

    /// Revision of the zone definition this tracker last loaded.
    pub fn revision(&self) -> Option<Revision> {
        self.revision
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker_with_zones(zones: Vec<Zone>) -> AreaTracker {
        AreaTracker::new(AreaId::from("entrance"), TrackerConfig::default(), zones, None)
    }

    #[test]
    fn test_live_people_counts_raw_detections() {
        let mut tracker = tracker_with_zones(vec![]);
        let outcome = tracker.process_frame(&[
            Detection::from_corners(0.0, 0.0, 50.0, 50.0, 0.9),
            Detection::from_corners(200.0, 200.0, 250.0, 250.0, 0.2),
        ]);

        assert_eq!(outcome.live_people, 2);
        assert_eq!(outcome.tracks.len(), 1);
        assert!(outcome.zone_counts.is_empty());
    }

    #[test]
    fn test_zone_counts_recomputed_each_frame() {
        let mut tracker = tracker_with_zones(vec![Zone::rectangle(1, "Door", 0.0, 0.0, 100.0, 100.0)]);
        assert_eq!(tracker.zone_counts()[&1], 0);

        let outcome = tracker.process_frame(&[Detection::from_corners(10.0, 10.0, 60.0, 60.0, 0.9)]);
        assert_eq!(outcome.zone_counts[&1], 1);
        assert_eq!(tracker.zones_of(1), Some(&BTreeSet::from([1])));

        let outcome = tracker.process_frame(&[]);
        assert_eq!(outcome.zone_counts[&1], 0);
        assert_eq!(outcome.live_people, 0);
        assert!(tracker.zones_of(1).is_none());
    }

    #[test]
    fn test_reload_keeps_tracks_and_zeroes_counts() {
        let mut tracker = tracker_with_zones(vec![Zone::rectangle(1, "Door", 0.0, 0.0, 100.0, 100.0)]);
        tracker.process_frame(&[Detection::from_corners(10.0, 10.0, 60.0, 60.0, 0.9)]);
        let mean_before = *tracker.tracks()[0].motion().mean();

        tracker.reload(
            vec![
                Zone::rectangle(1, "Door", 0.0, 0.0, 100.0, 100.0),
                Zone::rectangle(2, "Hall", 100.0, 0.0, 200.0, 100.0),
            ],
            Some(Revision(7)),
        );

        assert_eq!(tracker.zone_counts(), &BTreeMap::from([(1, 0), (2, 0)]));
        assert!(tracker.zones_of(1).is_none());
        assert_eq!(tracker.tracks()[0].id(), 1);
        assert_eq!(*tracker.tracks()[0].motion().mean(), mean_before);
        assert_eq!(tracker.revision(), Some(Revision(7)));
        assert_eq!(tracker.live_people(), 1);
    }

    #[test]
    fn test_reset_counts_keeps_zones() {
        let mut tracker = tracker_with_zones(vec![Zone::rectangle(3, "Queue", 0.0, 0.0, 100.0, 100.0)]);
        tracker.process_frame(&[Detection::from_corners(10.0, 10.0, 60.0, 60.0, 0.9)]);

        tracker.reset_counts();

        assert_eq!(tracker.zone_counts()[&3], 0);
        assert_eq!(tracker.zones().len(), 1);
        assert_eq!(tracker.tracks().len(), 1);
    }
}
