//! Registry of per-area trackers.
//!
//! The map itself is only locked for lookup and insertion. Each tracker sits
//! behind its own mutex, so frames for one area are serialized while
//! different areas proceed in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{info, warn};

use crowd_models::{AreaId, Detection, Zone};
use crowd_store::{Revision, ZoneStore};

use crate::area_tracker::{AreaTracker, FrameOutcome};
use crate::config::TrackerConfig;

/// Owns one [`AreaTracker`] per area, created on first use and kept for the
/// life of the registry.
pub struct AreaRegistry {
    config: TrackerConfig,
    zone_store: Arc<dyn ZoneStore>,
    trackers: RwLock<HashMap<AreaId, Arc<Mutex<AreaTracker>>>>,
}

impl AreaRegistry {
    pub fn new(config: TrackerConfig, zone_store: Arc<dyn ZoneStore>) -> Self {
        Self {
            config,
            zone_store,
            trackers: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn zone_store(&self) -> &Arc<dyn ZoneStore> {
        &self.zone_store
    }

    /// Read an area's zones, degrading to an empty set on error.
    ///
    /// The revision is read first so a change racing the load is picked up
    /// by the next refresh.
    fn load_zones(&self, area: &AreaId) -> (Vec<Zone>, Option<Revision>) {
        let revision = self.zone_store.revision(area);
        match self.zone_store.load(area) {
            Ok(zones) => (zones, revision),
            Err(e) => {
                warn!(area = %area, error = %e, "Failed to load zones, using empty zone set");
                (Vec::new(), revision)
            }
        }
    }

    /// Get the tracker of an area, creating it on first reference.
    pub fn tracker(&self, area: &AreaId) -> Arc<Mutex<AreaTracker>> {
        if let Some(tracker) = self
            .trackers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(area)
        {
            return Arc::clone(tracker);
        }

        let (zones, revision) = self.load_zones(area);
        let mut trackers = self.trackers.write().unwrap_or_else(PoisonError::into_inner);
        let tracker = trackers.entry(area.clone()).or_insert_with(|| {
            info!(area = %area, zones = zones.len(), "Created area tracker");
            Arc::new(Mutex::new(AreaTracker::new(
                area.clone(),
                self.config.clone(),
                zones,
                revision,
            )))
        });
        Arc::clone(tracker)
    }

    /// Run `f` with exclusive access to an area's tracker.
    pub fn with_area<R>(&self, area: &AreaId, f: impl FnOnce(&mut AreaTracker) -> R) -> R {
        let tracker = self.tracker(area);
        let mut guard = tracker.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Process one frame for an area.
    pub fn process_frame(&self, area: &AreaId, detections: &[Detection]) -> FrameOutcome {
        self.with_area(area, |tracker| tracker.process_frame(detections))
    }

    /// Re-read an area's zones from the store. Returns the number of zones loaded.
    pub fn reload(&self, area: &AreaId) -> usize {
        self.reload_with(area, |_| ()).0
    }

    /// Reload an area's zones, then run `f` on the reloaded tracker before
    /// its lock is released.
    pub fn reload_with<R>(&self, area: &AreaId, f: impl FnOnce(&mut AreaTracker) -> R) -> (usize, R) {
        let (zones, revision) = self.load_zones(area);
        let count = zones.len();
        let result = self.with_area(area, |tracker| {
            tracker.reload(zones, revision);
            f(tracker)
        });
        info!(area = %area, zones = count, "Zones reloaded");
        (count, result)
    }

    /// Zero an area's counts without reloading zones.
    pub fn reset_counts(&self, area: &AreaId) {
        self.with_area(area, AreaTracker::reset_counts);
    }

    /// Reload every known area whose zone revision changed since its last load.
    pub fn refresh_changed(&self) -> Vec<AreaId> {
        self.refresh_changed_with(|_| ())
    }

    /// Like [`refresh_changed`](Self::refresh_changed), running `on_reload`
    /// on each reloaded tracker while it is still locked.
    pub fn refresh_changed_with(&self, mut on_reload: impl FnMut(&mut AreaTracker)) -> Vec<AreaId> {
        let mut reloaded = Vec::new();
        for area in self.areas() {
            let current = self.zone_store.revision(&area);
            let loaded = self.with_area(&area, |tracker| tracker.revision());
            if current != loaded {
                self.reload_with(&area, &mut on_reload);
                reloaded.push(area);
            }
        }
        reloaded
    }

    /// Known area ids in sorted order.
    pub fn areas(&self) -> Vec<AreaId> {
        let mut areas: Vec<AreaId> = self
            .trackers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        areas.sort();
        areas
    }

    pub fn contains(&self, area: &AreaId) -> bool {
        self.trackers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(area)
    }

    /// Zones currently loaded for an area.
    pub fn zones(&self, area: &AreaId) -> Vec<Zone> {
        self.with_area(area, |tracker| tracker.zones().to_vec())
    }
}
