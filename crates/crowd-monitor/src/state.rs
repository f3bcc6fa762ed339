//! Latest published counts per area.
//!
//! Each publish swaps a whole `Arc<ZoneCountSnapshot>`, so a reader sees
//! `live_people` and `zone_counts` from the same frame.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crowd_models::{AreaId, ZoneCountSnapshot};

/// Read access to the latest snapshot of every area.
pub trait AreaStateSource: Send + Sync {
    fn latest(&self) -> Vec<Arc<ZoneCountSnapshot>>;
}

impl<F> AreaStateSource for F
where
    F: Fn() -> Vec<Arc<ZoneCountSnapshot>> + Send + Sync,
{
    fn latest(&self) -> Vec<Arc<ZoneCountSnapshot>> {
        self()
    }
}

/// Keyed store of each area's most recent [`ZoneCountSnapshot`].
#[derive(Debug, Default)]
pub struct StateBoard {
    areas: RwLock<HashMap<AreaId, Arc<ZoneCountSnapshot>>>,
}

impl StateBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make an area visible with an initializing, zeroed snapshot.
    /// Does nothing if the area is already present.
    pub fn register(&self, area: &AreaId) {
        self.areas
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(area.clone())
            .or_insert_with(|| Arc::new(ZoneCountSnapshot::initial(area.clone())));
    }

    /// Replace an area's snapshot.
    pub fn publish(&self, snapshot: ZoneCountSnapshot) -> Arc<ZoneCountSnapshot> {
        let snapshot = Arc::new(snapshot);
        self.areas
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(snapshot.area.clone(), Arc::clone(&snapshot));
        snapshot
    }

    pub fn get(&self, area: &AreaId) -> Option<Arc<ZoneCountSnapshot>> {
        self.areas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(area)
            .cloned()
    }

    /// Every area's snapshot, ordered by area id.
    pub fn snapshot_all(&self) -> Vec<Arc<ZoneCountSnapshot>> {
        let mut all: Vec<_> = self
            .areas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| a.area.cmp(&b.area));
        all
    }

    pub fn len(&self) -> usize {
        self.areas.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AreaStateSource for StateBoard {
    fn latest(&self) -> Vec<Arc<ZoneCountSnapshot>> {
        self.snapshot_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crowd_models::AreaStatus;
    use std::collections::BTreeMap;

    fn snapshot(area: &str, live: u32) -> ZoneCountSnapshot {
        ZoneCountSnapshot {
            area: AreaId::from(area),
            live_people: live,
            zone_counts: BTreeMap::from([(1, live)]),
            timestamp: Utc::now(),
            status: AreaStatus::Active,
        }
    }

    #[test]
    fn test_register_does_not_overwrite() {
        let board = StateBoard::new();
        let area = AreaId::from("entrance");
        board.publish(snapshot("entrance", 4));
        board.register(&area);

        assert_eq!(board.get(&area).unwrap().live_people, 4);
    }

    #[test]
    fn test_registered_area_is_initializing() {
        let board = StateBoard::new();
        let area = AreaId::from("retail");
        board.register(&area);

        let state = board.get(&area).unwrap();
        assert_eq!(state.status, AreaStatus::Initializing);
        assert_eq!(state.live_people, 0);
    }

    #[test]
    fn test_held_snapshot_is_not_torn_by_publish() {
        let board = StateBoard::new();
        board.publish(snapshot("entrance", 3));
        let held = board.get(&AreaId::from("entrance")).unwrap();

        board.publish(snapshot("entrance", 9));

        assert_eq!(held.live_people, 3);
        assert_eq!(held.zone_counts[&1], 3);
        assert_eq!(board.get(&AreaId::from("entrance")).unwrap().live_people, 9);
    }

    #[test]
    fn test_closure_source() {
        let board = Arc::new(StateBoard::new());
        board.publish(snapshot("b", 1));
        board.publish(snapshot("a", 2));

        let shared = Arc::clone(&board);
        let source = move || shared.snapshot_all();
        let areas: Vec<_> = source.latest().iter().map(|s| s.area.clone()).collect();

        assert_eq!(areas, vec![AreaId::from("a"), AreaId::from("b")]);
    }
}
