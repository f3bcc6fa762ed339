//! Background reload of changed zone definitions.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crowd_models::AreaId;

use crate::pipeline::FramePipeline;
use crate::service::ServiceHandle;

/// Polls the zone store and reloads areas whose definition changed.
///
/// Reloads go through the pipeline so the board gets the zeroed counts.
pub struct ZoneSyncService {
    pipeline: Arc<FramePipeline>,
    interval: Duration,
}

impl ZoneSyncService {
    pub fn new(pipeline: Arc<FramePipeline>, interval: Duration) -> Self {
        Self { pipeline, interval }
    }

    /// Run a single sync pass, returning the areas that were reloaded.
    pub async fn sync_once(&self) -> Vec<AreaId> {
        let pipeline = Arc::clone(&self.pipeline);
        match tokio::task::spawn_blocking(move || pipeline.sync_zones()).await {
            Ok(reloaded) => reloaded,
            Err(e) => {
                error!(error = %e, "Zone sync pass failed");
                Vec::new()
            }
        }
    }

    pub fn spawn(self) -> ServiceHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            info!("Starting zone sync (interval: {:?})", self.interval);
            let mut ticker = interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        self.sync_once().await;
                    }
                }
            }

            info!("Zone sync stopped");
        });

        ServiceHandle::new("zone_sync", shutdown, task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crowd_models::{Detection, Zone};
    use crowd_store::InMemoryStore;
    use crowd_tracking::{AreaRegistry, TrackerConfig};
    use std::collections::BTreeMap;

    use crate::alerts::AlertManager;
    use crate::state::StateBoard;

    fn pipeline(store: &Arc<InMemoryStore>) -> Arc<FramePipeline> {
        let registry = Arc::new(AreaRegistry::new(TrackerConfig::default(), store.clone()));
        let alerts = Arc::new(AlertManager::new(
            store.clone(),
            store.clone(),
            Duration::from_secs(20),
            Duration::from_secs(2),
        ));
        Arc::new(FramePipeline::new(registry, Arc::new(StateBoard::new()), alerts))
    }

    #[tokio::test]
    async fn test_sync_once_reloads_changed_area() {
        let store = Arc::new(InMemoryStore::with_threshold(50));
        let pipeline = pipeline(&store);
        let area = AreaId::from("entrance");
        pipeline.register_area(&area);
        let sync = ZoneSyncService::new(Arc::clone(&pipeline), Duration::from_secs(5));

        assert!(sync.sync_once().await.is_empty());

        store.set_zones("entrance", vec![Zone::rectangle(1, "Door", 0.0, 0.0, 10.0, 10.0)]);
        assert_eq!(sync.sync_once().await, vec![area.clone()]);
        assert_eq!(pipeline.registry().zones(&area).len(), 1);
        assert_eq!(
            pipeline.board().get(&area).unwrap().zone_counts,
            BTreeMap::from([(1, 0)])
        );
    }

    #[tokio::test]
    async fn test_sync_publishes_zeroed_counts() {
        let store = Arc::new(InMemoryStore::with_threshold(50));
        store.set_zones("hall", vec![Zone::rectangle(1, "Left", 0.0, 0.0, 300.0, 300.0)]);
        let pipeline = pipeline(&store);
        let area = AreaId::from("hall");
        pipeline
            .process_frame(&area, &[Detection::from_corners(100.0, 100.0, 150.0, 200.0, 0.9)])
            .await;
        assert_eq!(pipeline.board().get(&area).unwrap().zone_counts[&1], 1);

        store.set_zones(
            "hall",
            vec![
                Zone::rectangle(1, "Left", 0.0, 0.0, 300.0, 300.0),
                Zone::rectangle(2, "Right", 300.0, 0.0, 600.0, 300.0),
            ],
        );
        let sync = ZoneSyncService::new(Arc::clone(&pipeline), Duration::from_secs(5));
        assert_eq!(sync.sync_once().await, vec![area.clone()]);

        let state = pipeline.board().get(&area).unwrap();
        assert_eq!(state.zone_counts, BTreeMap::from([(1, 0), (2, 0)]));
        assert_eq!(state.live_people, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_sync_picks_up_changes() {
        let store = Arc::new(InMemoryStore::with_threshold(50));
        let pipeline = pipeline(&store);
        let area = AreaId::from("retail");
        pipeline.register_area(&area);

        let handle = ZoneSyncService::new(Arc::clone(&pipeline), Duration::from_secs(5)).spawn();
        store.set_zones("retail", vec![Zone::rectangle(4, "Till", 0.0, 0.0, 10.0, 10.0)]);
        tokio::time::sleep(Duration::from_secs(6)).await;
        handle.shutdown().await;

        assert_eq!(pipeline.registry().zones(&area)[0].id, 4);
        assert_eq!(
            pipeline.board().get(&area).unwrap().zone_counts,
            BTreeMap::from([(4, 0)])
        );
    }
}
