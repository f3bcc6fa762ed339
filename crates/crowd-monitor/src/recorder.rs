//! Periodic historical recording of per-area counts.
//!
//! Every tick writes one overall row per area plus one row per zone,
//! zeros included, so empty periods are visible in the history.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crowd_models::{HistoricalSnapshot, ZoneCountSnapshot, ZoneRef};
use crowd_store::{PersistenceSink, StoreError, ZoneStore};

use crate::error::with_timeout;
use crate::logging::AreaLogger;
use crate::metrics;
use crate::service::ServiceHandle;
use crate::state::AreaStateSource;

/// Handle of a running recorder.
pub type RecorderHandle = ServiceHandle;

/// Outcome of one recording tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordStats {
    /// Areas visited
    pub areas: usize,
    /// Rows written
    pub written: usize,
    /// Zone rows skipped because the zone is unknown to the zone store
    pub skipped: usize,
    /// Rows the sink rejected or timed out on
    pub failed: usize,
}

/// Background snapshotter reading the state board on a fixed interval.
pub struct HistoricalRecorder {
    source: Arc<dyn AreaStateSource>,
    zone_store: Arc<dyn ZoneStore>,
    sink: Arc<dyn PersistenceSink>,
    interval: Duration,
    persist_timeout: Duration,
}

impl HistoricalRecorder {
    pub fn new(
        source: Arc<dyn AreaStateSource>,
        zone_store: Arc<dyn ZoneStore>,
        sink: Arc<dyn PersistenceSink>,
        interval: Duration,
        persist_timeout: Duration,
    ) -> Self {
        Self {
            source,
            zone_store,
            sink,
            interval,
            persist_timeout,
        }
    }

    /// Start recording in a background task. The first tick runs immediately.
    pub fn spawn(self) -> RecorderHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            info!("Starting historical recorder (interval: {:?})", self.interval);
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
                        let stats = self.record_once().await;
                        if stats.failed > 0 {
                            warn!(failed = stats.failed, written = stats.written, "Recording tick had failures");
                        }
                    }
                }
            }

            info!("Historical recorder stopped");
        });

        ServiceHandle::new("historical_recorder", shutdown, task)
    }

    /// Run a single recording tick.
    pub async fn record_once(&self) -> RecordStats {
        let timestamp = Utc::now();
        let mut stats = RecordStats::default();

        for state in self.source.latest() {
            stats.areas += 1;
            self.record_area(&state, timestamp, &mut stats).await;
        }

        if stats.written > 0 {
            metrics::record_snapshots_written(stats.written as u64);
        }
        debug!(
            areas = stats.areas,
            written = stats.written,
            skipped = stats.skipped,
            failed = stats.failed,
            "Recorded snapshot tick"
        );
        stats
    }

    async fn record_area(
        &self,
        state: &ZoneCountSnapshot,
        timestamp: chrono::DateTime<Utc>,
        stats: &mut RecordStats,
    ) {
        let area = &state.area;

        self.write(
            HistoricalSnapshot {
                area: area.clone(),
                zone: ZoneRef::Overall,
                count: state.live_people,
                timestamp,
            },
            stats,
        )
        .await;

        if state.zone_counts.is_empty() {
            return;
        }

        let zone_store = Arc::clone(&self.zone_store);
        let lookup_area = area.clone();
        let lookup = match tokio::task::spawn_blocking(move || zone_store.load(&lookup_area)).await {
            Ok(result) => result,
            Err(e) => Err(StoreError::Io(e.into())),
        };
        let known: HashSet<u32> = match lookup {
            Ok(zones) => zones.into_iter().map(|z| z.id).collect(),
            Err(e) => {
                AreaLogger::new(area, "record")
                    .log_warning(&format!("Zone lookup failed, skipping zone rows: {}", e));
                stats.skipped += state.zone_counts.len();
                return;
            }
        };

        for (&zone_id, &count) in &state.zone_counts {
            if !known.contains(&zone_id) {
                debug!(area = %area, zone_id, "Zone not in store, skipping");
                stats.skipped += 1;
                continue;
            }
            self.write(
                HistoricalSnapshot {
                    area: area.clone(),
                    zone: ZoneRef::Zone(zone_id),
                    count,
                    timestamp,
                },
                stats,
            )
            .await;
        }
    }

    async fn write(&self, row: HistoricalSnapshot, stats: &mut RecordStats) {
        let area = row.area.clone();
        let zone = row.zone;
        match with_timeout(self.persist_timeout, self.sink.create_snapshot(row)).await {
            Ok(()) => stats.written += 1,
            Err(e) => {
                error!(area = %area, zone = %zone, error = %e, "Failed to write history row");
                metrics::record_persistence_failure("create_snapshot");
                stats.failed += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::DateTime;
    use crowd_models::{
        Alert, AlertId, AreaId, AreaStatus, NewAlert, NewViolation, ThresholdViolation, Zone,
    };
    use crowd_store::{InMemoryStore, Revision, StoreResult};
    use mockall::mock;
    use std::collections::BTreeMap;

    use crate::state::StateBoard;

    mock! {
        pub Sink {}

        #[async_trait]
        impl PersistenceSink for Sink {
            async fn create_alert(&self, alert: NewAlert) -> StoreResult<Alert>;
            async fn acknowledge_alert(&self, id: AlertId, user: String, at: DateTime<Utc>) -> StoreResult<Alert>;
            async fn create_violation(&self, violation: NewViolation) -> StoreResult<ThresholdViolation>;
            async fn create_snapshot(&self, snapshot: HistoricalSnapshot) -> StoreResult<()>;
            async fn active_alerts(&self, area: Option<AreaId>) -> StoreResult<Vec<Alert>>;
            async fn alert_history(&self, area: Option<AreaId>, limit: usize) -> StoreResult<Vec<Alert>>;
            async fn violations(&self, area: Option<AreaId>, limit: usize) -> StoreResult<Vec<ThresholdViolation>>;
            async fn history(&self, area: AreaId, zone: Option<ZoneRef>, since: Option<DateTime<Utc>>) -> StoreResult<Vec<HistoricalSnapshot>>;
        }
    }

    struct BrokenZones;

    impl ZoneStore for BrokenZones {
        fn load(&self, _area: &AreaId) -> StoreResult<Vec<Zone>> {
            Err(StoreError::malformed("unreadable"))
        }

        fn revision(&self, _area: &AreaId) -> Option<Revision> {
            None
        }
    }

    fn publish(board: &StateBoard, area: &str, live: u32, zones: &[(u32, u32)]) {
        board.publish(ZoneCountSnapshot {
            area: AreaId::from(area),
            live_people: live,
            zone_counts: zones.iter().copied().collect::<BTreeMap<_, _>>(),
            timestamp: Utc::now(),
            status: AreaStatus::Active,
        });
    }

    fn recorder(
        board: Arc<StateBoard>,
        zones: Arc<dyn ZoneStore>,
        sink: Arc<dyn PersistenceSink>,
    ) -> HistoricalRecorder {
        HistoricalRecorder::new(board, zones, sink, Duration::from_secs(5), Duration::from_secs(2))
    }

    #[tokio::test]
    async fn test_empty_area_records_zero_overall_row() {
        let board = Arc::new(StateBoard::new());
        board.register(&AreaId::from("entrance"));
        let store = Arc::new(InMemoryStore::new());

        let stats = recorder(board, store.clone(), store.clone()).record_once().await;

        assert_eq!(stats, RecordStats { areas: 1, written: 1, skipped: 0, failed: 0 });
        let rows = store.snapshots();
        assert_eq!(rows[0].zone, ZoneRef::Overall);
        assert_eq!(rows[0].count, 0);
    }

    #[tokio::test]
    async fn test_zero_zone_counts_are_recorded_and_unknown_zones_skipped() {
        let board = Arc::new(StateBoard::new());
        publish(&board, "foodcourt", 3, &[(1, 2), (2, 0), (9, 1)]);
        let store = Arc::new(InMemoryStore::new());
        store.set_zones(
            "foodcourt",
            vec![
                Zone::rectangle(1, "Tables", 0.0, 0.0, 10.0, 10.0),
                Zone::rectangle(2, "Queue", 10.0, 0.0, 20.0, 10.0),
            ],
        );

        let stats = recorder(board, store.clone(), store.clone()).record_once().await;

        assert_eq!(stats.written, 3);
        assert_eq!(stats.skipped, 1);
        let zone_two = store
            .snapshots()
            .into_iter()
            .find(|s| s.zone == ZoneRef::Zone(2))
            .unwrap();
        assert_eq!(zone_two.count, 0);
    }

    #[tokio::test]
    async fn test_zone_lookup_failure_keeps_overall_row() {
        let board = Arc::new(StateBoard::new());
        publish(&board, "retail", 5, &[(1, 5)]);
        let store = Arc::new(InMemoryStore::new());

        let stats = recorder(board, Arc::new(BrokenZones), store.clone()).record_once().await;

        assert_eq!(stats.written, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(store.snapshots()[0].count, 5);
    }

    #[tokio::test]
    async fn test_sink_failure_on_one_area_does_not_stop_others() {
        let board = Arc::new(StateBoard::new());
        publish(&board, "bad", 1, &[]);
        publish(&board, "good", 2, &[]);
        let mut sink = MockSink::new();
        sink.expect_create_snapshot().times(2).returning(|row| {
            if row.area.as_str() == "bad" {
                Err(StoreError::write_failed("connection reset"))
            } else {
                Ok(())
            }
        });

        let stats = recorder(board, Arc::new(InMemoryStore::new()), Arc::new(sink))
            .record_once()
            .await;

        assert_eq!(stats, RecordStats { areas: 2, written: 1, skipped: 0, failed: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_recorder_ticks_until_shutdown() {
        let board = Arc::new(StateBoard::new());
        board.register(&AreaId::from("entrance"));
        let store = Arc::new(InMemoryStore::new());

        let handle = recorder(board, store.clone(), store.clone()).spawn();
        tokio::time::sleep(Duration::from_secs(11)).await;
        handle.shutdown().await;

        // Ticks at 0s, 5s and 10s
        assert_eq!(store.snapshots().len(), 3);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(store.snapshots().len(), 3);
    }
}
