//! Interfaces the core uses to reach its collaborators.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crowd_models::{
    Alert, AlertId, AreaId, HistoricalSnapshot, NewAlert, NewViolation, Threshold,
    ThresholdViolation, Zone, ZoneRef,
};

use crate::error::StoreResult;

/// Opaque version marker of an area's zone definition.
///
/// Two equal revisions mean the zone set has not changed in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Revision(pub u64);

/// Read-only source of zone polygons, keyed by area.
pub trait ZoneStore: Send + Sync {
    /// Load the full zone set of an area. An area without a definition has no zones.
    fn load(&self, area: &AreaId) -> StoreResult<Vec<Zone>>;

    /// Current revision of an area's zone definition, if one exists.
    fn revision(&self, area: &AreaId) -> Option<Revision>;
}

/// Source of the global occupancy threshold.
#[async_trait]
pub trait ThresholdSource: Send + Sync {
    /// The threshold currently in force, or `None` when none is configured.
    async fn current_threshold(&self) -> StoreResult<Option<Threshold>>;
}

/// Append-only sink for alerts, violations and history rows.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn create_alert(&self, alert: NewAlert) -> StoreResult<Alert>;

    /// Move an alert from active to acknowledged.
    async fn acknowledge_alert(
        &self,
        id: AlertId,
        user: String,
        at: DateTime<Utc>,
    ) -> StoreResult<Alert>;

    async fn create_violation(&self, violation: NewViolation) -> StoreResult<ThresholdViolation>;

    async fn create_snapshot(&self, snapshot: HistoricalSnapshot) -> StoreResult<()>;

    /// Active alerts, newest first.
    async fn active_alerts(&self, area: Option<AreaId>) -> StoreResult<Vec<Alert>>;

    /// All alerts, newest first.
    async fn alert_history(&self, area: Option<AreaId>, limit: usize) -> StoreResult<Vec<Alert>>;

    /// Threshold violations, newest first.
    async fn violations(
        &self,
        area: Option<AreaId>,
        limit: usize,
    ) -> StoreResult<Vec<ThresholdViolation>>;

    /// Recorded history for an area in chronological order.
    ///
    /// `zone = None` returns every row of the area.
    async fn history(
        &self,
        area: AreaId,
        zone: Option<ZoneRef>,
        since: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<HistoricalSnapshot>>;
}
