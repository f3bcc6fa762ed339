//! In-memory store used by the binary and by tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crowd_models::{
    Alert, AlertId, AlertStatus, AreaId, HistoricalSnapshot, NewAlert, NewViolation, Threshold,
    ThresholdViolation, Zone, ZoneRef,
};

use crate::error::{StoreError, StoreResult};
use crate::traits::{PersistenceSink, Revision, ThresholdSource, ZoneStore};

#[derive(Default)]
struct Tables {
    zones: HashMap<AreaId, (Vec<Zone>, Revision)>,
    zone_revision: u64,
    thresholds: Vec<Threshold>,
    alerts: Vec<Alert>,
    violations: Vec<ThresholdViolation>,
    snapshots: Vec<HistoricalSnapshot>,
}

/// Process-local implementation of every collaborator trait.
///
/// Ids are sequential per table starting at 1. Writes can be made to fail
/// with [`InMemoryStore::set_fail_writes`].
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    fail_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with an initial threshold already in force.
    pub fn with_threshold(value: u32) -> Self {
        let store = Self::new();
        store.set_threshold(value);
        store
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_writable(&self, op: &str) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::write_failed(format!("{} rejected", op)));
        }
        Ok(())
    }

    /// Replace an area's zone set and bump its revision.
    pub fn set_zones(&self, area: impl Into<AreaId>, zones: Vec<Zone>) {
        let mut tables = self.tables();
        tables.zone_revision += 1;
        let revision = Revision(tables.zone_revision);
        tables.zones.insert(area.into(), (zones, revision));
    }

    /// Append a new threshold version, which becomes the one in force.
    pub fn set_threshold(&self, value: u32) -> Threshold {
        let mut tables = self.tables();
        let threshold = Threshold {
            id: tables.thresholds.len() as u64 + 1,
            value,
            updated_at: Utc::now(),
        };
        tables.thresholds.push(threshold.clone());
        threshold
    }

    /// Make every subsequent write fail with `WriteFailed`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// All alerts in insertion order.
    pub fn alerts(&self) -> Vec<Alert> {
        self.tables().alerts.clone()
    }

    /// All violations in insertion order.
    pub fn all_violations(&self) -> Vec<ThresholdViolation> {
        self.tables().violations.clone()
    }

    /// All history rows in insertion order.
    pub fn snapshots(&self) -> Vec<HistoricalSnapshot> {
        self.tables().snapshots.clone()
    }
}

impl ZoneStore for InMemoryStore {
    fn load(&self, area: &AreaId) -> StoreResult<Vec<Zone>> {
        Ok(self
            .tables()
            .zones
            .get(area)
            .map(|(zones, _)| zones.clone())
            .unwrap_or_default())
    }

    fn revision(&self, area: &AreaId) -> Option<Revision> {
        self.tables().zones.get(area).map(|(_, rev)| *rev)
    }
}

#[async_trait]
impl ThresholdSource for InMemoryStore {
    async fn current_threshold(&self) -> StoreResult<Option<Threshold>> {
        Ok(self
            .tables()
            .thresholds
            .iter()
            .max_by_key(|t| (t.updated_at, t.id))
            .cloned())
    }
}

fn newest_first(alerts: &mut [Alert]) {
    alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

#[async_trait]
impl PersistenceSink for InMemoryStore {
    async fn create_alert(&self, alert: NewAlert) -> StoreResult<Alert> {
        self.check_writable("create_alert")?;
        let mut tables = self.tables();
        let alert = alert.into_alert(AlertId(tables.alerts.len() as u64 + 1));
        tables.alerts.push(alert.clone());
        debug!(alert_id = %alert.id, area = %alert.area, "Stored alert");
        Ok(alert)
    }

    async fn acknowledge_alert(
        &self,
        id: AlertId,
        user: String,
        at: DateTime<Utc>,
    ) -> StoreResult<Alert> {
        self.check_writable("acknowledge_alert")?;
        let mut tables = self.tables();
        let alert = tables
            .alerts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| StoreError::not_found(format!("alert {}", id)))?;

        if alert.status == AlertStatus::Acknowledged {
            return Err(StoreError::AlertAlreadyAcknowledged(id.0));
        }

        alert.status = AlertStatus::Acknowledged;
        alert.acknowledged_by = Some(user);
        alert.acknowledged_at = Some(at);
        Ok(alert.clone())
    }

    async fn create_violation(&self, violation: NewViolation) -> StoreResult<ThresholdViolation> {
        self.check_writable("create_violation")?;
        let mut tables = self.tables();
        let violation = violation.into_violation(tables.violations.len() as u64 + 1);
        tables.violations.push(violation.clone());
        Ok(violation)
    }

    async fn create_snapshot(&self, snapshot: HistoricalSnapshot) -> StoreResult<()> {
        self.check_writable("create_snapshot")?;
        self.tables().snapshots.push(snapshot);
        Ok(())
    }

    async fn active_alerts(&self, area: Option<AreaId>) -> StoreResult<Vec<Alert>> {
        let mut alerts: Vec<Alert> = self
            .tables()
            .alerts
            .iter()
            .filter(|a| a.is_active())
            .filter(|a| area.as_ref().map_or(true, |area| &a.area == area))
            .cloned()
            .collect();
        newest_first(&mut alerts);
        Ok(alerts)
    }

    async fn alert_history(&self, area: Option<AreaId>, limit: usize) -> StoreResult<Vec<Alert>> {
        let mut alerts: Vec<Alert> = self
            .tables()
            .alerts
            .iter()
            .filter(|a| area.as_ref().map_or(true, |area| &a.area == area))
            .cloned()
            .collect();
        newest_first(&mut alerts);
        alerts.truncate(limit);
        Ok(alerts)
    }

    async fn violations(
        &self,
        area: Option<AreaId>,
        limit: usize,
    ) -> StoreResult<Vec<ThresholdViolation>> {
        let mut violations: Vec<ThresholdViolation> = self
            .tables()
            .violations
            .iter()
            .filter(|v| area.as_ref().map_or(true, |area| &v.area == area))
            .cloned()
            .collect();
        violations.sort_by(|a, b| {
            b.violation_time
                .cmp(&a.violation_time)
                .then(b.id.cmp(&a.id))
        });
        violations.truncate(limit);
        Ok(violations)
    }

    async fn history(
        &self,
        area: AreaId,
        zone: Option<ZoneRef>,
        since: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<HistoricalSnapshot>> {
        let mut rows: Vec<HistoricalSnapshot> = self
            .tables()
            .snapshots
            .iter()
            .filter(|s| s.area == area)
            .filter(|s| zone.map_or(true, |z| s.zone == z))
            .filter(|s| since.map_or(true, |t| s.timestamp >= t))
            .cloned()
            .collect();
        rows.sort_by_key(|s| s.timestamp);
        Ok(rows)
    }
}
