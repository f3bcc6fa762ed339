//! Threshold alerting with a per-area cooldown.
//!
//! A breach is a total count strictly above the global threshold. The first
//! breach of an area raises an alert plus a threshold violation; further
//! breaches within the cooldown are dropped, not queued.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crowd_models::{Alert, AlertId, AreaId, NewAlert, NewViolation, ThresholdViolation};
use crowd_store::{PersistenceSink, ThresholdSource};

use crate::error::{with_timeout, MonitorResult};
use crate::metrics;

/// Default number of rows returned by history queries.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Render a zone breakdown as `Zone 1: 4, Zone 2: 7`, or `N/A` when empty.
pub fn format_zone_details(breakdown: &BTreeMap<u32, u32>) -> String {
    if breakdown.is_empty() {
        return "N/A".to_string();
    }
    breakdown
        .iter()
        .map(|(id, count)| format!("Zone {}: {}", id, count))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Compares counts against the global threshold and persists alerts.
pub struct AlertManager {
    thresholds: Arc<dyn ThresholdSource>,
    sink: Arc<dyn PersistenceSink>,
    cooldown: Duration,
    persist_timeout: Duration,
    last_alert: Mutex<HashMap<AreaId, DateTime<Utc>>>,
}

impl AlertManager {
    pub fn new(
        thresholds: Arc<dyn ThresholdSource>,
        sink: Arc<dyn PersistenceSink>,
        cooldown: Duration,
        persist_timeout: Duration,
    ) -> Self {
        Self {
            thresholds,
            sink,
            cooldown,
            persist_timeout,
            last_alert: Mutex::new(HashMap::new()),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// When the area last raised an alert, if ever.
    pub fn last_alert_at(&self, area: &AreaId) -> Option<DateTime<Utc>> {
        self.last_alert
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(area)
            .copied()
    }

    /// Check an area's count against the threshold using the current time.
    pub async fn check_threshold(
        &self,
        area: &AreaId,
        total_count: u32,
        zone_breakdown: &BTreeMap<u32, u32>,
    ) -> Option<Alert> {
        self.check_threshold_at(area, total_count, zone_breakdown, Utc::now())
            .await
    }

    /// Check an area's count against the threshold at an explicit time.
    ///
    /// Returns the alert raised, if any. Persistence failures are logged and
    /// never returned.
    pub async fn check_threshold_at(
        &self,
        area: &AreaId,
        total_count: u32,
        zone_breakdown: &BTreeMap<u32, u32>,
        now: DateTime<Utc>,
    ) -> Option<Alert> {
        let threshold = match with_timeout(self.persist_timeout, self.thresholds.current_threshold()).await {
            Ok(Some(t)) => t,
            Ok(None) => {
                debug!(area = %area, "No threshold configured");
                return None;
            }
            Err(e) => {
                warn!(area = %area, error = %e, "Threshold unavailable, skipping check");
                metrics::record_persistence_failure("current_threshold");
                return None;
            }
        };

        if total_count <= threshold.value {
            return None;
        }

        let previous = match self.reserve(area, now) {
            Ok(previous) => previous,
            Err(last) => {
                debug!(
                    area = %area,
                    count = total_count,
                    last_alert = %last,
                    "Breach suppressed by cooldown"
                );
                metrics::record_alert_suppressed(area);
                return None;
            }
        };

        let new_alert = NewAlert {
            area: area.clone(),
            zone: None,
            observed_count: total_count,
            threshold: threshold.value,
            created_at: now,
        };
        let alert = match with_timeout(self.persist_timeout, self.sink.create_alert(new_alert)).await {
            Ok(alert) => alert,
            Err(e) => {
                error!(area = %area, error = %e, "Failed to persist alert");
                metrics::record_persistence_failure("create_alert");
                self.release(area, now, previous);
                return None;
            }
        };

        let violation = NewViolation {
            area: area.clone(),
            threshold_id: Some(threshold.id),
            people_count: total_count,
            zone_details: format_zone_details(zone_breakdown),
            violation_time: now,
        };
        if let Err(e) = with_timeout(self.persist_timeout, self.sink.create_violation(violation)).await {
            error!(area = %area, alert_id = %alert.id, error = %e, "Failed to persist threshold violation");
            metrics::record_persistence_failure("create_violation");
        }

        info!(
            area = %area,
            alert_id = %alert.id,
            count = total_count,
            threshold = threshold.value,
            "Occupancy alert raised"
        );
        metrics::record_alert_raised(area);
        Some(alert)
    }

    /// Claim the area's cooldown slot at `now`.
    ///
    /// Returns the previous alert time on success, or the blocking alert time
    /// when the area is still cooling down. A last alert in the future counts
    /// as cooling down.
    fn reserve(
        &self,
        area: &AreaId,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, DateTime<Utc>> {
        let mut last_alert = self.last_alert.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(&last) = last_alert.get(area) {
            let cooling = match (now - last).to_std() {
                Ok(elapsed) => elapsed < self.cooldown,
                Err(_) => true,
            };
            if cooling {
                return Err(last);
            }
        }
        Ok(last_alert.insert(area.clone(), now))
    }

    /// Undo a reservation after the alert could not be written.
    fn release(&self, area: &AreaId, reserved: DateTime<Utc>, previous: Option<DateTime<Utc>>) {
        let mut last_alert = self.last_alert.lock().unwrap_or_else(PoisonError::into_inner);
        if last_alert.get(area) != Some(&reserved) {
            return;
        }
        match previous {
            Some(prev) => {
                last_alert.insert(area.clone(), prev);
            }
            None => {
                last_alert.remove(area);
            }
        }
    }

    /// Acknowledge an active alert on behalf of `user`.
    pub async fn acknowledge(&self, id: AlertId, user: impl Into<String>) -> MonitorResult<Alert> {
        let user = user.into();
        let alert = with_timeout(
            self.persist_timeout,
            self.sink.acknowledge_alert(id, user.clone(), Utc::now()),
        )
        .await?;
        info!(alert_id = %id, user = %user, "Alert acknowledged");
        Ok(alert)
    }

    /// Active alerts, newest first.
    pub async fn active_alerts(&self, area: Option<&AreaId>) -> MonitorResult<Vec<Alert>> {
        with_timeout(self.persist_timeout, self.sink.active_alerts(area.cloned())).await
    }

    /// Alert history, newest first, [`DEFAULT_HISTORY_LIMIT`] rows unless given.
    pub async fn alert_history(
        &self,
        area: Option<&AreaId>,
        limit: Option<usize>,
    ) -> MonitorResult<Vec<Alert>> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        with_timeout(self.persist_timeout, self.sink.alert_history(area.cloned(), limit)).await
    }

    pub async fn violations(
        &self,
        area: Option<&AreaId>,
        limit: Option<usize>,
    ) -> MonitorResult<Vec<ThresholdViolation>> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        with_timeout(self.persist_timeout, self.sink.violations(area.cloned(), limit)).await
    }
}
