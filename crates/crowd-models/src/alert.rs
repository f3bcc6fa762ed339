//! Alert, violation and threshold records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::area::AreaId;

/// Alert identifier assigned by the persistence layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertId(pub u64);

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Alert lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    #[default]
    Active,
    Acknowledged,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Acknowledged => "acknowledged",
        }
    }
}

/// A persisted overcrowding alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub area: AreaId,
    /// Always `None` for alerts raised from the area-wide count
    pub zone: Option<u32>,
    /// Count that triggered the alert
    pub observed_count: u32,
    /// Threshold value in force at the time
    pub threshold: u32,
    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn is_active(&self) -> bool {
        self.status == AlertStatus::Active
    }
}

/// Alert fields supplied by the caller; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAlert {
    pub area: AreaId,
    pub zone: Option<u32>,
    pub observed_count: u32,
    pub threshold: u32,
    pub created_at: DateTime<Utc>,
}

impl NewAlert {
    /// Materialize into a stored alert with the given id.
    pub fn into_alert(self, id: AlertId) -> Alert {
        Alert {
            id,
            area: self.area,
            zone: self.zone,
            observed_count: self.observed_count,
            threshold: self.threshold,
            status: AlertStatus::Active,
            created_at: self.created_at,
            acknowledged_by: None,
            acknowledged_at: None,
        }
    }
}

/// Audit row recorded alongside an alert when a threshold record exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdViolation {
    pub id: u64,
    pub area: AreaId,
    pub threshold_id: Option<u64>,
    pub people_count: u32,
    /// Human-readable per-zone breakdown, e.g. `Zone 1: 4, Zone 2: 7`
    pub zone_details: String,
    pub violation_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewViolation {
    pub area: AreaId,
    pub threshold_id: Option<u64>,
    pub people_count: u32,
    pub zone_details: String,
    pub violation_time: DateTime<Utc>,
}

impl NewViolation {
    pub fn into_violation(self, id: u64) -> ThresholdViolation {
        ThresholdViolation {
            id,
            area: self.area,
            threshold_id: self.threshold_id,
            people_count: self.people_count,
            zone_details: self.zone_details,
            violation_time: self.violation_time,
        }
    }
}

/// Global occupancy threshold. The most recently updated record is in force.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub id: u64,
    pub value: u32,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_alert_starts_active() {
        let alert = NewAlert {
            area: AreaId::from("entrance"),
            zone: None,
            observed_count: 12,
            threshold: 10,
            created_at: Utc::now(),
        }
        .into_alert(AlertId(4));

        assert!(alert.is_active());
        assert_eq!(alert.id, AlertId(4));
        assert!(alert.acknowledged_by.is_none());
    }

    #[test]
    fn test_alert_status_serialization() {
        let json = serde_json::to_string(&AlertStatus::Acknowledged).unwrap();
        assert_eq!(json, "\"acknowledged\"");
    }
}
