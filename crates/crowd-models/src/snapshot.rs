//! Published count snapshots and recorded history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::area::{AreaId, AreaStatus};

/// Latest counts for one area, published once per processed frame.
///
/// Always fully recomputed from a single frame, so `live_people` and
/// `zone_counts` belong to the same frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneCountSnapshot {
    /// Area the counts belong to
    pub area: AreaId,
    /// Raw detection count of the frame (not the track count)
    pub live_people: u32,
    /// Occupant count per zone id
    pub zone_counts: BTreeMap<u32, u32>,
    /// When the frame was processed
    pub timestamp: DateTime<Utc>,
    /// Whether a frame has been processed yet
    pub status: AreaStatus,
}

impl ZoneCountSnapshot {
    /// Zero-valued state for an area that has not processed a frame yet.
    pub fn initial(area: AreaId) -> Self {
        Self {
            area,
            live_people: 0,
            zone_counts: BTreeMap::new(),
            timestamp: Utc::now(),
            status: AreaStatus::Initializing,
        }
    }
}

/// Which count a historical row refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "zone_id")]
pub enum ZoneRef {
    /// Whole-area count
    Overall,
    /// A single zone
    Zone(u32),
}

impl ZoneRef {
    pub fn zone_id(&self) -> Option<u32> {
        match self {
            ZoneRef::Overall => None,
            ZoneRef::Zone(id) => Some(*id),
        }
    }
}

impl fmt::Display for ZoneRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneRef::Overall => write!(f, "overall"),
            ZoneRef::Zone(id) => write!(f, "zone {}", id),
        }
    }
}

/// Immutable history row written by the recorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSnapshot {
    pub area: AreaId,
    pub zone: ZoneRef,
    pub count: u32,
    pub timestamp: DateTime<Utc>,
}
