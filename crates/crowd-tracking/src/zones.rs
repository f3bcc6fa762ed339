//! Zone geometry and occupancy counting.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crowd_models::geometry::GEOMETRY_EPSILON;
use crowd_models::{Point, Zone};

use crate::associator::VisibleTrack;

fn on_segment(p: Point, a: Point, b: Point) -> bool {
    let cross = (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
    let length = ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt();
    if cross.abs() > GEOMETRY_EPSILON * length.max(1.0) {
        return false;
    }
    p.x >= a.x.min(b.x) - GEOMETRY_EPSILON
        && p.x <= a.x.max(b.x) + GEOMETRY_EPSILON
        && p.y >= a.y.min(b.y) - GEOMETRY_EPSILON
        && p.y <= a.y.max(b.y) + GEOMETRY_EPSILON
}

/// Test whether a point lies inside a polygon.
///
/// Uses the crossing-number rule, so non-convex polygons work. Points on an
/// edge or vertex count as inside. Fewer than three vertices never contain
/// anything.
pub fn point_in_polygon(point: Point, polygon: &[Point]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (a, b) = (polygon[i], polygon[j]);
        if on_segment(point, a, b) {
            return true;
        }
        if (a.y > point.y) != (b.y > point.y) {
            let x_cross = (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x;
            if point.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Occupancy of one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneOccupancy {
    /// Count per zone id; every zone is present, empty ones with 0
    pub counts: BTreeMap<u32, u32>,
    /// Zones each visible track is in; tracks outside every zone are absent
    pub membership: HashMap<u64, BTreeSet<u32>>,
}

/// Count visible track centroids per zone.
///
/// A track inside overlapping zones counts toward each of them.
pub fn count_occupancy(zones: &[Zone], tracks: &[VisibleTrack]) -> ZoneOccupancy {
    let mut occupancy = ZoneOccupancy {
        counts: zones.iter().map(|z| (z.id, 0)).collect(),
        membership: HashMap::new(),
    };

    for track in tracks {
        for zone in zones {
            if point_in_polygon(track.centroid, &zone.points) {
                *occupancy.counts.entry(zone.id).or_insert(0) += 1;
                occupancy
                    .membership
                    .entry(track.id)
                    .or_default()
                    .insert(zone.id);
            }
        }
    }

    occupancy
}
