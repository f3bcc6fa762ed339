//! Zone polygon definitions.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

use crate::geometry::Point;

/// Default zone color (BGR green), as used by the zone editor.
pub const DEFAULT_ZONE_COLOR: [u8; 3] = [0, 255, 0];

fn default_color() -> [u8; 3] {
    DEFAULT_ZONE_COLOR
}

/// Error raised when a zone definition fails validation.
#[derive(Debug, Error)]
#[error("Invalid zone {id}: {reason}")]
pub struct ZoneError {
    pub id: u32,
    pub reason: String,
}

/// A named polygon inside one area.
///
/// Polygons need at least three vertices and may be non-convex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Zone {
    /// Zone id, unique within its area
    pub id: u32,
    /// Display name
    #[serde(default)]
    #[validate(length(min = 1))]
    pub name: String,
    /// Display color
    #[serde(default = "default_color")]
    pub color: [u8; 3],
    /// Ordered polygon vertices
    #[validate(length(min = 3))]
    pub points: Vec<Point>,
}

impl Zone {
    pub fn new(id: u32, name: impl Into<String>, points: Vec<Point>) -> Self {
        Self {
            id,
            name: name.into(),
            color: DEFAULT_ZONE_COLOR,
            points,
        }
    }

    /// Axis-aligned rectangle zone, handy for tests and the editor's rectangle tool.
    pub fn rectangle(id: u32, name: impl Into<String>, x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::new(
            id,
            name,
            vec![
                Point::new(x1, y1),
                Point::new(x2, y1),
                Point::new(x2, y2),
                Point::new(x1, y2),
            ],
        )
    }

    /// Fill defaults and validate a zone parsed from an external definition.
    ///
    /// A missing name becomes `Zone_{id}`.
    pub fn validated(mut self) -> Result<Self, ZoneError> {
        if self.name.trim().is_empty() {
            self.name = format!("Zone_{}", self.id);
        }
        self.validate().map_err(|e| ZoneError {
            id: self.id,
            reason: e.to_string(),
        })?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_parses_editor_format() {
        let json = r#"{"id": 2, "name": "Queue", "color": [255, 0, 0], "points": [[0, 0], [10, 0], [10, 10]]}"#;
        let zone: Zone = serde_json::from_str(json).unwrap();
        let zone = zone.validated().unwrap();

        assert_eq!(zone.id, 2);
        assert_eq!(zone.color, [255, 0, 0]);
        assert_eq!(zone.points[1], Point::new(10.0, 0.0));
    }

    #[test]
    fn test_zone_defaults_name_and_color() {
        let json = r#"{"id": 7, "points": [[0, 0], [10, 0], [10, 10]]}"#;
        let zone: Zone = serde_json::from_str(json).unwrap();
        let zone = zone.validated().unwrap();

        assert_eq!(zone.name, "Zone_7");
        assert_eq!(zone.color, DEFAULT_ZONE_COLOR);
    }

    #[test]
    fn test_zone_with_two_points_is_rejected() {
        let zone = Zone::new(1, "Line", vec![Point::new(0.0, 0.0), Point::new(5.0, 5.0)]);
        let err = zone.validated().unwrap_err();
        assert_eq!(err.id, 1);
    }
}
