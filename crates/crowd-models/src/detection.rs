//! Raw per-frame detector output.

use serde::{Deserialize, Serialize};

use crate::geometry::BoundingBox;

/// One detected object in one frame.
///
/// Transient: the tracker consumes it and does not retain it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Detected box in source-frame pixels
    pub bbox: BoundingBox,
    /// Detector confidence in [0, 1]
    pub score: f32,
}

impl Detection {
    pub fn new(bbox: BoundingBox, score: f32) -> Self {
        Self { bbox, score }
    }

    /// Convenience constructor from corner coordinates.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64, score: f32) -> Self {
        Self::new(BoundingBox::new(x1, y1, x2, y2), score)
    }
}
