//! Kalman motion estimator for a single track.
//!
//! # State Vector
//! ```text
//! [cx, cy, s, r, vcx, vcy, vs]
//!  ^center ^scale ^aspect ^velocities (aspect has none)
//! ```
//!
//! `s` is the box area (w * h) and `r` the aspect ratio (w / h). Measurements
//! are the first four components.

use nalgebra::{SMatrix, SVector};
use tracing::debug;

use crowd_models::geometry::GEOMETRY_EPSILON;
use crowd_models::BoundingBox;

type StateVector = SVector<f64, 7>;
type StateCovariance = SMatrix<f64, 7, 7>;
type Measurement = SVector<f64, 4>;
type MeasurementMatrix = SMatrix<f64, 4, 7>;

/// Noise weight for position-like components.
const STD_WEIGHT_POSITION: f64 = 1.0 / 20.0;
/// Noise weight for velocity components.
const STD_WEIGHT_VELOCITY: f64 = 1.0 / 160.0;

/// Constant-velocity Kalman filter over box center, scale and aspect ratio.
#[derive(Debug, Clone)]
pub struct MotionEstimator {
    mean: StateVector,
    covariance: StateCovariance,
}

fn measurement_of(bbox: &BoundingBox) -> Measurement {
    let center = bbox.centroid();
    let w = bbox.width();
    let h = bbox.height();
    Measurement::new(center.x, center.y, w * h, w / h.max(GEOMETRY_EPSILON))
}

fn measurement_matrix() -> MeasurementMatrix {
    MeasurementMatrix::from_fn(|i, j| if i == j { 1.0 } else { 0.0 })
}

fn transition_matrix() -> StateCovariance {
    let mut f = StateCovariance::identity();
    f[(0, 4)] = 1.0;
    f[(1, 5)] = 1.0;
    f[(2, 6)] = 1.0;
    f
}

fn diag_squared<const N: usize>(std: SVector<f64, N>) -> SMatrix<f64, N, N> {
    SMatrix::from_diagonal(&std.map(|v| v * v))
}

impl MotionEstimator {
    /// Seed a new estimator from the first observed box, with zero velocity.
    pub fn initiate(bbox: &BoundingBox) -> Self {
        let z = measurement_of(bbox);
        let mean = StateVector::from_fn(|i, _| if i < 4 { z[i] } else { 0.0 });

        let root_s = z[2].max(0.0).sqrt();
        let pos = 2.0 * STD_WEIGHT_POSITION * root_s;
        let vel = 10.0 * STD_WEIGHT_VELOCITY * root_s;
        let std = StateVector::from_column_slice(&[pos, pos, 1e-2, pos, vel, vel, 1e-5]);

        Self {
            mean,
            covariance: diag_squared(std),
        }
    }

    /// Advance the state by one frame.
    pub fn predict(&mut self) {
        let root_s = self.mean[2].max(0.0).sqrt();
        let pos = STD_WEIGHT_POSITION * root_s;
        let vel = STD_WEIGHT_VELOCITY * root_s;
        let q = diag_squared(StateVector::from_column_slice(&[
            pos, pos, 1e-2, pos, vel, vel, 1e-5,
        ]));

        let f = transition_matrix();
        self.mean = f * self.mean;
        self.covariance = f * self.covariance * f.transpose() + q;
    }

    /// Fuse an observed box into the state.
    ///
    /// A singular innovation covariance leaves the state unchanged.
    pub fn update(&mut self, bbox: &BoundingBox) {
        let root_s = self.mean[2].max(0.0).sqrt();
        let pos = STD_WEIGHT_POSITION * root_s;
        let r = diag_squared(Measurement::new(pos, pos, 1e-1, pos));

        let h = measurement_matrix();
        let innovation_cov = h * self.covariance * h.transpose() + r;
        let Some(innovation_inv) = innovation_cov.try_inverse() else {
            debug!(scale = self.mean[2], "Singular innovation covariance, skipping update");
            return;
        };

        let gain = self.covariance * h.transpose() * innovation_inv;
        let innovation = measurement_of(bbox) - h * self.mean;
        self.mean += gain * innovation;
        self.covariance -= gain * h * self.covariance;
    }

    /// Current state as a corner-form box.
    pub fn bbox(&self) -> BoundingBox {
        let (cx, cy) = (self.mean[0], self.mean[1]);
        let s = self.mean[2].max(0.0);
        let w = (s * self.mean[3]).max(0.0).sqrt();
        let h = s / w.max(GEOMETRY_EPSILON);
        BoundingBox::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
    }

    pub fn mean(&self) -> &SVector<f64, 7> {
        &self.mean
    }

    pub fn covariance(&self) -> &SMatrix<f64, 7, 7> {
        &self.covariance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_box_close(a: &BoundingBox, b: &BoundingBox, tol: f64) {
        assert!((a.x1 - b.x1).abs() < tol, "x1 {} vs {}", a.x1, b.x1);
        assert!((a.y1 - b.y1).abs() < tol, "y1 {} vs {}", a.y1, b.y1);
        assert!((a.x2 - b.x2).abs() < tol, "x2 {} vs {}", a.x2, b.x2);
        assert!((a.y2 - b.y2).abs() < tol, "y2 {} vs {}", a.y2, b.y2);
    }

    #[test]
    fn test_initiate_reproduces_box() {
        let bbox = BoundingBox::new(100.0, 100.0, 200.0, 200.0);
        let kf = MotionEstimator::initiate(&bbox);

        assert_box_close(&kf.bbox(), &bbox, 1e-6);
        assert_eq!(kf.mean()[4], 0.0);
        // 2 * (1/20) * sqrt(10000) = 10
        assert!((kf.covariance()[(0, 0)] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_predict_without_velocity_keeps_position() {
        let bbox = BoundingBox::new(10.0, 20.0, 50.0, 100.0);
        let mut kf = MotionEstimator::initiate(&bbox);
        let before = kf.covariance()[(0, 0)];

        kf.predict();

        assert_box_close(&kf.bbox(), &bbox, 1e-6);
        assert!(kf.covariance()[(0, 0)] > before);
    }

    #[test]
    fn test_update_pulls_toward_measurement() {
        let mut kf = MotionEstimator::initiate(&BoundingBox::new(100.0, 100.0, 200.0, 200.0));
        kf.predict();
        kf.update(&BoundingBox::new(110.0, 100.0, 210.0, 200.0));

        let cx = kf.mean()[0];
        assert!(cx > 150.0 && cx < 160.0, "cx = {}", cx);
    }

    #[test]
    fn test_learns_constant_velocity() {
        let mut kf = MotionEstimator::initiate(&BoundingBox::new(0.0, 0.0, 100.0, 100.0));
        for step in 1..=20 {
            let dx = 5.0 * step as f64;
            kf.predict();
            kf.update(&BoundingBox::new(dx, 0.0, 100.0 + dx, 100.0));
        }

        assert!(kf.mean()[4] > 3.0, "vcx = {}", kf.mean()[4]);
        kf.predict();
        assert!(kf.bbox().centroid().x > 150.0);
    }

    #[test]
    fn test_degenerate_box_does_not_produce_nan() {
        let mut kf = MotionEstimator::initiate(&BoundingBox::new(5.0, 5.0, 5.0, 5.0));
        kf.predict();
        kf.update(&BoundingBox::new(5.0, 5.0, 5.0, 5.0));

        let b = kf.bbox();
        assert!(b.x1.is_finite() && b.y2.is_finite());
    }
}
