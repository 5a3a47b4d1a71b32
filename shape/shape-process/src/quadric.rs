//! Quadric error metric.
//!
//! A quadric accumulates squared distances to a set of planes, so merging
//! two points' quadrics gives the error of placing the merged point anywhere.

use nalgebra::{Matrix3, Matrix4, Point3, Vector3, Vector4};

/// Symmetric 4x4 quadric `Q` with error `[p 1]ᵀ Q [p 1]`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Quadric(Matrix4<f64>);

impl Default for Quadric {
    fn default() -> Self {
        Self(Matrix4::zeros())
    }
}

impl std::ops::AddAssign for Quadric {
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl std::ops::Add for Quadric {
    type Output = Self;

    fn add(mut self, other: Self) -> Self {
        self += other;
        self
    }
}

impl Quadric {
    /// Quadric of the plane through `point` with unit `normal`, weighted.
    pub(crate) fn from_plane(point: &Point3<f64>, normal: &Vector3<f64>, weight: f64) -> Self {
        let plane = Vector4::new(normal.x, normal.y, normal.z, -normal.dot(&point.coords));
        Self(plane * plane.transpose() * weight)
    }

    /// Sum of weighted squared plane distances at `p`.
    pub(crate) fn evaluate(&self, p: &Point3<f64>) -> f64 {
        let h = p.to_homogeneous();
        (h.transpose() * self.0 * h)[(0, 0)].max(0.0)
    }

    /// Point minimising the error, if the quadratic part is well conditioned.
    pub(crate) fn optimal_point(&self) -> Option<Point3<f64>> {
        let a: Matrix3<f64> = self.0.fixed_view::<3, 3>(0, 0).into_owned();
        let b: Vector3<f64> = self.0.fixed_view::<3, 1>(0, 3).into_owned();
        let scale = a.abs().max();
        if scale <= 0.0 || a.determinant().abs() < 1e-12 * scale.powi(3) {
            return None;
        }
        a.try_inverse().map(|inv| Point3::from(-(inv * b)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn single_plane_distance() {
        let q = Quadric::from_plane(&Point3::origin(), &Vector3::z(), 1.0);
        assert_relative_eq!(q.evaluate(&Point3::new(3.0, -2.0, 2.0)), 4.0, epsilon = 1e-12);
        assert!(q.optimal_point().is_none());
    }

    #[test]
    fn three_planes_meet_at_corner() {
        let corner = Point3::new(1.0, 2.0, 3.0);
        let q = Quadric::from_plane(&corner, &Vector3::x(), 1.0)
            + Quadric::from_plane(&corner, &Vector3::y(), 1.0)
            + Quadric::from_plane(&corner, &Vector3::z(), 1.0);
        let best = q.optimal_point().unwrap_or_else(Point3::origin);
        assert_relative_eq!(best, corner, epsilon = 1e-9);
        assert_relative_eq!(q.evaluate(&best), 0.0, epsilon = 1e-9);
    }
}
