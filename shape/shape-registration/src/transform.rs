//! Affine transform type for registration results.

use nalgebra::{Matrix3, Matrix4, Point3, UnitQuaternion, Vector3};

/// A 3D affine transform `p ↦ L·p + t`.
///
/// Depending on the registration mode the linear part is a rotation, a
/// rotation times a uniform scale, or a general 3×3 matrix. The name follows
/// the common case; nothing here assumes `L` is orthogonal.
///
/// # Example
///
/// ```
/// use shape_registration::RigidTransform;
/// use nalgebra::{Point3, UnitQuaternion, Vector3};
/// use std::f64::consts::FRAC_PI_2;
///
/// let rotation = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
/// let transform = RigidTransform::from_rotation(rotation, Vector3::new(1.0, 2.0, 3.0));
///
/// let p = transform.transform_point(&Point3::new(1.0, 0.0, 0.0));
/// assert!((p - Point3::new(1.0, 3.0, 3.0)).norm() < 1e-12);
/// assert!(transform.is_rigid(1e-12));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RigidTransform {
    /// Linear part (rotation, scaled rotation or general).
    pub linear: Matrix3<f64>,
    /// Translation vector.
    pub translation: Vector3<f64>,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl RigidTransform {
    /// Creates a transform from its linear part and translation.
    #[must_use]
    pub const fn new(linear: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            linear,
            translation,
        }
    }

    /// Creates an identity transform.
    #[must_use]
    pub fn identity() -> Self {
        Self::new(Matrix3::identity(), Vector3::zeros())
    }

    /// Creates a pure translation.
    #[must_use]
    pub fn from_translation(translation: Vector3<f64>) -> Self {
        Self::new(Matrix3::identity(), translation)
    }

    /// Creates a rotation followed by a translation.
    #[must_use]
    pub fn from_rotation(rotation: UnitQuaternion<f64>, translation: Vector3<f64>) -> Self {
        Self::new(rotation.to_rotation_matrix().into_inner(), translation)
    }

    /// Creates scale, then rotation, then translation.
    #[must_use]
    pub fn from_rotation_scale(
        rotation: UnitQuaternion<f64>,
        scale: f64,
        translation: Vector3<f64>,
    ) -> Self {
        Self::new(rotation.to_rotation_matrix().into_inner() * scale, translation)
    }

    /// Transforms a 3D point.
    #[must_use]
    pub fn transform_point(&self, point: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.linear * point.coords + self.translation)
    }

    /// Transforms a direction (not translated).
    #[must_use]
    pub fn transform_vector(&self, vector: &Vector3<f64>) -> Vector3<f64> {
        self.linear * vector
    }

    /// Transforms a surface normal with the inverse transpose, renormalised.
    ///
    /// Returns `None` if the linear part is singular or the result vanishes.
    #[must_use]
    pub fn transform_normal(&self, normal: &Vector3<f64>) -> Option<Vector3<f64>> {
        let inverse = self.linear.try_inverse()?;
        (inverse.transpose() * normal).try_normalize(f64::EPSILON)
    }

    /// Composes this transform with another (self ∘ other).
    ///
    /// The result applies `other` first, then `self`.
    #[must_use]
    pub fn compose(&self, other: &Self) -> Self {
        Self::new(
            self.linear * other.linear,
            self.linear * other.translation + self.translation,
        )
    }

    /// Computes the inverse, or `None` if the linear part is singular.
    #[must_use]
    pub fn try_inverse(&self) -> Option<Self> {
        let inverse = self.linear.try_inverse()?;
        Some(Self::new(inverse, -(inverse * self.translation)))
    }

    /// Determinant of the linear part; negative for reflections.
    #[must_use]
    pub fn determinant(&self) -> f64 {
        self.linear.determinant()
    }

    /// Whether the linear part is a proper rotation within `epsilon`.
    #[must_use]
    pub fn is_rigid(&self, epsilon: f64) -> bool {
        (self.linear.transpose() * self.linear - Matrix3::identity()).abs().max() < epsilon
            && self.determinant() > 0.0
    }

    /// Converts to a 4×4 homogeneous matrix.
    #[must_use]
    pub fn to_matrix4(&self) -> Matrix4<f64> {
        let mut mat = self.linear.to_homogeneous();
        mat.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        mat
    }

    /// Reads the affine part of a homogeneous matrix, ignoring its last row.
    #[must_use]
    pub fn from_matrix4(mat: &Matrix4<f64>) -> Self {
        Self::new(
            mat.fixed_view::<3, 3>(0, 0).into_owned(),
            mat.fixed_view::<3, 1>(0, 3).into_owned(),
        )
    }

    /// Returns true if this transform is approximately the identity.
    #[must_use]
    pub fn is_identity(&self, epsilon: f64) -> bool {
        (self.linear - Matrix3::identity()).abs().max() < epsilon
            && self.translation.norm() < epsilon
    }
}

impl std::fmt::Display for RigidTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let m = self.to_matrix4();
        for r in 0..3 {
            if r > 0 {
                writeln!(f)?;
            }
            write!(
                f,
                "[{:>12.6} {:>12.6} {:>12.6} {:>12.6}]",
                m[(r, 0)],
                m[(r, 1)],
                m[(r, 2)],
                m[(r, 3)]
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn quarter_turn_z() -> UnitQuaternion<f64> {
        UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2)
    }

    #[test]
    fn test_identity() {
        let t = RigidTransform::identity();
        let p = Point3::new(1.0, 2.0, 3.0);
        assert_eq!(t.transform_point(&p), p);
        assert!(t.is_identity(1e-12));
        assert!(t.is_rigid(1e-12));
    }

    #[test]
    fn test_compose_applies_right_first() {
        let rotate = RigidTransform::from_rotation(quarter_turn_z(), Vector3::zeros());
        let shift = RigidTransform::from_translation(Vector3::new(1.0, 0.0, 0.0));
        let p = Point3::new(1.0, 0.0, 0.0);

        let shift_then_rotate = rotate.compose(&shift);
        assert_relative_eq!(
            shift_then_rotate.transform_point(&p),
            Point3::new(0.0, 2.0, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_inverse_roundtrip() {
        let t = RigidTransform::new(
            Matrix3::new(2.0, 0.1, 0.0, 0.0, 1.5, 0.3, 0.2, 0.0, 0.7),
            Vector3::new(-3.0, 4.0, 1.0),
        );
        let inv = t.try_inverse().unwrap();
        let p = Point3::new(0.3, -1.2, 5.0);
        assert_relative_eq!(inv.transform_point(&t.transform_point(&p)), p, epsilon = 1e-12);
        assert!(t.compose(&inv).is_identity(1e-12));
        assert!(!t.is_rigid(1e-6));
    }

    #[test]
    fn test_singular_has_no_inverse() {
        let t = RigidTransform::new(Matrix3::zeros(), Vector3::zeros());
        assert!(t.try_inverse().is_none());
        assert!(t.transform_normal(&Vector3::z()).is_none());
    }

    #[test]
    fn test_normal_stays_perpendicular_under_shear() {
        let t = RigidTransform::new(
            Matrix3::new(1.0, 2.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0),
            Vector3::zeros(),
        );
        // Plane z = 0 spanned by x and y, normal z
        let n = t.transform_normal(&Vector3::z()).unwrap();
        assert_relative_eq!(n.dot(&t.transform_vector(&Vector3::x())), 0.0, epsilon = 1e-12);
        assert_relative_eq!(n.dot(&t.transform_vector(&Vector3::y())), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_matrix4_roundtrip() {
        let t = RigidTransform::from_rotation_scale(quarter_turn_z(), 2.0, Vector3::new(1.0, 2.0, 3.0));
        let m = t.to_matrix4();
        assert_eq!(m[(3, 3)], 1.0);
        assert_eq!(m[(0, 3)], 1.0);
        assert_relative_eq!(RigidTransform::from_matrix4(&m).linear, t.linear);
        assert_relative_eq!(t.determinant(), 8.0, epsilon = 1e-12);
        assert!(format!("{t}").contains('['));
    }
}
