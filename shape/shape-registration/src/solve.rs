//! Closed-form best-fit transforms between paired point sets.
//!
//! - [`solve_rigid`] - Kabsch: rotation + translation
//! - [`solve_similarity`] - Umeyama: rotation + uniform scale + translation
//! - [`solve_affine`] - linear least squares: general 3×3 map + translation
//!
//! All three minimise `Σ |T(sᵢ) − tᵢ|²` over their transform family.

use nalgebra::{Matrix3, Point3, SymmetricEigen, Vector3};

use crate::{IcpMode, RegistrationError, RegistrationResult, RigidTransform};

/// Smallest-to-largest covariance eigenvalue ratio below which a point set
/// is treated as coplanar.
const PLANARITY_TOLERANCE: f64 = 1e-10;

/// Centroid and centred copies of a point set.
fn centre(points: &[Point3<f64>]) -> (Vector3<f64>, Vec<Vector3<f64>>) {
    #[allow(clippy::cast_precision_loss)]
    let centroid = points.iter().map(|p| p.coords).sum::<Vector3<f64>>() / points.len() as f64;
    let centred = points.iter().map(|p| p.coords - centroid).collect();
    (centroid, centred)
}

fn check_pairs(source: &[Point3<f64>], target: &[Point3<f64>]) -> RegistrationResult<()> {
    if source.is_empty() {
        return Err(RegistrationError::EmptySourceMesh);
    }
    if target.is_empty() {
        return Err(RegistrationError::EmptyTargetMesh);
    }
    if source.len() != target.len() {
        return Err(RegistrationError::LengthMismatch {
            source_len: source.len(),
            target_len: target.len(),
        });
    }
    Ok(())
}

/// Fail unless `points` holds at least four points spanning all three
/// dimensions.
///
/// # Errors
///
/// Returns [`RegistrationError::InsufficientGeometry`] for fewer than four
/// points or a (near) coplanar configuration.
pub fn check_geometry(points: &[Point3<f64>]) -> RegistrationResult<()> {
    if points.len() < 4 {
        return Err(RegistrationError::InsufficientGeometry {
            points: points.len(),
            reason: "at least 4 points are required".to_string(),
        });
    }
    let (_, centred) = centre(points);
    let covariance: Matrix3<f64> = centred.iter().map(|c| c * c.transpose()).sum();
    let eigen = SymmetricEigen::new(covariance);
    let largest = eigen.eigenvalues.max();
    let smallest = eigen.eigenvalues.min();
    if largest <= 0.0 || smallest <= largest * PLANARITY_TOLERANCE {
        return Err(RegistrationError::InsufficientGeometry {
            points: points.len(),
            reason: if largest <= 0.0 {
                "all points coincide".to_string()
            } else {
                "points are coplanar or collinear".to_string()
            },
        });
    }
    Ok(())
}

/// Rotation `R` maximising `Σ tᵢ · R sᵢ` for centred pairs, with reflections
/// corrected so `det R = +1`. Also returns the SVD singular values with the
/// reflection sign applied, for the Umeyama scale.
fn kabsch_rotation(
    source: &[Vector3<f64>],
    target: &[Vector3<f64>],
) -> RegistrationResult<(Matrix3<f64>, Vector3<f64>)> {
    // H = Σ sᵢ tᵢᵀ
    let h: Matrix3<f64> = source
        .iter()
        .zip(target)
        .map(|(s, t)| s * t.transpose())
        .sum();
    let svd = h.svd(true, true);
    let u = svd.u.ok_or(RegistrationError::SvdFailed)?;
    let v_t = svd.v_t.ok_or(RegistrationError::SvdFailed)?;
    let v = v_t.transpose();

    let mut d = Matrix3::identity();
    if (v * u.transpose()).determinant() < 0.0 {
        d[(2, 2)] = -1.0;
    }
    let mut singular = svd.singular_values;
    singular[2] *= d[(2, 2)];
    Ok((v * d * u.transpose(), singular))
}

/// Optimal rotation and translation (Kabsch).
///
/// # Errors
///
/// Returns an error for empty or unequal point sets, or if the SVD fails.
///
/// # Example
///
/// ```
/// use shape_registration::solve_rigid;
/// use nalgebra::Point3;
///
/// let source = [
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
/// ];
/// let target = source.map(|p| p + nalgebra::Vector3::new(1.0, 2.0, 3.0));
///
/// let t = solve_rigid(&source, &target).unwrap();
/// assert!((t.transform_point(&source[1]) - target[1]).norm() < 1e-9);
/// ```
pub fn solve_rigid(
    source: &[Point3<f64>],
    target: &[Point3<f64>],
) -> RegistrationResult<RigidTransform> {
    check_pairs(source, target)?;
    let (sc, s) = centre(source);
    let (tc, t) = centre(target);
    let (rotation, _) = kabsch_rotation(&s, &t)?;
    Ok(RigidTransform::new(rotation, tc - rotation * sc))
}

/// Optimal rotation, uniform scale and translation (Umeyama).
///
/// # Errors
///
/// Returns an error for empty or unequal point sets, if the source points
/// all coincide, or if the SVD fails.
pub fn solve_similarity(
    source: &[Point3<f64>],
    target: &[Point3<f64>],
) -> RegistrationResult<RigidTransform> {
    check_pairs(source, target)?;
    let (sc, s) = centre(source);
    let (tc, t) = centre(target);
    let (rotation, singular) = kabsch_rotation(&s, &t)?;

    let spread: f64 = s.iter().map(Vector3::norm_squared).sum();
    if spread <= f64::EPSILON {
        return Err(RegistrationError::InsufficientGeometry {
            points: source.len(),
            reason: "all source points coincide".to_string(),
        });
    }
    let scale = singular.sum() / spread;
    let linear = rotation * scale;
    Ok(RigidTransform::new(linear, tc - linear * sc))
}

/// Least-squares affine map: `A = (Σ tᵢ sᵢᵀ)(Σ sᵢ sᵢᵀ)⁻¹` on centred pairs.
///
/// # Errors
///
/// Returns [`RegistrationError::InsufficientGeometry`] if the source points
/// do not span three dimensions, plus the usual pairing errors.
pub fn solve_affine(
    source: &[Point3<f64>],
    target: &[Point3<f64>],
) -> RegistrationResult<RigidTransform> {
    check_pairs(source, target)?;
    let (sc, s) = centre(source);
    let (tc, t) = centre(target);

    let ss: Matrix3<f64> = s.iter().map(|v| v * v.transpose()).sum();
    let ts: Matrix3<f64> = t.iter().zip(&s).map(|(a, b)| a * b.transpose()).sum();
    let inverse = ss
        .try_inverse()
        .filter(|_| ss.determinant().abs() > f64::EPSILON * ss.norm().powi(3))
        .ok_or_else(|| RegistrationError::InsufficientGeometry {
            points: source.len(),
            reason: "source points do not span three dimensions".to_string(),
        })?;
    let linear = ts * inverse;
    Ok(RigidTransform::new(linear, tc - linear * sc))
}

/// Best-fit transform of the family `mode`.
///
/// # Errors
///
/// See [`solve_rigid`], [`solve_similarity`] and [`solve_affine`].
pub fn solve(
    mode: IcpMode,
    source: &[Point3<f64>],
    target: &[Point3<f64>],
) -> RegistrationResult<RigidTransform> {
    match mode {
        IcpMode::Rigid => solve_rigid(source, target),
        IcpMode::Similarity => solve_similarity(source, target),
        IcpMode::Affine => solve_affine(source, target),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;
    use rand::{Rng, SeedableRng};

    fn cloud(n: usize, seed: u64) -> Vec<Point3<f64>> {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                Point3::new(
                    rng.gen_range(-5.0..5.0),
                    rng.gen_range(-5.0..5.0),
                    rng.gen_range(-5.0..5.0),
                )
            })
            .collect()
    }

    fn apply(t: &RigidTransform, points: &[Point3<f64>]) -> Vec<Point3<f64>> {
        points.iter().map(|p| t.transform_point(p)).collect()
    }

    #[test]
    fn rigid_recovers_rotation() {
        let source = cloud(40, 1);
        let truth = RigidTransform::from_rotation(
            UnitQuaternion::from_euler_angles(0.3, -0.7, 1.1),
            Vector3::new(4.0, -2.0, 0.5),
        );
        let target = apply(&truth, &source);
        let t = solve_rigid(&source, &target).unwrap();
        assert_relative_eq!(t.linear, truth.linear, epsilon = 1e-9);
        assert_relative_eq!(t.translation, truth.translation, epsilon = 1e-9);
        assert!(t.is_rigid(1e-9));
    }

    #[test]
    fn rigid_never_reflects() {
        let source = cloud(30, 2);
        let mirror: Vec<Point3<f64>> = source.iter().map(|p| Point3::new(-p.x, p.y, p.z)).collect();
        let t = solve_rigid(&source, &mirror).unwrap();
        assert!(t.determinant() > 0.0);
    }

    #[test]
    fn rigid_ignores_scale() {
        let source = cloud(30, 3);
        let scaled: Vec<Point3<f64>> = source.iter().map(|p| Point3::from(p.coords * 2.0)).collect();
        let t = solve_rigid(&source, &scaled).unwrap();
        assert!(t.is_rigid(1e-9));
    }

    #[test]
    fn similarity_recovers_scale() {
        let source = cloud(40, 4);
        let truth = RigidTransform::from_rotation_scale(
            UnitQuaternion::from_euler_angles(-0.2, 0.4, 0.9),
            1.7,
            Vector3::new(-1.0, 3.0, 2.0),
        );
        let target = apply(&truth, &source);
        let t = solve_similarity(&source, &target).unwrap();
        assert_relative_eq!(t.linear, truth.linear, epsilon = 1e-9);
        assert_relative_eq!(t.determinant().cbrt(), 1.7, epsilon = 1e-9);
    }

    #[test]
    fn affine_recovers_shear() {
        let source = cloud(40, 5);
        let truth = RigidTransform::new(
            Matrix3::new(1.2, 0.3, 0.0, -0.1, 0.8, 0.4, 0.05, 0.0, 1.5),
            Vector3::new(0.5, 0.5, -2.0),
        );
        let target = apply(&truth, &source);
        let t = solve_affine(&source, &target).unwrap();
        assert_relative_eq!(t.linear, truth.linear, epsilon = 1e-9);
        assert_relative_eq!(t.translation, truth.translation, epsilon = 1e-9);
    }

    #[test]
    fn affine_rejects_planar_source() {
        let planar: Vec<Point3<f64>> = cloud(20, 6).iter().map(|p| Point3::new(p.x, p.y, 0.0)).collect();
        let result = solve_affine(&planar, &planar);
        assert!(matches!(result, Err(RegistrationError::InsufficientGeometry { .. })));
    }

    #[test]
    fn geometry_checks() {
        assert!(check_geometry(&cloud(10, 7)).is_ok());
        assert!(matches!(
            check_geometry(&cloud(3, 7)),
            Err(RegistrationError::InsufficientGeometry { points: 3, .. })
        ));
        let planar: Vec<Point3<f64>> = cloud(50, 8).iter().map(|p| Point3::new(p.x, p.y, 1.0)).collect();
        assert!(check_geometry(&planar).is_err());
        let same = vec![Point3::new(1.0, 1.0, 1.0); 6];
        assert!(check_geometry(&same).is_err());
    }

    #[test]
    fn length_mismatch_rejected() {
        let a = cloud(5, 9);
        let b = cloud(4, 9);
        assert_eq!(
            solve(IcpMode::Rigid, &a, &b).unwrap_err(),
            RegistrationError::LengthMismatch {
                source_len: 5,
                target_len: 4
            }
        );
    }
}
