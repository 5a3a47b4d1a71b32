//! Iterative Closest Point (ICP) registration of one surface onto another.
//!
//! Each iteration:
//! 1. Moves a fixed subset of source points (the landmarks) by the current transform
//! 2. Finds the closest point on the target surface for each landmark
//! 3. Solves the best-fit transform of the chosen [`IcpMode`] for those pairs
//! 4. Composes it into the running transform and measures the RMS distance
//!
//! Iteration stops once the RMS distance is at or below
//! [`IcpParams::max_rms_error`], or after [`IcpParams::max_iterations`].

use crate::closest::SurfaceLocator;
use crate::solve::{check_geometry, solve};
use crate::{RegistrationError, RegistrationResult, RigidTransform};
use nalgebra::Point3;
use rayon::prelude::*;
use shape_types::{Mesh, Vertex};
use tracing::{debug, info, warn};

/// Family of transforms ICP solves for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum IcpMode {
    /// Rotation and translation.
    #[default]
    Rigid,
    /// Rotation, one uniform scale factor and translation.
    Similarity,
    /// General 3×3 linear map and translation.
    Affine,
}

impl std::fmt::Display for IcpMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Rigid => "rigid",
            Self::Similarity => "similarity",
            Self::Affine => "affine",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for IcpMode {
    type Err = RegistrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rigid" => Ok(Self::Rigid),
            "similarity" => Ok(Self::Similarity),
            "affine" => Ok(Self::Affine),
            other => Err(RegistrationError::InvalidParameter(format!(
                "unknown ICP mode '{other}'"
            ))),
        }
    }
}

/// Parameters for ICP registration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct IcpParams {
    /// Maximum number of iterations (default: 100).
    pub max_iterations: u32,
    /// Maximum number of source points matched per iteration (default: 500).
    pub max_landmarks: usize,
    /// Stop once the RMS closest-point distance is at or below this (default: 0.01).
    pub max_rms_error: f64,
    /// Transform family (default: [`IcpMode::Rigid`]).
    pub mode: IcpMode,
}

impl Default for IcpParams {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            max_landmarks: 500,
            max_rms_error: 0.01,
            mode: IcpMode::Rigid,
        }
    }
}

impl IcpParams {
    /// Creates new ICP parameters with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of iterations.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the maximum number of landmarks.
    #[must_use]
    pub const fn with_max_landmarks(mut self, max_landmarks: usize) -> Self {
        self.max_landmarks = max_landmarks;
        self
    }

    /// Sets the RMS stopping threshold.
    #[must_use]
    pub const fn with_max_rms_error(mut self, max_rms_error: f64) -> Self {
        self.max_rms_error = max_rms_error;
        self
    }

    /// Sets the transform family.
    #[must_use]
    pub const fn with_mode(mut self, mode: IcpMode) -> Self {
        self.mode = mode;
        self
    }

    /// Checks that every parameter is in range.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::InvalidParameter`] for a zero iteration
    /// or landmark count, or a threshold that is not finite and positive.
    pub fn validate(&self) -> RegistrationResult<()> {
        if self.max_iterations == 0 {
            return Err(RegistrationError::InvalidParameter(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if self.max_landmarks == 0 {
            return Err(RegistrationError::InvalidParameter(
                "max_landmarks must be at least 1".to_string(),
            ));
        }
        if !self.max_rms_error.is_finite() || self.max_rms_error <= 0.0 {
            return Err(RegistrationError::InvalidParameter(format!(
                "max_rms_error must be positive, got {}",
                self.max_rms_error
            )));
        }
        Ok(())
    }
}

/// Result of ICP registration.
#[derive(Debug, Clone)]
pub struct IcpResult {
    /// Accumulated transform mapping the source onto the target.
    pub transform: RigidTransform,
    /// RMS landmark distance after the final iteration.
    pub rms_error: f64,
    /// Largest landmark distance after the final iteration.
    pub max_error: f64,
    /// Number of iterations performed.
    pub iterations: u32,
    /// Whether the RMS threshold was reached.
    pub converged: bool,
    /// Number of source points matched per iteration.
    pub landmark_count: usize,
}

impl std::fmt::Display for IcpResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ICP: {} iterations, RMS {:.6}, max {:.6}, {} landmarks{}",
            self.iterations,
            self.rms_error,
            self.max_error,
            self.landmark_count,
            if self.converged { "" } else { " (not converged)" }
        )
    }
}

/// Evenly strided subset of at most `max` points, in source order.
fn select_landmarks(points: &[Point3<f64>], max: usize) -> Vec<Point3<f64>> {
    let n = points.len();
    let count = n.min(max);
    (0..count).map(|i| points[i * n / count]).collect()
}

/// Computes the transform that registers `source` onto `target`.
///
/// The transform is initialised by matching centroids. The target is used
/// as a surface when it has faces and as a point cloud otherwise.
///
/// # Errors
///
/// - [`RegistrationError::InvalidParameter`] for out-of-range parameters
/// - [`RegistrationError::EmptySourceMesh`] / [`RegistrationError::EmptyTargetMesh`]
/// - [`RegistrationError::InsufficientGeometry`] if the source landmarks or
///   the target points are fewer than four or do not span three dimensions
/// - [`RegistrationError::SvdFailed`] if a solve fails numerically
///
/// # Example
///
/// ```
/// use shape_registration::{icp_align, IcpParams};
/// use shape_types::unit_cube;
/// use nalgebra::Vector3;
///
/// let source = unit_cube();
/// let mut target = unit_cube();
/// target.translate(Vector3::new(2.0, -1.0, 0.5));
///
/// let result = icp_align(&source, &target, &IcpParams::default()).unwrap();
/// assert!(result.converged);
/// assert!((result.transform.translation - Vector3::new(2.0, -1.0, 0.5)).norm() < 1e-9);
/// ```
pub fn icp_align(source: &Mesh, target: &Mesh, params: &IcpParams) -> RegistrationResult<IcpResult> {
    params.validate()?;
    if source.vertices.is_empty() {
        return Err(RegistrationError::EmptySourceMesh);
    }
    if target.vertices.is_empty() {
        return Err(RegistrationError::EmptyTargetMesh);
    }

    let source_points: Vec<Point3<f64>> = source.positions().copied().collect();
    let target_points: Vec<Point3<f64>> = target.positions().copied().collect();
    let landmarks = select_landmarks(&source_points, params.max_landmarks);
    check_geometry(&landmarks)?;
    check_geometry(&target_points)?;

    let locator = SurfaceLocator::new(target);
    let mut current = match (source.centroid(), target.centroid()) {
        (Some(s), Some(t)) => RigidTransform::from_translation(t - s),
        _ => RigidTransform::identity(),
    };

    let mut rms_error = f64::INFINITY;
    let mut max_error = f64::INFINITY;
    let mut iterations = 0;
    let mut converged = false;

    for iter in 0..params.max_iterations {
        iterations = iter + 1;

        let moved: Vec<Point3<f64>> = landmarks.iter().map(|p| current.transform_point(p)).collect();
        let matched: Vec<Point3<f64>> = moved.par_iter().map(|p| locator.closest(p).0).collect();

        let incremental = solve(params.mode, &moved, &matched)?;
        current = incremental.compose(&current);

        let (rms, max) = error_metrics(&incremental, &moved, &matched);
        rms_error = rms;
        max_error = max;
        debug!(iteration = iterations, rms = rms_error, max = max_error, "ICP iteration");

        if rms_error <= params.max_rms_error {
            converged = true;
            break;
        }
    }

    if !converged {
        warn!(
            iterations,
            rms = rms_error,
            threshold = params.max_rms_error,
            "ICP stopped at the iteration cap"
        );
    }

    Ok(IcpResult {
        transform: current,
        rms_error,
        max_error,
        iterations,
        converged,
        landmark_count: landmarks.len(),
    })
}

/// RMS and maximum distance between the updated landmarks and their matches.
fn error_metrics(
    incremental: &RigidTransform,
    moved: &[Point3<f64>],
    matched: &[Point3<f64>],
) -> (f64, f64) {
    let (sum_sq, max_sq) = moved
        .iter()
        .zip(matched)
        .map(|(p, q)| (incremental.transform_point(p) - q).norm_squared())
        .fold((0.0, 0.0_f64), |(sum, max), d| (sum + d, max.max(d)));
    #[allow(clippy::cast_precision_loss)]
    let mean_sq = sum_sq / moved.len() as f64;
    (mean_sq.sqrt(), max_sq.sqrt())
}

/// Registers `source` onto `target` and returns the moved source with the
/// registration result.
///
/// The returned mesh keeps the source's point order and correspondence
/// group.
///
/// # Errors
///
/// See [`icp_align`].
pub fn align(
    source: &Mesh,
    target: &Mesh,
    params: &IcpParams,
) -> RegistrationResult<(Mesh, IcpResult)> {
    let result = icp_align(source, target, params)?;
    info!(
        mode = %params.mode,
        source_points = source.vertices.len(),
        target_points = target.vertices.len(),
        iterations = result.iterations,
        rms = result.rms_error,
        converged = result.converged,
        "ICP registration complete"
    );
    Ok((apply_transform_to_other(&result.transform, source), result))
}

/// Applies a registration transform to any mesh.
///
/// Positions are transformed directly and normals by the inverse transpose
/// of the linear part, so they stay perpendicular to the surface under
/// scale and shear. Point order, faces and the correspondence group are
/// preserved.
///
/// # Example
///
/// ```
/// use shape_registration::{apply_transform_to_other, RigidTransform};
/// use shape_types::unit_cube;
/// use nalgebra::Vector3;
///
/// let cube = unit_cube();
/// let moved = apply_transform_to_other(&RigidTransform::from_translation(Vector3::new(5.0, 0.0, 0.0)), &cube);
///
/// assert!((moved.vertices[0].position.x - cube.vertices[0].position.x - 5.0).abs() < 1e-12);
/// assert_eq!(moved.faces, cube.faces);
/// ```
#[must_use]
pub fn apply_transform_to_other(transform: &RigidTransform, mesh: &Mesh) -> Mesh {
    let vertices = mesh
        .vertices
        .iter()
        .map(|v| Vertex {
            position: transform.transform_point(&v.position),
            normal: v.normal.and_then(|n| transform.transform_normal(&n)),
        })
        .collect();
    Mesh {
        vertices,
        faces: mesh.faces.clone(),
        group: mesh.group,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix3, UnitQuaternion, Vector3};
    use shape_types::CorrespondenceGroup;

    /// Fibonacci points on an ellipsoid with semi-axes `radii`.
    fn ellipsoid(n: usize, radii: Vector3<f64>) -> Mesh {
        let golden = std::f64::consts::PI * (3.0 - 5.0_f64.sqrt());
        #[allow(clippy::cast_precision_loss)]
        let points = (0..n).map(|i| {
            let z = 1.0 - 2.0 * (i as f64 + 0.5) / n as f64;
            let r = (1.0 - z * z).sqrt();
            let theta = golden * i as f64;
            Point3::new(radii.x * r * theta.cos(), radii.y * r * theta.sin(), radii.z * z)
        });
        Mesh::from_points(points)
    }

    fn sphere(n: usize) -> Mesh {
        ellipsoid(n, Vector3::new(1.0, 1.0, 1.0))
    }

    fn squashed(n: usize) -> Mesh {
        ellipsoid(n, Vector3::new(1.0, 0.8, 0.6))
    }

    fn moved(mesh: &Mesh, t: &RigidTransform) -> Mesh {
        apply_transform_to_other(t, mesh)
    }

    fn max_point_error(a: &Mesh, b: &Mesh) -> f64 {
        a.positions()
            .zip(b.positions())
            .map(|(p, q)| (p - q).norm())
            .fold(0.0, f64::max)
    }

    #[test]
    fn rigid_copy_converges_tightly() {
        let source = squashed(500);
        let truth = RigidTransform::from_rotation(
            UnitQuaternion::from_euler_angles(0.06, -0.03, 0.05),
            Vector3::new(0.5, -0.3, 0.2),
        );
        let target = moved(&source, &truth);

        let params = IcpParams::default().with_max_rms_error(1e-9);
        let result = icp_align(&source, &target, &params).unwrap();

        assert!(result.iterations <= 100);
        assert!(result.rms_error < 1e-6, "{result}");
        assert!(result.transform.is_rigid(1e-9));
        assert_relative_eq!(result.transform.linear, truth.linear, epsilon = 1e-6);
    }

    #[test]
    fn sphere_translation_recovered() {
        let source = sphere(500);
        let offset = Vector3::new(3.0, -2.0, 1.5);
        let target = moved(&source, &RigidTransform::from_translation(offset));

        let result = icp_align(&source, &target, &IcpParams::default()).unwrap();

        assert!(result.converged);
        assert_eq!(result.iterations, 1);
        assert_relative_eq!(result.transform.translation, offset, epsilon = 1e-9);
    }

    #[test]
    fn similarity_recovers_uniform_scale() {
        let source = squashed(400);
        let truth = RigidTransform::from_rotation_scale(
            UnitQuaternion::from_euler_angles(0.02, 0.02, -0.03),
            1.04,
            Vector3::new(-1.0, 0.5, 0.0),
        );
        let target = moved(&source, &truth);

        let params = IcpParams::default()
            .with_mode(IcpMode::Similarity)
            .with_max_rms_error(1e-9);
        let result = icp_align(&source, &target, &params).unwrap();

        assert!(result.rms_error < 1e-6, "{result}");
        assert_relative_eq!(result.transform.determinant().cbrt(), 1.04, epsilon = 1e-6);
    }

    #[test]
    fn rigid_mode_never_scales() {
        let source = squashed(300);
        let truth = RigidTransform::from_rotation_scale(UnitQuaternion::identity(), 1.5, Vector3::zeros());
        let target = moved(&source, &truth);

        let result = icp_align(&source, &target, &IcpParams::default().with_max_iterations(20)).unwrap();

        assert!(result.transform.is_rigid(1e-9));
        assert!(!result.converged);
    }

    #[test]
    fn affine_recovers_stretch() {
        let source = squashed(400);
        let truth = RigidTransform::new(
            Matrix3::new(1.04, 0.0, 0.0, 0.0, 0.97, 0.0, 0.0, 0.0, 1.02),
            Vector3::new(0.2, 0.1, -0.1),
        );
        let target = moved(&source, &truth);

        let params = IcpParams::default()
            .with_mode(IcpMode::Affine)
            .with_max_rms_error(1e-9);
        let (registered, result) = align(&source, &target, &params).unwrap();

        assert!(result.rms_error < 1e-6, "{result}");
        assert!(max_point_error(&registered, &target) < 1e-5);
    }

    #[test]
    fn landmark_subset_is_strided() {
        let points: Vec<Point3<f64>> = (0..10).map(|i| Point3::new(f64::from(i), 0.0, 0.0)).collect();
        let picked = select_landmarks(&points, 4);
        let xs: Vec<f64> = picked.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![0.0, 2.0, 5.0, 7.0]);
        assert_eq!(select_landmarks(&points, 50).len(), 10);
    }

    #[test]
    fn landmark_cap_reported() {
        let source = sphere(800);
        let target = moved(&source, &RigidTransform::from_translation(Vector3::new(0.1, 0.0, 0.0)));
        let result = icp_align(&source, &target, &IcpParams::default().with_max_landmarks(200)).unwrap();
        assert_eq!(result.landmark_count, 200);
    }

    #[test]
    fn degenerate_source_rejected() {
        let planar = Mesh::from_points((0..20).map(|i| {
            let t = f64::from(i);
            Point3::new(t.cos(), t.sin(), 0.0)
        }));
        let target = sphere(100);
        let result = icp_align(&planar, &target, &IcpParams::default());
        assert!(matches!(result, Err(RegistrationError::InsufficientGeometry { points: 20, .. })));

        let tiny = Mesh::from_points([Point3::origin(), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)]);
        assert!(matches!(
            icp_align(&target, &tiny, &IcpParams::default()),
            Err(RegistrationError::InsufficientGeometry { points: 3, .. })
        ));
    }

    #[test]
    fn empty_meshes_rejected() {
        let sphere = sphere(50);
        assert_eq!(
            icp_align(&Mesh::new(), &sphere, &IcpParams::default()).unwrap_err(),
            RegistrationError::EmptySourceMesh
        );
        assert_eq!(
            icp_align(&sphere, &Mesh::new(), &IcpParams::default()).unwrap_err(),
            RegistrationError::EmptyTargetMesh
        );
    }

    #[test]
    fn invalid_params_rejected() {
        let s = sphere(50);
        for params in [
            IcpParams::default().with_max_iterations(0),
            IcpParams::default().with_max_landmarks(0),
            IcpParams::default().with_max_rms_error(0.0),
            IcpParams::default().with_max_rms_error(f64::NAN),
        ] {
            assert!(matches!(
                icp_align(&s, &s, &params),
                Err(RegistrationError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn propagated_transform_keeps_group_and_faces() {
        let mut mesh = shape_types::unit_cube().with_group(CorrespondenceGroup::fresh());
        for v in &mut mesh.vertices {
            v.normal = Some((v.position - Point3::new(0.5, 0.5, 0.5)).normalize());
        }
        let t = RigidTransform::from_rotation(
            UnitQuaternion::from_euler_angles(0.0, 0.0, std::f64::consts::FRAC_PI_2),
            Vector3::new(1.0, 0.0, 0.0),
        );
        let out = apply_transform_to_other(&t, &mesh);
        assert_eq!(out.group, mesh.group);
        assert_eq!(out.faces, mesh.faces);
        for (a, b) in mesh.vertices.iter().zip(&out.vertices) {
            assert_relative_eq!(t.transform_point(&a.position), b.position, epsilon = 1e-12);
            let n = b.normal.unwrap();
            assert_relative_eq!(n.norm(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("Similarity".parse::<IcpMode>().unwrap(), IcpMode::Similarity);
        assert_eq!(IcpMode::Affine.to_string(), "affine");
        assert!("shear".parse::<IcpMode>().is_err());
    }

    #[test]
    fn coincident_target_points_accepted() {
        let source = sphere(200);
        let mut target = sphere(200);
        for _ in 0..40 {
            target.vertices.push(Vertex::new(Point3::new(0.0, 0.0, 1.0)));
        }
        let result = icp_align(&source, &target, &IcpParams::default()).unwrap();
        assert!(result.rms_error.is_finite());
        assert!(result.max_error < 0.5);
    }
}
