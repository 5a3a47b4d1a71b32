//! The canonical surface processing chain.

use shape_types::Mesh;
use tracing::debug;

use crate::decimate::{decimate, DecimationResult};
use crate::normals::compute_normals;
use crate::params::ProcessParams;
use crate::smooth::smooth;
use crate::weld::weld;

/// Output of [`process`].
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// The processed mesh, with fresh normals.
    pub mesh: Mesh,
    /// Points merged by the two weld passes.
    pub points_welded: usize,
    /// Decimation statistics, when decimation ran.
    pub decimation: Option<DecimationResult>,
}

impl std::fmt::Display for ProcessOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Processed: {} points, {} triangles, {} welded",
            self.mesh.vertices.len(),
            self.mesh.faces.len(),
            self.points_welded
        )?;
        if let Some(d) = &self.decimation {
            write!(f, "; {d}")?;
        }
        Ok(())
    }
}

/// Run the canonical chain on an extracted surface:
/// normals → weld → smooth → decimate → weld → normals.
///
/// Smoothing runs only for a positive iteration count and decimation only
/// for a ratio inside `(0, 1)`. The second weld restores shared points after
/// decimation, and the final normals reflect the final positions.
///
/// Parameters are not validated here; see [`ProcessParams::validate`].
///
/// # Example
///
/// ```
/// use shape_process::{process, ProcessParams};
/// use shape_types::unit_cube;
///
/// let out = process(&unit_cube(), &ProcessParams::default());
/// assert!(out.mesh.has_normals());
/// assert_eq!(out.mesh.vertices.len(), 8);
/// ```
#[must_use]
pub fn process(mesh: &Mesh, params: &ProcessParams) -> ProcessOutput {
    let with_normals = compute_normals(mesh);

    let first = weld(&with_normals, params.weld_tolerance);
    let mut points_welded = first.points_merged;
    let mut current = first.mesh;

    if params.smoothing_iterations > 0 {
        current = smooth(
            &current,
            params.smoothing_iterations,
            params.relaxation_factor,
        );
    }

    let decimation = params.decimates().then(|| {
        let result = decimate(&current, params.decimation_ratio);
        current = result.mesh.clone();
        result
    });

    let second = weld(&current, params.weld_tolerance);
    points_welded += second.points_merged;
    let mesh = compute_normals(&second.mesh);

    debug!(
        points = mesh.vertices.len(),
        triangles = mesh.faces.len(),
        points_welded,
        "Processed surface"
    );

    ProcessOutput {
        mesh,
        points_welded,
        decimation,
    }
}
