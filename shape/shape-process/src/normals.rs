//! Per-point normal estimation.

use nalgebra::Vector3;
use shape_types::Mesh;

/// Return a copy of `mesh` with area-weighted per-point normals.
///
/// Each point's normal is the normalised sum of the unnormalised normals of
/// its incident faces. Points with no incident faces, or whose face normals
/// cancel, get no normal. Positions, faces and the correspondence group are
/// unchanged.
///
/// # Example
///
/// ```
/// use shape_process::compute_normals;
/// use shape_types::unit_cube;
///
/// let cube = compute_normals(&unit_cube());
/// assert!(cube.has_normals());
/// // Corner (0, 0, 0) points away from the cube
/// let n = cube.vertices[0].normal.unwrap();
/// assert!(n.x < 0.0 && n.y < 0.0 && n.z < 0.0);
/// ```
#[must_use]
pub fn compute_normals(mesh: &Mesh) -> Mesh {
    let mut sums = vec![Vector3::zeros(); mesh.vertices.len()];
    for face in &mesh.faces {
        let [a, b, c] = face.map(|i| mesh.vertices[i as usize].position);
        let n = (b - a).cross(&(c - a));
        for &i in face {
            sums[i as usize] += n;
        }
    }

    let mut out = mesh.clone();
    for (vertex, sum) in out.vertices.iter_mut().zip(sums) {
        vertex.normal = sum.try_normalize(f64::EPSILON);
    }
    out
}
