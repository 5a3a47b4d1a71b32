//! Laplacian smoothing.

use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use shape_types::Mesh;
use tracing::debug;

use crate::normals::compute_normals;

/// Neighbouring point IDs of each point, sorted and deduplicated.
#[must_use]
pub fn point_neighbors(mesh: &Mesh) -> Vec<Vec<u32>> {
    let mut neighbors = vec![Vec::new(); mesh.vertices.len()];
    for face in &mesh.faces {
        for k in 0..3 {
            let v = face[k] as usize;
            neighbors[v].push(face[(k + 1) % 3]);
            neighbors[v].push(face[(k + 2) % 3]);
        }
    }
    for list in &mut neighbors {
        list.sort_unstable();
        list.dedup();
    }
    neighbors
}

/// Laplacian smoothing with a relaxation factor.
///
/// Each iteration moves every point `relaxation_factor` of the way toward
/// the centroid of its edge neighbours, using the previous iteration's
/// positions for all points. Points without neighbours stay put. Point IDs,
/// faces and the correspondence group are preserved; normals are recomputed
/// for the new positions, so `iterations == 0` only refreshes normals.
///
/// # Example
///
/// ```
/// use shape_process::smooth;
/// use shape_types::unit_cube;
///
/// let cube = unit_cube();
/// let smoothed = smooth(&cube, 5, 0.5);
/// assert!(smoothed.signed_volume() < cube.signed_volume());
/// assert!(smoothed.has_normals());
/// ```
#[must_use]
pub fn smooth(mesh: &Mesh, iterations: u32, relaxation_factor: f64) -> Mesh {
    if iterations == 0 || mesh.faces.is_empty() {
        return compute_normals(mesh);
    }

    let neighbors = point_neighbors(mesh);
    let mut positions: Vec<Point3<f64>> = mesh.positions().copied().collect();
    let mut max_step = 0.0_f64;

    for _ in 0..iterations {
        let next: Vec<Point3<f64>> = positions
            .par_iter()
            .zip(neighbors.par_iter())
            .map(|(p, adjacent)| {
                if adjacent.is_empty() {
                    return *p;
                }
                let sum: Vector3<f64> = adjacent
                    .iter()
                    .map(|&n| positions[n as usize].coords)
                    .sum();
                #[allow(clippy::cast_precision_loss)]
                let centroid = sum / adjacent.len() as f64;
                p + (centroid - p.coords) * relaxation_factor
            })
            .collect();

        max_step = next
            .iter()
            .zip(&positions)
            .map(|(a, b)| (a - b).norm())
            .fold(max_step, f64::max);
        positions = next;
    }

    debug!(iterations, relaxation_factor, max_step, "Smoothed mesh");

    let mut out = mesh.clone();
    for (vertex, p) in out.vertices.iter_mut().zip(positions) {
        vertex.position = p;
    }
    compute_normals(&out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use shape_types::{unit_cube, CorrespondenceGroup, MeshBounds};

    #[test]
    fn zero_iterations_only_adds_normals() {
        let cube = unit_cube();
        let out = smooth(&cube, 0, 0.4);
        assert!(out.has_normals());
        assert_eq!(out.faces, cube.faces);
        for (a, b) in out.positions().zip(cube.positions()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn zero_relaxation_keeps_positions() {
        let cube = unit_cube();
        let out = smooth(&cube, 10, 0.0);
        for (a, b) in out.positions().zip(cube.positions()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn smoothing_shrinks_inside_hull() {
        let cube = unit_cube();
        let out = smooth(&cube, 3, 0.4);
        assert!(out.signed_volume() > 0.0);
        assert!(out.signed_volume() < cube.signed_volume());
        assert!(cube.bounds().contains(&out.bounds().min));
        assert!(cube.bounds().contains(&out.bounds().max));
        for v in &out.vertices {
            assert_relative_eq!(v.normal.unwrap().norm(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn preserves_ids_and_group() {
        let group = CorrespondenceGroup::fresh();
        let cube = unit_cube().with_group(group);
        let out = smooth(&cube, 3, 0.4);
        assert_eq!(out.vertices.len(), cube.vertices.len());
        assert_eq!(out.faces, cube.faces);
        assert_eq!(out.group, group);
    }

    #[test]
    fn neighbors_of_cube_corner() {
        let neighbors = point_neighbors(&unit_cube());
        // Corner 0 touches 1, 2, 3, 4, 5 and 7 through the triangulation
        assert_eq!(neighbors[0], vec![1, 2, 3, 4, 5, 7]);
    }
}
