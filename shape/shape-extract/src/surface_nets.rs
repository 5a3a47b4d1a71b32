//! Boolean surface nets over a label mask.
//!
//! The mask is sampled at voxel centres on a corner lattice padded by one
//! outside sample on every side, so every extracted surface is closed. Each
//! lattice cell whose eight corners disagree gets one surface point at the
//! mean of its sign-changing edge midpoints; every sign-changing lattice edge
//! emits the quad joining the four cells around it.
//!
//! Points on flat stretches of the mask lie on the voxel boundary, half a
//! voxel from the outermost centres. Cells on the mask's edges and corners
//! average midpoints from different faces and sit inside that boundary, so
//! the surface is rounded inward there: a lone voxel becomes a cube one
//! third of a voxel wide, and thin structures lose volume. Registration and
//! the shape model only see relative positions, but absolute measurements
//! taken on extracted surfaces are biased low by up to a sixth of a voxel
//! per axis at edges and a third at corners.

use nalgebra::{Point3, Vector3};
use shape_types::{LabelVolume, Mesh, Vertex};
use tracing::debug;

use crate::error::{ExtractError, ExtractResult};

/// Marker for cells with no surface point.
const NO_VERTEX: u32 = u32::MAX;

/// Inside/outside samples over the label's bounding box, padded by one.
struct Lattice {
    /// Voxel index of lattice corner 0 on each axis (may be -1).
    offset: [isize; 3],
    /// Corner counts on each axis.
    dims: [usize; 3],
    inside: Vec<bool>,
}

impl Lattice {
    fn build(volume: &LabelVolume, label: i32) -> Option<Self> {
        let [nx, ny, _] = volume.dims();
        let mut lo = [usize::MAX; 3];
        let mut hi = [0usize; 3];
        for (i, _) in volume.data().iter().enumerate().filter(|&(_, &v)| v == label) {
            let voxel = [i % nx, (i / nx) % ny, i / (nx * ny)];
            for a in 0..3 {
                lo[a] = lo[a].min(voxel[a]);
                hi[a] = hi[a].max(voxel[a]);
            }
        }
        if lo[0] == usize::MAX {
            return None;
        }

        let dims = [hi[0] - lo[0] + 3, hi[1] - lo[1] + 3, hi[2] - lo[2] + 3];
        #[allow(clippy::cast_possible_wrap)]
        // Volume dimensions are far below isize::MAX
        let offset = [lo[0] as isize - 1, lo[1] as isize - 1, lo[2] as isize - 1];

        let mut inside = vec![false; dims[0] * dims[1] * dims[2]];
        for z in 1..dims[2] - 1 {
            for y in 1..dims[1] - 1 {
                for x in 1..dims[0] - 1 {
                    let voxel = (lo[0] + x - 1, lo[1] + y - 1, lo[2] + z - 1);
                    inside[(z * dims[1] + y) * dims[0] + x] =
                        volume.get(voxel.0, voxel.1, voxel.2) == Some(label);
                }
            }
        }

        Some(Self {
            offset,
            dims,
            inside,
        })
    }

    #[inline]
    fn at(&self, q: [usize; 3]) -> bool {
        self.inside[(q[2] * self.dims[1] + q[1]) * self.dims[0] + q[0]]
    }

    #[inline]
    fn cell_index(&self, c: [usize; 3]) -> usize {
        (c[2] * (self.dims[1] - 1) + c[1]) * (self.dims[0] - 1) + c[0]
    }

    /// Surface point of cell `c` in lattice coordinates, if the cell is active.
    #[allow(clippy::cast_precision_loss)]
    fn cell_point(&self, c: [usize; 3]) -> Option<Vector3<f64>> {
        let mut sum = Vector3::zeros();
        let mut crossings = 0u32;
        for axis in 0..3 {
            let (u, v) = perpendicular(axis);
            for (du, dv) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                let mut a = c;
                a[u] += du;
                a[v] += dv;
                let mut b = a;
                b[axis] += 1;
                if self.at(a) != self.at(b) {
                    let mut mid = Vector3::new(a[0] as f64, a[1] as f64, a[2] as f64);
                    mid[axis] += 0.5;
                    sum += mid;
                    crossings += 1;
                }
            }
        }
        (crossings > 0).then(|| sum / f64::from(crossings))
    }
}

/// The two axes perpendicular to `axis`, in right-handed order.
const fn perpendicular(axis: usize) -> (usize, usize) {
    match axis {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    }
}

/// Extract the closed boundary surface of all voxels equal to `label`.
///
/// Points are placed in world coordinates using the volume's spacing and
/// origin. Faces wind counter-clockwise seen from outside, so the result has
/// positive signed volume. The output has shared points, no normals and an
/// unassigned correspondence group.
///
/// # Errors
///
/// - [`ExtractError::EmptyRegion`] if no voxel equals `label`.
/// - [`ExtractError::TooManyVertices`] if the surface cannot be indexed with `u32`.
///
/// # Example
///
/// ```
/// use shape_extract::extract;
/// use shape_types::{LabelVolume, MeshTopology, Point3, Vector3};
///
/// let volume = LabelVolume::from_fn([3, 3, 3], Vector3::new(1.0, 1.0, 1.0), Point3::origin(), |x, y, z| {
///     i32::from(x == 1 && y == 1 && z == 1) * 4
/// })
/// .unwrap();
///
/// let mesh = extract(&volume, 4).unwrap();
/// assert_eq!(mesh.vertex_count(), 8);
/// assert_eq!(mesh.face_count(), 12);
/// assert!(mesh.signed_volume() > 0.0);
/// ```
#[allow(clippy::cast_precision_loss)]
pub fn extract(volume: &LabelVolume, label: i32) -> ExtractResult<Mesh> {
    let lattice = Lattice::build(volume, label).ok_or(ExtractError::EmptyRegion { label })?;
    let [mx, my, mz] = lattice.dims;

    let mut mesh = Mesh::new();
    let mut cell_vertex = vec![NO_VERTEX; (mx - 1) * (my - 1) * (mz - 1)];
    for z in 0..mz - 1 {
        for y in 0..my - 1 {
            for x in 0..mx - 1 {
                let c = [x, y, z];
                let Some(local) = lattice.cell_point(c) else {
                    continue;
                };
                let index = u32::try_from(mesh.vertices.len())
                    .ok()
                    .filter(|&i| i != NO_VERTEX)
                    .ok_or(ExtractError::TooManyVertices {
                        label,
                        count: mesh.vertices.len() + 1,
                    })?;
                cell_vertex[lattice.cell_index(c)] = index;
                mesh.vertices.push(Vertex::new(volume.voxel_to_world(
                    local.x + lattice.offset[0] as f64,
                    local.y + lattice.offset[1] as f64,
                    local.z + lattice.offset[2] as f64,
                )));
            }
        }
    }

    for z in 0..mz {
        for y in 0..my {
            for x in 0..mx {
                let q = [x, y, z];
                let q_inside = lattice.at(q);
                for axis in 0..3 {
                    if q[axis] + 1 >= lattice.dims[axis] {
                        continue;
                    }
                    let mut b = q;
                    b[axis] += 1;
                    if lattice.at(b) == q_inside {
                        continue;
                    }

                    // Sign changes never touch the padding layer, so all
                    // four neighbouring cells exist.
                    let (u, v) = perpendicular(axis);
                    let cell = |du: usize, dv: usize| {
                        let mut c = q;
                        c[u] = c[u] + du - 1;
                        c[v] = c[v] + dv - 1;
                        cell_vertex[lattice.cell_index(c)]
                    };
                    let (c00, c10, c11, c01) = (cell(0, 0), cell(1, 0), cell(1, 1), cell(0, 1));

                    // (u, v) spans +x, -y, +z for the three axes
                    let forward = if axis == 1 { !q_inside } else { q_inside };
                    let quad = if forward {
                        [c00, c10, c11, c01]
                    } else {
                        [c00, c01, c11, c10]
                    };
                    push_quad(&mut mesh, quad);
                }
            }
        }
    }

    debug!(
        label,
        vertices = mesh.vertices.len(),
        faces = mesh.faces.len(),
        "Extracted label surface"
    );
    Ok(mesh)
}

/// Split a quad along its shorter diagonal, keeping the loop orientation.
fn push_quad(mesh: &mut Mesh, quad: [u32; 4]) {
    let p = |i: usize| -> Point3<f64> { mesh.vertices[quad[i] as usize].position };
    let d02 = (p(2) - p(0)).norm_squared();
    let d13 = (p(3) - p(1)).norm_squared();
    if d02 <= d13 {
        mesh.faces.push([quad[0], quad[1], quad[2]]);
        mesh.faces.push([quad[0], quad[2], quad[3]]);
    } else {
        mesh.faces.push([quad[0], quad[1], quad[3]]);
        mesh.faces.push([quad[1], quad[2], quad[3]]);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use shape_types::{MeshBounds, MeshTopology};
    use std::collections::HashMap;

    fn block(dims: [usize; 3], lo: [usize; 3], hi: [usize; 3], label: i32) -> LabelVolume {
        LabelVolume::from_fn(dims, Vector3::new(1.0, 1.0, 1.0), Point3::origin(), |x, y, z| {
            let inside = (lo[0]..=hi[0]).contains(&x)
                && (lo[1]..=hi[1]).contains(&y)
                && (lo[2]..=hi[2]).contains(&z);
            if inside {
                label
            } else {
                0
            }
        })
        .unwrap()
    }

    /// Count how many faces use each undirected edge.
    fn edge_use(mesh: &Mesh) -> HashMap<(u32, u32), usize> {
        let mut uses = HashMap::new();
        for f in &mesh.faces {
            for (a, b) in [(f[0], f[1]), (f[1], f[2]), (f[2], f[0])] {
                *uses.entry((a.min(b), a.max(b))).or_insert(0) += 1;
            }
        }
        uses
    }

    #[test]
    fn single_voxel_is_small_cube() {
        let volume = block([3, 3, 3], [1, 1, 1], [1, 1, 1], 1);
        let mesh = extract(&volume, 1).unwrap();
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.face_count(), 12);
        // Cell points sit a third of a voxel from the centre
        assert_relative_eq!(mesh.signed_volume(), 1.0 / 27.0, epsilon = 1e-12);
        assert_relative_eq!(mesh.bounds().center(), Point3::new(1.0, 1.0, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn block_is_closed_genus_zero() {
        let volume = block([8, 7, 6], [1, 2, 1], [5, 4, 3], 3);
        let mesh = extract(&volume, 3).unwrap();

        let uses = edge_use(&mesh);
        assert!(uses.values().all(|&n| n == 2));
        let euler = mesh.vertex_count() as i64 - uses.len() as i64 + mesh.face_count() as i64;
        assert_eq!(euler, 2);
        assert!(mesh.signed_volume() > 0.0);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn flat_faces_on_voxel_boundary_rims_inset() {
        let volume = block([8, 7, 6], [1, 2, 1], [5, 4, 3], 3);
        let mesh = extract(&volume, 3).unwrap();
        let (lo, hi) = (Point3::new(0.5, 1.5, 0.5), Point3::new(5.5, 4.5, 3.5));

        for p in mesh.positions() {
            for a in 0..3 {
                assert!(p[a] >= lo[a] - 1e-12 && p[a] <= hi[a] + 1e-12, "{p}");
            }
        }
        // Interior of the +X face sits exactly on the boundary plane.
        assert!(mesh
            .positions()
            .any(|p| (p.x - 5.5).abs() < 1e-12 && (p.y - 3.5).abs() < 1e-12 && (p.z - 2.5).abs() < 1e-12));
        // Rims are rounded inward, so the enclosed volume falls short of 5 x 3 x 3.
        let volume = mesh.signed_volume();
        assert!(volume < 45.0 && volume > 30.0, "{volume}");
    }

    #[test]
    fn label_touching_volume_border_is_closed() {
        let volume = block([4, 4, 4], [0, 0, 0], [3, 3, 3], 7);
        let mesh = extract(&volume, 7).unwrap();
        assert!(edge_use(&mesh).values().all(|&n| n == 2));
        assert!(mesh.signed_volume() > 0.0);
    }

    #[test]
    fn absent_label_is_empty_region() {
        let volume = block([4, 4, 4], [1, 1, 1], [2, 2, 2], 1);
        assert_eq!(extract(&volume, 9), Err(ExtractError::EmptyRegion { label: 9 }));
    }

    #[test]
    fn only_requested_label_is_extracted() {
        let volume = LabelVolume::from_fn(
            [6, 3, 3],
            Vector3::new(1.0, 1.0, 1.0),
            Point3::origin(),
            |x, y, z| match (x, y, z) {
                (1, 1, 1) => 1,
                (4, 1, 1) => 2,
                _ => 0,
            },
        )
        .unwrap();
        let one = extract(&volume, 1).unwrap();
        let two = extract(&volume, 2).unwrap();
        assert_relative_eq!(one.bounds().center().x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(two.bounds().center().x, 4.0, epsilon = 1e-12);
    }

    #[test]
    fn spacing_and_origin_are_applied() {
        let volume = LabelVolume::from_fn(
            [3, 3, 3],
            Vector3::new(2.0, 1.0, 0.5),
            Point3::new(10.0, 20.0, 30.0),
            |x, y, z| i32::from(x == 1 && y == 1 && z == 1),
        )
        .unwrap();
        let mesh = extract(&volume, 1).unwrap();
        assert_relative_eq!(mesh.signed_volume(), 1.0 / 27.0, epsilon = 1e-12);
        assert_relative_eq!(
            mesh.bounds().center(),
            Point3::new(12.0, 21.0, 30.5),
            epsilon = 1e-12
        );
        assert_relative_eq!(mesh.bounds().size(), Vector3::new(2.0, 1.0, 0.5) / 3.0, epsilon = 1e-12);
    }
}
