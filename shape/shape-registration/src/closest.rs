//! Closest-point queries against a target surface.

use hashbrown::HashMap;
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::{Point3, Rotation3};
use shape_types::{Mesh, Triangle};

/// Nearest-point lookup on a mesh surface.
///
/// A KD-tree finds the nearest mesh point; the exact closest point is then
/// taken over the triangles incident to it. Meshes without faces fall back
/// to nearest-point matching.
///
/// The KD-tree cannot hold more than a bucket of points sharing one
/// coordinate. Coincident points are therefore indexed once, with the faces
/// of every copy attached, and the tree works in a fixed oblique frame so
/// that flat axis-aligned patches of voxel surfaces do not line up either.
pub struct SurfaceLocator<'a> {
    mesh: &'a Mesh,
    frame: Rotation3<f64>,
    tree: KdTree<f64, 3>,
    points: Vec<Point3<f64>>,
    incident: Vec<Vec<u32>>,
}

/// Exact-position key; `-0.0` and `0.0` share a key.
fn position_key(p: &Point3<f64>) -> [u64; 3] {
    [p.x, p.y, p.z].map(|c| (c + 0.0).to_bits())
}

impl<'a> SurfaceLocator<'a> {
    /// Index the points and faces of `mesh`.
    #[must_use]
    pub fn new(mesh: &'a Mesh) -> Self {
        let frame = Rotation3::from_euler_angles(0.615_479_7, 0.523_598_8, 0.321_750_6);
        let mut tree: KdTree<f64, 3> = KdTree::new();
        let mut unique: HashMap<[u64; 3], usize> = HashMap::with_capacity(mesh.vertices.len());
        let mut points = Vec::with_capacity(mesh.vertices.len());
        let slot_of: Vec<usize> = mesh
            .vertices
            .iter()
            .map(|v| {
                *unique.entry(position_key(&v.position)).or_insert_with(|| {
                    let slot = points.len();
                    let p = frame * v.position;
                    tree.add(&[p.x, p.y, p.z], slot as u64);
                    points.push(v.position);
                    slot
                })
            })
            .collect();

        let mut incident = vec![Vec::new(); points.len()];
        for (fi, face) in mesh.faces.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            // Truncation: face counts are bounded by u32 indices
            let fi = fi as u32;
            for &v in face {
                let faces: &mut Vec<u32> = &mut incident[slot_of[v as usize]];
                if !faces.contains(&fi) {
                    faces.push(fi);
                }
            }
        }
        Self {
            mesh,
            frame,
            tree,
            points,
            incident,
        }
    }

    /// Number of distinct point positions indexed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the indexed mesh has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Closest surface point to `query` and its squared distance.
    #[must_use]
    pub fn closest(&self, query: &Point3<f64>) -> (Point3<f64>, f64) {
        let q = self.frame * query;
        let nearest = self.tree.nearest_one::<SquaredEuclidean>(&[q.x, q.y, q.z]);
        #[allow(clippy::cast_possible_truncation)]
        let slot = nearest.item as usize;
        let point = self.points[slot];
        let mut best = (point, (point - query).norm_squared());

        for &fi in &self.incident[slot] {
            let [a, b, c] = self.mesh.faces[fi as usize].map(|i| self.mesh.vertices[i as usize].position);
            let candidate = Triangle::new(a, b, c).closest_point(query);
            let d = (candidate - query).norm_squared();
            if d < best.1 {
                best = (candidate, d);
            }
        }
        best
    }
}
