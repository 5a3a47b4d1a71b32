//! Topology-preserving edge-collapse decimation.
//!
//! Edges are collapsed cheapest-first by quadric error. A collapse is only
//! taken when it keeps the surface a manifold of the same topology:
//!
//! - the edge is interior (exactly two incident faces), so boundaries and
//!   non-manifold edges are never touched;
//! - the link condition holds: the endpoints share exactly the two opposite
//!   points of the edge's faces, so no hole or handle is pinched off;
//! - no surviving face flips or degenerates at the merged position.

// Mesh indices and counts don't overflow in practice
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use hashbrown::HashSet;
use nalgebra::{center, Point3};
use shape_types::{CorrespondenceGroup, Mesh, Vertex};
use tracing::{debug, info};

use crate::quadric::Quadric;

/// An edge collapse candidate in the priority queue.
#[derive(Debug, Clone)]
struct EdgeCollapse {
    keep: u32,
    remove: u32,
    /// Endpoint versions when the candidate was computed.
    stamp: (u32, u32),
    cost: f64,
    position: Point3<f64>,
}

impl PartialEq for EdgeCollapse {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EdgeCollapse {}

impl PartialOrd for EdgeCollapse {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EdgeCollapse {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap behaviour; ties broken by point IDs so the
        // collapse order is deterministic.
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.keep.cmp(&self.keep))
            .then_with(|| other.remove.cmp(&self.remove))
    }
}

/// Result of mesh decimation.
#[derive(Debug, Clone)]
pub struct DecimationResult {
    /// The decimated mesh.
    pub mesh: Mesh,
    /// Number of triangles in the input.
    pub original_triangles: usize,
    /// Number of triangles in the output.
    pub final_triangles: usize,
    /// Number of edge collapses performed.
    pub collapses_performed: usize,
    /// Number of candidate collapses refused to preserve topology.
    pub collapses_rejected: usize,
}

impl DecimationResult {
    fn unchanged(mesh: &Mesh) -> Self {
        Self {
            mesh: mesh.clone(),
            original_triangles: mesh.faces.len(),
            final_triangles: mesh.faces.len(),
            collapses_performed: 0,
            collapses_rejected: 0,
        }
    }

    /// Final over original triangle count.
    #[must_use]
    pub fn reduction_ratio(&self) -> f64 {
        if self.original_triangles == 0 {
            1.0
        } else {
            self.final_triangles as f64 / self.original_triangles as f64
        }
    }

    /// Check if any decimation occurred.
    #[must_use]
    pub const fn was_decimated(&self) -> bool {
        self.collapses_performed > 0
    }
}

impl std::fmt::Display for DecimationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Decimation: {} → {} triangles ({:.1}% reduction, {} collapses, {} refused)",
            self.original_triangles,
            self.final_triangles,
            (1.0 - self.reduction_ratio()) * 100.0,
            self.collapses_performed,
            self.collapses_rejected
        )
    }
}

/// Working state of an in-progress decimation.
struct Collapser {
    positions: Vec<Point3<f64>>,
    alive: Vec<bool>,
    version: Vec<u32>,
    quadrics: Vec<Quadric>,
    faces: Vec<[u32; 3]>,
    face_alive: Vec<bool>,
    vertex_faces: Vec<Vec<usize>>,
    active_faces: usize,
}

impl Collapser {
    fn new(mesh: &Mesh) -> Self {
        let positions: Vec<Point3<f64>> = mesh.positions().copied().collect();
        let mut quadrics = vec![Quadric::default(); positions.len()];
        let mut vertex_faces = vec![Vec::new(); positions.len()];
        for (fi, face) in mesh.faces.iter().enumerate() {
            let [a, b, c] = face.map(|i| positions[i as usize]);
            let cross = (b - a).cross(&(c - a));
            if let Some(normal) = cross.try_normalize(f64::EPSILON) {
                let q = Quadric::from_plane(&a, &normal, cross.norm() * 0.5);
                for &i in face {
                    quadrics[i as usize] += q;
                }
            }
            for &i in face {
                vertex_faces[i as usize].push(fi);
            }
        }
        Self {
            alive: vec![true; positions.len()],
            version: vec![0; positions.len()],
            positions,
            quadrics,
            faces: mesh.faces.clone(),
            face_alive: vec![true; mesh.faces.len()],
            vertex_faces,
            active_faces: mesh.faces.len(),
        }
    }

    fn faces_of(&self, v: u32) -> impl Iterator<Item = usize> + '_ {
        self.vertex_faces[v as usize]
            .iter()
            .copied()
            .filter(|&f| self.face_alive[f])
    }

    fn neighbors(&self, v: u32) -> Vec<u32> {
        let mut out: Vec<u32> = self
            .faces_of(v)
            .flat_map(|f| self.faces[f])
            .filter(|&n| n != v)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    fn candidate(&self, a: u32, b: u32) -> EdgeCollapse {
        let (keep, remove) = if a < b { (a, b) } else { (b, a) };
        let q = self.quadrics[keep as usize] + self.quadrics[remove as usize];
        let pk = self.positions[keep as usize];
        let pr = self.positions[remove as usize];
        let (position, cost) = q
            .optimal_point()
            .into_iter()
            .chain([pk, pr, center(&pk, &pr)])
            .map(|p| (p, q.evaluate(&p)))
            .min_by(|x, y| x.1.total_cmp(&y.1))
            .unwrap_or((pk, 0.0));
        EdgeCollapse {
            keep,
            remove,
            stamp: (self.version[keep as usize], self.version[remove as usize]),
            cost,
            position,
        }
    }

    fn is_current(&self, c: &EdgeCollapse) -> bool {
        self.alive[c.keep as usize]
            && self.alive[c.remove as usize]
            && c.stamp == (self.version[c.keep as usize], self.version[c.remove as usize])
    }

    fn preserves_topology(&self, c: &EdgeCollapse) -> bool {
        let (a, b) = (c.keep, c.remove);
        let shared: Vec<usize> = self
            .faces_of(a)
            .filter(|&f| self.faces[f].contains(&b))
            .collect();
        if shared.len() != 2 {
            return false;
        }
        let mut opposite: Vec<u32> = shared
            .iter()
            .flat_map(|&f| self.faces[f])
            .filter(|&v| v != a && v != b)
            .collect();
        opposite.sort_unstable();
        opposite.dedup();

        let na = self.neighbors(a);
        let nb = self.neighbors(b);
        let common: Vec<u32> = na
            .iter()
            .copied()
            .filter(|v| *v != b && nb.binary_search(v).is_ok())
            .collect();
        if common != opposite || opposite.len() != 2 {
            return false;
        }
        // A tetrahedron has nothing left to give
        if na.len() + nb.len() - common.len() - 2 < 3 {
            return false;
        }

        self.faces_of(a)
            .chain(self.faces_of(b))
            .filter(|f| !shared.contains(f))
            .all(|f| {
                let corners = self.faces[f].map(|i| self.positions[i as usize]);
                let moved = self.faces[f].map(|i| {
                    if i == a || i == b {
                        c.position
                    } else {
                        self.positions[i as usize]
                    }
                });
                let before = (corners[1] - corners[0]).cross(&(corners[2] - corners[0]));
                let after = (moved[1] - moved[0]).cross(&(moved[2] - moved[0]));
                after.norm() > 1e-12 * before.norm().max(f64::MIN_POSITIVE)
                    && before.dot(&after) > 0.0
            })
    }

    fn collapse(&mut self, c: &EdgeCollapse) {
        let (a, b) = (c.keep, c.remove);
        self.positions[a as usize] = c.position;
        let moved = std::mem::take(&mut self.vertex_faces[b as usize]);
        for f in moved {
            if !self.face_alive[f] {
                continue;
            }
            if self.faces[f].contains(&a) {
                self.face_alive[f] = false;
                self.active_faces -= 1;
            } else {
                for i in &mut self.faces[f] {
                    if *i == b {
                        *i = a;
                    }
                }
                self.vertex_faces[a as usize].push(f);
            }
        }
        let face_alive = &self.face_alive;
        self.vertex_faces[a as usize].retain(|&f| face_alive[f]);
        self.alive[b as usize] = false;
        let qb = self.quadrics[b as usize];
        self.quadrics[a as usize] += qb;
        self.version[a as usize] += 1;
        self.version[b as usize] += 1;
    }

    fn into_mesh(self) -> Mesh {
        let mut remap = vec![u32::MAX; self.positions.len()];
        let mut mesh = Mesh::with_capacity(self.positions.len(), self.active_faces);
        for (i, p) in self.positions.iter().enumerate() {
            if self.alive[i] {
                remap[i] = mesh.vertices.len() as u32;
                mesh.vertices.push(Vertex::new(*p));
            }
        }
        mesh.faces = self
            .faces
            .iter()
            .zip(&self.face_alive)
            .filter(|&(_, &alive)| alive)
            .map(|(f, _)| f.map(|i| remap[i as usize]))
            .collect();
        mesh
    }
}

/// Remove about `reduction_ratio` of the triangles by edge collapse.
///
/// Ratios outside `(0, 1)` return the mesh unchanged. The point count never
/// increases and the surface keeps its topology, so the achieved reduction
/// may fall short of the request. Normals are dropped; recompute them
/// afterwards. Any collapse renumbers points, which resets the
/// correspondence group.
///
/// # Example
///
/// ```
/// use shape_process::decimate;
/// use shape_types::unit_cube;
///
/// let result = decimate(&unit_cube(), 1.5);
/// assert!(!result.was_decimated());
/// println!("{result}");
/// ```
#[must_use]
pub fn decimate(mesh: &Mesh, reduction_ratio: f64) -> DecimationResult {
    let original_triangles = mesh.faces.len();
    if !(reduction_ratio > 0.0 && reduction_ratio < 1.0) || original_triangles == 0 {
        return DecimationResult::unchanged(mesh);
    }

    let target = ((original_triangles as f64) * (1.0 - reduction_ratio)).round() as usize;
    info!(
        original = original_triangles,
        target, "Starting mesh decimation"
    );

    let mut state = Collapser::new(mesh);
    let mut heap = BinaryHeap::new();
    let mut seen_edges = HashSet::new();
    for face in &mesh.faces {
        for k in 0..3 {
            let (a, b) = (face[k], face[(k + 1) % 3]);
            if seen_edges.insert((a.min(b), a.max(b))) {
                heap.push(state.candidate(a, b));
            }
        }
    }

    let mut collapses_performed = 0;
    let mut collapses_rejected = 0;
    while state.active_faces > target {
        let Some(collapse) = heap.pop() else {
            break;
        };
        if !state.is_current(&collapse) {
            continue;
        }
        if !state.preserves_topology(&collapse) {
            collapses_rejected += 1;
            continue;
        }
        state.collapse(&collapse);
        collapses_performed += 1;

        let keep = collapse.keep;
        for n in state.neighbors(keep) {
            heap.push(state.candidate(keep, n));
        }
    }

    let final_triangles = state.active_faces;
    let mut out = state.into_mesh();
    out.group = if collapses_performed == 0 {
        mesh.group
    } else {
        CorrespondenceGroup::Unassigned
    };

    debug!(collapses_rejected, "Decimation refusals");
    info!(
        final_triangles,
        collapses = collapses_performed,
        "Decimation complete"
    );

    DecimationResult {
        mesh: out,
        original_triangles,
        final_triangles,
        collapses_performed,
        collapses_rejected,
    }
}
