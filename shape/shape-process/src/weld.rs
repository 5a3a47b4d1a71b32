//! Point welding and degenerate-face removal.

// Mesh indices don't overflow in practice
#![allow(clippy::cast_possible_truncation)]

use hashbrown::HashMap;
use nalgebra::Point3;
use shape_types::{CorrespondenceGroup, Mesh, Vertex};
use tracing::debug;

/// Result of welding a mesh.
#[derive(Debug, Clone)]
pub struct WeldResult {
    /// The welded mesh.
    pub mesh: Mesh,
    /// Points merged into an earlier coincident point.
    pub points_merged: usize,
    /// Points dropped because no face referenced them.
    pub points_unreferenced: usize,
    /// Faces removed because two or more corners coincided.
    pub faces_removed: usize,
}

impl WeldResult {
    /// Whether point IDs survived unchanged.
    #[must_use]
    pub const fn preserved_point_ids(&self) -> bool {
        self.points_merged == 0 && self.points_unreferenced == 0
    }
}

impl std::fmt::Display for WeldResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Weld: {} merged, {} unreferenced, {} degenerate faces removed",
            self.points_merged, self.points_unreferenced, self.faces_removed
        )
    }
}

/// Merge coincident points and drop the triangles this makes degenerate.
///
/// Points closer than `tolerance` are merged into the earliest one; with a
/// tolerance of `0` only exactly equal coordinates merge. Surviving points
/// keep their relative order. When the mesh has faces, points no face uses
/// are removed. Face-less point sets keep every point.
///
/// If any point is removed or renumbered, the output's correspondence group
/// is reset to [`CorrespondenceGroup::Unassigned`]; otherwise it is kept.
#[must_use]
pub fn weld(mesh: &Mesh, tolerance: f64) -> WeldResult {
    let (remap, points_merged) = if tolerance > 0.0 {
        merge_within(&mesh.vertices, tolerance)
    } else {
        merge_exact(&mesh.vertices)
    };

    let original_faces = mesh.faces.len();
    let faces: Vec<[u32; 3]> = mesh
        .faces
        .iter()
        .map(|f| f.map(|i| remap[i as usize]))
        .filter(|&[a, b, c]| a != b && b != c && a != c)
        .collect();
    let faces_removed = original_faces - faces.len();

    // Keep a point if it is its own representative and, for meshes with
    // faces, something still uses it.
    let mut used = vec![faces.is_empty() && original_faces == 0; mesh.vertices.len()];
    for face in &faces {
        for &i in face {
            used[i as usize] = true;
        }
    }
    let points_unreferenced = remap
        .iter()
        .enumerate()
        .filter(|&(i, &r)| r as usize == i && !used[i])
        .count();

    let mut compact = vec![u32::MAX; mesh.vertices.len()];
    let mut out = Mesh::with_capacity(mesh.vertices.len() - points_merged, faces.len());
    for (i, vertex) in mesh.vertices.iter().enumerate() {
        if remap[i] as usize == i && used[i] {
            compact[i] = out.vertices.len() as u32;
            out.vertices.push(vertex.clone());
        }
    }
    out.faces = faces
        .into_iter()
        .map(|f| f.map(|i| compact[i as usize]))
        .collect();

    let mut result = WeldResult {
        mesh: out,
        points_merged,
        points_unreferenced,
        faces_removed,
    };
    result.mesh.group = if result.preserved_point_ids() {
        mesh.group
    } else {
        CorrespondenceGroup::Unassigned
    };

    if !result.preserved_point_ids() || faces_removed > 0 {
        debug!(
            merged = points_merged,
            unreferenced = points_unreferenced,
            faces_removed,
            "Welded mesh"
        );
    }
    result
}

fn merge_exact(vertices: &[Vertex]) -> (Vec<u32>, usize) {
    let mut first: HashMap<[u64; 3], u32> = HashMap::with_capacity(vertices.len());
    let mut merged = 0;
    let remap = vertices
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let p = v.position;
            // -0.0 and 0.0 are the same point
            let key = [p.x + 0.0, p.y + 0.0, p.z + 0.0].map(f64::to_bits);
            let rep = *first.entry(key).or_insert(i as u32);
            if rep != i as u32 {
                merged += 1;
            }
            rep
        })
        .collect();
    (remap, merged)
}

/// Spatial-hash welding with cells of twice the tolerance.
fn merge_within(vertices: &[Vertex], tolerance: f64) -> (Vec<u32>, usize) {
    let cell_size = tolerance * 2.0;
    let mut grid: HashMap<(i64, i64, i64), Vec<u32>> = HashMap::new();
    for (i, v) in vertices.iter().enumerate() {
        grid.entry(cell_of(&v.position, cell_size))
            .or_default()
            .push(i as u32);
    }

    let mut remap: Vec<u32> = (0..vertices.len() as u32).collect();
    let mut merged = 0;
    for (i, v) in vertices.iter().enumerate() {
        let i = i as u32;
        if remap[i as usize] != i {
            continue;
        }
        let (cx, cy, cz) = cell_of(&v.position, cell_size);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(candidates) = grid.get(&(cx + dx, cy + dy, cz + dz)) else {
                        continue;
                    };
                    for &j in candidates {
                        if j <= i || remap[j as usize] != j {
                            continue;
                        }
                        if (vertices[j as usize].position - v.position).norm() < tolerance {
                            remap[j as usize] = i;
                            merged += 1;
                        }
                    }
                }
            }
        }
    }
    (remap, merged)
}

#[allow(clippy::cast_possible_truncation)]
fn cell_of(p: &Point3<f64>, cell_size: f64) -> (i64, i64, i64) {
    (
        (p.x / cell_size).floor() as i64,
        (p.y / cell_size).floor() as i64,
        (p.z / cell_size).floor() as i64,
    )
}
