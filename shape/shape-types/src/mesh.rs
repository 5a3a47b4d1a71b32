//! Indexed triangle mesh with a correspondence tag.

use crate::{Aabb, CorrespondenceGroup, MeshBounds, MeshTopology, Triangle, TypesError, TypesResult, Vertex};
use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An indexed triangle mesh.
///
/// Point IDs are vertex indices. Once a mesh feeds a shape model, its point
/// IDs are anatomical correspondence indices and must not be reordered; the
/// [`group`](Self::group) tag records which meshes share such a numbering.
///
/// Methods that only move points ([`translate`](Self::translate),
/// [`map_positions`](Self::map_positions)) keep the tag. Methods that change
/// the point numbering ([`merge`](Self::merge), [`combine`](Self::combine))
/// reset it to [`CorrespondenceGroup::Unassigned`].
///
/// # Example
///
/// ```
/// use shape_types::{Mesh, Vertex, MeshTopology};
///
/// let mut mesh = Mesh::new();
/// mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
/// mesh.faces.push([0, 1, 2]);
///
/// assert_eq!(mesh.vertex_count(), 3);
/// assert!(mesh.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Mesh {
    /// Vertex data; index is the point ID.
    pub vertices: Vec<Vertex>,

    /// Triangle faces as indices into the vertex array, CCW from outside.
    pub faces: Vec<[u32; 3]>,

    /// Correspondence family this mesh belongs to.
    pub group: CorrespondenceGroup,
}

impl Mesh {
    /// Create an empty, unassigned mesh.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
            group: CorrespondenceGroup::Unassigned,
        }
    }

    /// Create an empty mesh with pre-allocated capacity.
    #[inline]
    #[must_use]
    pub fn with_capacity(vertex_count: usize, face_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            faces: Vec::with_capacity(face_count),
            group: CorrespondenceGroup::Unassigned,
        }
    }

    /// Create a mesh from vertices and faces.
    #[inline]
    #[must_use]
    pub const fn from_parts(vertices: Vec<Vertex>, faces: Vec<[u32; 3]>) -> Self {
        Self {
            vertices,
            faces,
            group: CorrespondenceGroup::Unassigned,
        }
    }

    /// Create a face-less point set.
    ///
    /// ```
    /// use shape_types::{Mesh, Point3};
    ///
    /// let cloud = Mesh::from_points([Point3::origin(), Point3::new(1.0, 0.0, 0.0)]);
    /// assert_eq!(cloud.vertices.len(), 2);
    /// assert!(cloud.faces.is_empty());
    /// ```
    #[must_use]
    pub fn from_points(points: impl IntoIterator<Item = Point3<f64>>) -> Self {
        Self::from_parts(points.into_iter().map(Vertex::new).collect(), Vec::new())
    }

    /// Tag the mesh with a correspondence group.
    #[inline]
    #[must_use]
    pub fn with_group(mut self, group: CorrespondenceGroup) -> Self {
        self.group = group;
        self
    }

    /// Iterate over vertex positions in point-ID order.
    pub fn positions(&self) -> impl Iterator<Item = &Point3<f64>> + '_ {
        self.vertices.iter().map(|v| &v.position)
    }

    /// Mean of all vertex positions, `None` when there are no vertices.
    #[must_use]
    pub fn centroid(&self) -> Option<Point3<f64>> {
        if self.vertices.is_empty() {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        // Precision: vertex counts far below 2^52
        let n = self.vertices.len() as f64;
        let sum = self
            .vertices
            .iter()
            .fold(Vector3::zeros(), |acc, v| acc + v.position.coords);
        Some(Point3::from(sum / n))
    }

    /// Check that every face index is a valid point ID.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::InvalidFaceIndex`] for the first offending face.
    pub fn validate(&self) -> TypesResult<()> {
        let vertex_count = self.vertices.len();
        for (face, tri) in self.faces.iter().enumerate() {
            for &index in tri {
                if index as usize >= vertex_count {
                    return Err(TypesError::InvalidFaceIndex {
                        face,
                        index,
                        vertex_count,
                    });
                }
            }
        }
        Ok(())
    }

    /// Whether every vertex carries a normal.
    #[must_use]
    pub fn has_normals(&self) -> bool {
        !self.vertices.is_empty() && self.vertices.iter().all(|v| v.normal.is_some())
    }

    /// Translate all points. Keeps the correspondence tag.
    pub fn translate(&mut self, offset: Vector3<f64>) {
        for vertex in &mut self.vertices {
            vertex.position += offset;
        }
    }

    /// Replace every position with `f(position)`. Keeps faces and the
    /// correspondence tag, and clears normals since they are now stale.
    pub fn map_positions(&mut self, mut f: impl FnMut(&Point3<f64>) -> Point3<f64>) {
        for vertex in &mut self.vertices {
            vertex.position = f(&vertex.position);
            vertex.normal = None;
        }
    }

    /// Signed volume via the divergence theorem.
    ///
    /// Positive for a closed mesh whose faces wind counter-clockwise when
    /// viewed from outside.
    #[must_use]
    pub fn signed_volume(&self) -> f64 {
        let volume: f64 = self
            .triangles()
            .map(|t| t.v0.coords.dot(&t.v1.coords.cross(&t.v2.coords)))
            .sum();
        volume / 6.0
    }

    /// Total surface area.
    #[must_use]
    pub fn surface_area(&self) -> f64 {
        self.triangles().map(|tri| tri.area()).sum()
    }

    /// Reverse the winding of every face and negate normals.
    pub fn flip_normals(&mut self) {
        for face in &mut self.faces {
            face.swap(1, 2);
        }
        for vertex in &mut self.vertices {
            if let Some(ref mut normal) = vertex.normal {
                *normal = -*normal;
            }
        }
    }

    /// Drop all vertex normals.
    pub fn clear_normals(&mut self) {
        for vertex in &mut self.vertices {
            vertex.normal = None;
        }
    }

    /// Append another mesh, offsetting its face indices.
    ///
    /// The result has a new point numbering, so the tag is reset.
    #[allow(clippy::cast_possible_truncation)]
    // Truncation: mesh indices are u32, so vertex counts > 4B are unsupported
    pub fn merge(&mut self, other: &Self) {
        let vertex_offset = self.vertices.len() as u32;

        self.vertices.extend(other.vertices.iter().copied());
        self.faces.extend(
            other
                .faces
                .iter()
                .map(|f| [f[0] + vertex_offset, f[1] + vertex_offset, f[2] + vertex_offset]),
        );
        self.group = CorrespondenceGroup::Unassigned;
    }

    /// Concatenate meshes in order into one mesh.
    ///
    /// ```
    /// use shape_types::{unit_cube, Mesh, MeshTopology};
    ///
    /// let parts = [unit_cube(), unit_cube()];
    /// let combined = Mesh::combine(parts.iter());
    /// assert_eq!(combined.vertex_count(), 16);
    /// assert_eq!(combined.faces[12], [8, 10, 9]);
    /// ```
    #[must_use]
    pub fn combine<'a>(meshes: impl IntoIterator<Item = &'a Self>) -> Self {
        let mut combined = Self::new();
        for mesh in meshes {
            combined.merge(mesh);
        }
        combined
    }
}

impl MeshTopology for Mesh {
    #[inline]
    fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    fn face_count(&self) -> usize {
        self.faces.len()
    }

    fn triangle(&self, face_index: usize) -> Option<Triangle> {
        let [i0, i1, i2] = *self.faces.get(face_index)?;
        Some(Triangle {
            v0: self.vertices.get(i0 as usize)?.position,
            v1: self.vertices.get(i1 as usize)?.position,
            v2: self.vertices.get(i2 as usize)?.position,
        })
    }

    fn triangles(&self) -> impl Iterator<Item = Triangle> {
        self.faces.iter().map(|&[i0, i1, i2]| Triangle {
            v0: self.vertices[i0 as usize].position,
            v1: self.vertices[i1 as usize].position,
            v2: self.vertices[i2 as usize].position,
        })
    }
}

impl MeshBounds for Mesh {
    fn bounds(&self) -> Aabb {
        Aabb::from_points(self.positions())
    }
}

/// A cube from (0,0,0) to (1,1,1) with outward-facing winding.
///
/// ```
/// use shape_types::{unit_cube, MeshTopology};
///
/// let cube = unit_cube();
/// assert_eq!(cube.vertex_count(), 8);
/// assert_eq!(cube.face_count(), 12);
/// ```
#[must_use]
pub fn unit_cube() -> Mesh {
    let vertices = vec![
        Vertex::from_coords(0.0, 0.0, 0.0),
        Vertex::from_coords(1.0, 0.0, 0.0),
        Vertex::from_coords(1.0, 1.0, 0.0),
        Vertex::from_coords(0.0, 1.0, 0.0),
        Vertex::from_coords(0.0, 0.0, 1.0),
        Vertex::from_coords(1.0, 0.0, 1.0),
        Vertex::from_coords(1.0, 1.0, 1.0),
        Vertex::from_coords(0.0, 1.0, 1.0),
    ];
    let faces = vec![
        // -Z
        [0, 2, 1],
        [0, 3, 2],
        // +Z
        [4, 5, 6],
        [4, 6, 7],
        // -Y
        [0, 1, 5],
        [0, 5, 4],
        // +Y
        [3, 7, 6],
        [3, 6, 2],
        // -X
        [0, 4, 7],
        [0, 7, 3],
        // +X
        [1, 2, 6],
        [1, 6, 5],
    ];
    Mesh::from_parts(vertices, faces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn empty_mesh() {
        let mesh = Mesh::new();
        assert!(mesh.is_empty());
        assert!(mesh.centroid().is_none());
        assert!(mesh.bounds().is_empty());
        assert!(!mesh.has_normals());
    }

    #[test]
    fn unit_cube_volume_and_area() {
        let cube = unit_cube();
        assert_relative_eq!(cube.signed_volume(), 1.0, epsilon = 1e-10);
        assert_relative_eq!(cube.surface_area(), 6.0, epsilon = 1e-10);
    }

    #[test]
    fn flipped_cube_has_negative_volume() {
        let mut cube = unit_cube();
        cube.flip_normals();
        assert!(cube.signed_volume() < 0.0);
    }

    #[test]
    fn centroid_of_cube() {
        let c = unit_cube().centroid();
        assert_eq!(c, Some(Point3::new(0.5, 0.5, 0.5)));
    }

    #[test]
    fn validate_rejects_bad_index() {
        let mut mesh = unit_cube();
        mesh.faces.push([0, 1, 8]);
        let err = mesh.validate();
        assert_eq!(
            err,
            Err(TypesError::InvalidFaceIndex {
                face: 12,
                index: 8,
                vertex_count: 8
            })
        );
    }

    #[test]
    fn translate_keeps_group() {
        let group = CorrespondenceGroup::fresh();
        let mut mesh = unit_cube().with_group(group);
        mesh.translate(Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(mesh.group, group);
        assert_eq!(mesh.vertices[0].position, Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn map_positions_clears_normals_and_keeps_group() {
        let group = CorrespondenceGroup::fresh();
        let mut mesh = unit_cube().with_group(group);
        for v in &mut mesh.vertices {
            v.normal = Some(Vector3::z());
        }
        mesh.map_positions(|p| p * 2.0);
        assert_eq!(mesh.group, group);
        assert!(mesh.vertices.iter().all(|v| v.normal.is_none()));
        assert_relative_eq!(mesh.signed_volume(), 8.0, epsilon = 1e-10);
    }

    #[test]
    fn merge_offsets_indices_and_resets_group() {
        let group = CorrespondenceGroup::fresh();
        let mut a = Mesh::from_parts(
            vec![
                Vertex::from_coords(0.0, 0.0, 0.0),
                Vertex::from_coords(1.0, 0.0, 0.0),
                Vertex::from_coords(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        )
        .with_group(group);
        let b = a.clone();
        a.merge(&b);
        assert_eq!(a.vertex_count(), 6);
        assert_eq!(a.faces[1], [3, 4, 5]);
        assert_eq!(a.group, CorrespondenceGroup::Unassigned);
    }

    #[test]
    fn triangle_out_of_range() {
        let cube = unit_cube();
        assert!(cube.triangle(11).is_some());
        assert!(cube.triangle(12).is_none());
    }
}
