//! Core types for bone shape modelling.
//!
//! This crate provides the foundational types shared by every stage of the
//! training-data and shape-model pipelines:
//!
//! - [`Vertex`] - A point in 3D space with an optional normal
//! - [`Mesh`] - A triangle mesh with indexed vertices and a correspondence tag
//! - [`CorrespondenceGroup`] - Identifies meshes whose point IDs match anatomically
//! - [`Triangle`] - A concrete triangle with vertex positions
//! - [`Aabb`] - Axis-aligned bounding box
//! - [`LabelVolume`] - An immutable 3D integer label image with spacing and origin
//!
//! # Point Correspondence
//!
//! A statistical shape model only makes sense when point `i` of every
//! training mesh refers to the same anatomical location. [`Mesh`] carries a
//! [`CorrespondenceGroup`] so that this property is explicit: operations that
//! only move points keep the tag, operations that renumber points reset it to
//! [`CorrespondenceGroup::Unassigned`].
//!
//! # Coordinate System
//!
//! Right-handed, unit-agnostic `f64` coordinates. Volumes map voxel `(i, j, k)`
//! to `origin + (i * sx, j * sy, k * sz)`.
//!
//! Face winding is **counter-clockwise (CCW) when viewed from outside**.
//!
//! # Example
//!
//! ```
//! use shape_types::{Mesh, Vertex, MeshTopology, CorrespondenceGroup};
//!
//! let mut mesh = Mesh::new();
//! mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
//! mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
//! mesh.vertices.push(Vertex::from_coords(0.5, 1.0, 0.0));
//! mesh.faces.push([0, 1, 2]);
//!
//! let tagged = mesh.with_group(CorrespondenceGroup::fresh());
//! assert_eq!(tagged.face_count(), 1);
//! assert!(tagged.group.is_assigned());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod bounds;
mod correspondence;
mod error;
mod mesh;
mod traits;
mod triangle;
mod vertex;
mod volume;

pub use bounds::Aabb;
pub use correspondence::CorrespondenceGroup;
pub use error::{TypesError, TypesResult};
pub use mesh::{unit_cube, Mesh};
pub use traits::{MeshBounds, MeshTopology};
pub use triangle::Triangle;
pub use vertex::Vertex;
pub use volume::LabelVolume;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point3, Vector3};
