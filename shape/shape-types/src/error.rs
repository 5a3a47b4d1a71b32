//! Error types for core shape types.

use thiserror::Error;

/// Errors raised when constructing or validating core types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypesError {
    /// A face references a vertex that does not exist.
    #[error("face {face} references vertex {index}, but the mesh has {vertex_count} vertices")]
    InvalidFaceIndex {
        /// Index of the offending face.
        face: usize,
        /// The out-of-range vertex index.
        index: u32,
        /// Number of vertices in the mesh.
        vertex_count: usize,
    },

    /// Volume voxel data does not match the declared dimensions.
    #[error("volume of {dims:?} needs {expected} voxels, got {actual}")]
    VolumeSizeMismatch {
        /// Declared dimensions.
        dims: [usize; 3],
        /// Product of the dimensions.
        expected: usize,
        /// Length of the supplied data.
        actual: usize,
    },

    /// Voxel spacing must be finite and strictly positive on every axis.
    #[error("invalid voxel spacing ({x}, {y}, {z})")]
    InvalidSpacing {
        /// Spacing along x.
        x: f64,
        /// Spacing along y.
        y: f64,
        /// Spacing along z.
        z: f64,
    },

    /// Axis index outside 0..3.
    #[error("invalid axis {0}, expected 0, 1 or 2")]
    InvalidAxis(usize),
}

/// Result type for core type operations.
pub type TypesResult<T> = Result<T, TypesError>;
