//! Error types for surface extraction.

use thiserror::Error;

/// Result type for extraction operations.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Errors that can occur while extracting a label surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// No voxel carries the requested label.
    #[error("label {label} is not present in the volume")]
    EmptyRegion {
        /// The requested label.
        label: i32,
    },

    /// The surface needs more points than a mesh index can address.
    #[error("surface for label {label} has too many points ({count})")]
    TooManyVertices {
        /// The requested label.
        label: i32,
        /// Number of surface points required.
        count: usize,
    },
}
