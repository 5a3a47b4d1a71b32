//! Error types for shape modelling.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for shape model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur while building or using a shape model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// No training meshes were given.
    #[error("at least one training mesh is required")]
    NoMeshes,

    /// A mesh does not have the point count the model requires.
    #[error("mesh {index} has {actual} points, expected {expected}")]
    CorrespondenceMismatch {
        /// Position of the offending mesh in the input.
        index: usize,
        /// Point count of the model.
        expected: usize,
        /// Point count of the offending mesh.
        actual: usize,
    },

    /// A mesh is tagged with a different correspondence group.
    #[error("mesh {index} belongs to correspondence group {actual}, expected {expected}")]
    GroupMismatch {
        /// Position of the offending mesh in the input.
        index: usize,
        /// Group of the model.
        expected: u64,
        /// Group of the offending mesh.
        actual: u64,
    },

    /// More modes were requested than the model retains.
    #[error("{requested} modes requested but the model retains {available}")]
    ModeCount {
        /// Number of modes asked for.
        requested: usize,
        /// Number of modes available.
        available: usize,
    },

    /// A parameter is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A coefficient table has no rows.
    #[error("coefficient table is empty")]
    EmptyTable,

    /// A coefficient table row has the wrong number of columns.
    #[error("coefficient row {row} has {actual} values, expected {expected}")]
    RaggedTable {
        /// Zero-based row index.
        row: usize,
        /// Column count of the first row.
        expected: usize,
        /// Column count of this row.
        actual: usize,
    },

    /// The filename list does not match the table rows.
    #[error("{filenames} filenames given for {rows} coefficient rows")]
    FilenameCount {
        /// Number of filenames.
        filenames: usize,
        /// Number of rows.
        rows: usize,
    },

    /// A coefficient file could not be parsed.
    #[error("{path}:{line}: {message}")]
    Parse {
        /// File being read.
        path: PathBuf,
        /// One-based line number.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// A singular value decomposition did not produce the needed factors.
    #[error("singular value decomposition failed")]
    SvdFailed,

    /// I/O error from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
