//! Error types for registration.

use thiserror::Error;

/// Errors that can occur during registration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistrationError {
    /// Source mesh has no points.
    #[error("source mesh has no points")]
    EmptySourceMesh,

    /// Target mesh has no points.
    #[error("target mesh has no points")]
    EmptyTargetMesh,

    /// Too few points, or points spanning less than three dimensions, to
    /// determine a transform.
    #[error("insufficient geometry ({points} points): {reason}")]
    InsufficientGeometry {
        /// Number of points examined.
        points: usize,
        /// What made the configuration degenerate.
        reason: String,
    },

    /// Paired point sets have different lengths.
    #[error("point sets must have equal length: {source_len} vs {target_len}")]
    LengthMismatch {
        /// Source point count.
        source_len: usize,
        /// Target point count.
        target_len: usize,
    },

    /// SVD computation failed during transform estimation.
    #[error("SVD computation failed during transform estimation")]
    SvdFailed,

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Result type for registration operations.
pub type RegistrationResult<T> = Result<T, RegistrationError>;
