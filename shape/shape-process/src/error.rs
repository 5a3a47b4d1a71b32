//! Error types for mesh processing.

use thiserror::Error;

/// Result type for mesh processing operations.
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Invalid processing parameters.
///
/// The operations themselves never fail; only parameter validation does.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProcessError {
    /// Relaxation factor outside `[0, 1]`.
    #[error("relaxation factor {0} must be within [0, 1]")]
    InvalidRelaxation(f64),

    /// Negative or non-finite weld tolerance.
    #[error("weld tolerance {0} must be finite and non-negative")]
    InvalidTolerance(f64),

    /// Decimation ratio that is not a finite number.
    #[error("decimation ratio {0} must be finite")]
    InvalidRatio(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProcessError::InvalidRelaxation(1.5);
        assert!(format!("{err}").contains("1.5"));
    }
}
