//! Parameters for the surface processing chain.

use crate::error::{ProcessError, ProcessResult};

/// Parameters for [`process`](crate::process).
///
/// Defaults match the training-data generator: ten smoothing passes at a
/// relaxation factor of 0.4, no decimation and exact-coincidence welding.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ProcessParams {
    /// Laplacian smoothing iterations. `0` disables smoothing. Default: 10
    pub smoothing_iterations: u32,

    /// Fraction of the way each point moves toward its neighbour centroid per
    /// iteration, in `[0, 1]`. Default: 0.4
    pub relaxation_factor: f64,

    /// Fraction of triangles to remove. Values outside `(0, 1)` disable
    /// decimation. Default: 0.0
    pub decimation_ratio: f64,

    /// Distance below which points are welded. `0` merges only exactly
    /// coincident points. Default: 0.0
    pub weld_tolerance: f64,
}

impl Default for ProcessParams {
    fn default() -> Self {
        Self {
            smoothing_iterations: 10,
            relaxation_factor: 0.4,
            decimation_ratio: 0.0,
            weld_tolerance: 0.0,
        }
    }
}

impl ProcessParams {
    /// Parameters that only compute normals and weld.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            smoothing_iterations: 0,
            ..Default::default()
        }
    }

    /// Set the smoothing iteration count and relaxation factor.
    #[must_use]
    pub const fn with_smoothing(mut self, iterations: u32, relaxation_factor: f64) -> Self {
        self.smoothing_iterations = iterations;
        self.relaxation_factor = relaxation_factor;
        self
    }

    /// Set the decimation ratio.
    #[must_use]
    pub const fn with_decimation(mut self, ratio: f64) -> Self {
        self.decimation_ratio = ratio;
        self
    }

    /// Set the weld tolerance.
    #[must_use]
    pub const fn with_weld_tolerance(mut self, tolerance: f64) -> Self {
        self.weld_tolerance = tolerance;
        self
    }

    /// Whether the decimation step will run.
    #[must_use]
    pub fn decimates(&self) -> bool {
        self.decimation_ratio > 0.0 && self.decimation_ratio < 1.0
    }

    /// Check that every parameter is usable.
    ///
    /// # Errors
    ///
    /// Returns the first invalid parameter found.
    pub fn validate(&self) -> ProcessResult<()> {
        if !(0.0..=1.0).contains(&self.relaxation_factor) {
            return Err(ProcessError::InvalidRelaxation(self.relaxation_factor));
        }
        if !self.weld_tolerance.is_finite() || self.weld_tolerance < 0.0 {
            return Err(ProcessError::InvalidTolerance(self.weld_tolerance));
        }
        if !self.decimation_ratio.is_finite() {
            return Err(ProcessError::InvalidRatio(self.decimation_ratio));
        }
        Ok(())
    }
}
