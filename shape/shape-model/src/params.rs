//! Shape model parameters.

use crate::error::{ModelError, ModelResult};

/// Parameters for [`ShapeModel::build`](crate::ShapeModel::build).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ModelParams {
    /// Fraction of total variance the active modes must explain, in
    /// `(0, 1]`. `1.0` keeps every retained mode. Default: 1.0
    pub variance_threshold: f64,

    /// Measure coefficients in standard deviations of each mode instead of
    /// raw displacement along the unit eigenvector. Default: false
    pub scale_by_std_dev: bool,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            variance_threshold: 1.0,
            scale_by_std_dev: false,
        }
    }
}

impl ModelParams {
    /// Set the variance fraction the active modes must explain.
    #[must_use]
    pub const fn with_variance_threshold(mut self, fraction: f64) -> Self {
        self.variance_threshold = fraction;
        self
    }

    /// Measure coefficients in standard deviations.
    #[must_use]
    pub const fn with_scale_by_std_dev(mut self, enabled: bool) -> Self {
        self.scale_by_std_dev = enabled;
        self
    }

    /// Check that every parameter is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidParameter`] if the variance threshold is
    /// outside `(0, 1]`.
    pub fn validate(&self) -> ModelResult<()> {
        if !(self.variance_threshold > 0.0 && self.variance_threshold <= 1.0) {
            return Err(ModelError::InvalidParameter(format!(
                "variance_threshold must be in (0, 1], got {}",
                self.variance_threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_every_mode() {
        let params = ModelParams::default();
        assert!((params.variance_threshold - 1.0).abs() < f64::EPSILON);
        assert!(!params.scale_by_std_dev);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn threshold_range() {
        for bad in [0.0, -0.5, 1.01, f64::NAN] {
            let params = ModelParams::default().with_variance_threshold(bad);
            assert!(matches!(params.validate(), Err(ModelError::InvalidParameter(_))));
        }
        assert!(ModelParams::default().with_variance_threshold(0.9).validate().is_ok());
    }
}
