//! Animation sweeps along a single shape mode.

use shape_types::Mesh;
use tracing::debug;

use crate::error::{ModelError, ModelResult};
use crate::interpolate::linspace;
use crate::model::ShapeModel;

/// Coefficient values for one animation loop: `0 → −range`, `−range →
/// range`, then `range → 0`, each leg `steps` values long.
///
/// # Example
///
/// ```
/// use shape_model::sweep_values;
///
/// assert_eq!(
///     sweep_values(2.0, 3),
///     vec![0.0, -1.0, -2.0, -2.0, 0.0, 2.0, 2.0, 1.0, 0.0]
/// );
/// ```
#[must_use]
pub fn sweep_values(range: f64, steps: usize) -> Vec<f64> {
    let mut values = linspace(0.0, -range, steps);
    values.extend(linspace(-range, range, steps));
    values.extend(linspace(range, 0.0, steps));
    values
}

/// Shapes of one animation loop along `mode`, all other modes at zero.
///
/// # Errors
///
/// Returns [`ModelError::ModeCount`] if `mode` is not an active mode of
/// the model, and [`ModelError::InvalidParameter`] for a non-finite range.
pub fn mode_sweep(model: &ShapeModel, mode: usize, range: f64, steps: usize) -> ModelResult<Vec<Mesh>> {
    if !range.is_finite() {
        return Err(ModelError::InvalidParameter(format!("sweep range must be finite, got {range}")));
    }
    if mode >= model.num_modes() {
        return Err(ModelError::ModeCount {
            requested: mode + 1,
            available: model.num_modes(),
        });
    }
    let mut coefficients = vec![0.0; mode + 1];
    let shapes = sweep_values(range, steps)
        .into_iter()
        .map(|value| {
            coefficients[mode] = value;
            model.parameterize(&coefficients)
        })
        .collect::<ModelResult<Vec<_>>>()?;
    debug!(mode, range, frames = shapes.len(), "Generated mode sweep");
    Ok(shapes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::ModelParams;
    use shape_types::unit_cube;

    fn two_cube_model() -> ShapeModel {
        let small = unit_cube();
        let mut large = unit_cube();
        large.map_positions(|p| *p * 3.0);
        ShapeModel::build(&[small, large], &ModelParams::default()).unwrap()
    }

    #[test]
    fn loop_starts_and_ends_at_mean() {
        let model = two_cube_model();
        let frames = mode_sweep(&model, 0, 1.5, 4).unwrap();
        assert_eq!(frames.len(), 12);
        let mean = model.mean_shape();
        for frame in [&frames[0], &frames[11]] {
            for (a, b) in frame.vertices.iter().zip(&mean.vertices) {
                assert!((a.position - b.position).norm() < 1e-12);
            }
        }
        assert_eq!(frames[5].faces, mean.faces);
    }

    #[test]
    fn inactive_mode_rejected() {
        let model = two_cube_model();
        assert!(matches!(
            mode_sweep(&model, 1, 1.0, 3),
            Err(ModelError::ModeCount { requested: 2, available: 1 })
        ));
        assert!(matches!(
            mode_sweep(&model, 0, f64::INFINITY, 3),
            Err(ModelError::InvalidParameter(_))
        ));
    }
}
