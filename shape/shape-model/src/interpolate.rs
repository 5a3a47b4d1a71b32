//! Polynomial interpolation of fitted coefficients along a motion.
//!
//! Rows of a [`CoefficientTable`] are taken as samples of a motion at
//! positions spaced evenly over `[-1, 1]`. Each mode's coefficient gets its
//! own least-squares polynomial, so one scalar position drives all modes at
//! once.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::error::{ModelError, ModelResult};
use crate::table::CoefficientTable;

/// Singular values below this fraction of the largest are treated as zero
/// when solving the least-squares fit.
const SOLVE_EPSILON: f64 = 1e-12;

/// `count` evenly spaced values from `start` to `stop` inclusive.
///
/// A single value is `start`; zero values give an empty vector.
#[must_use]
pub fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            #[allow(clippy::cast_precision_loss)]
            let step = (stop - start) / (count - 1) as f64;
            #[allow(clippy::cast_precision_loss)]
            (0..count)
                .map(|i| if i == count - 1 { stop } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// A polynomial `Σ aᵢ xⁱ` with coefficients stored lowest power first.
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    coefficients: Vec<f64>,
}

impl Polynomial {
    /// Creates a polynomial from coefficients, lowest power first.
    #[must_use]
    pub const fn new(coefficients: Vec<f64>) -> Self {
        Self { coefficients }
    }

    /// Coefficients, lowest power first.
    #[must_use]
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Highest power, or 0 for an empty polynomial.
    #[must_use]
    pub fn degree(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }

    /// Evaluates the polynomial at `x` (Horner's scheme).
    #[must_use]
    pub fn evaluate(&self, x: f64) -> f64 {
        self.coefficients.iter().rev().fold(0.0, |acc, a| acc.mul_add(x, *a))
    }

    /// Least-squares fit of degree `order` through `(x, y)` samples.
    ///
    /// When there are no more samples than unknowns the minimum-norm exact
    /// fit is returned.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::EmptyTable`] without samples, and
    /// [`ModelError::SvdFailed`] if the solve fails.
    pub fn fit(x: &[f64], y: &[f64], order: usize) -> ModelResult<Self> {
        if x.is_empty() || x.len() != y.len() {
            return Err(ModelError::EmptyTable);
        }
        let vandermonde = DMatrix::from_fn(x.len(), order + 1, |r, c| {
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            x[r].powi(c as i32)
        });
        let rhs = DVector::from_column_slice(y);
        let svd = vandermonde.svd(true, true);
        let eps = SOLVE_EPSILON * svd.singular_values.max();
        let solution = svd.solve(&rhs, eps).map_err(|_| ModelError::SvdFailed)?;
        Ok(Self::new(solution.iter().copied().collect()))
    }
}

/// One polynomial per shape mode, fitted over a coefficient table.
///
/// # Example
///
/// ```
/// use shape_model::{CoefficientInterpolator, CoefficientTable};
///
/// // Two modes sampled at positions -1, 0, 1.
/// let table = CoefficientTable::new(vec![
///     vec![-2.0, 1.0],
///     vec![0.0, 0.0],
///     vec![2.0, 1.0],
/// ])
/// .unwrap();
///
/// let interpolator = CoefficientInterpolator::fit(&table, 2).unwrap();
/// let coeffs = interpolator.evaluate(0.5);
/// assert!((coeffs[0] - 1.0).abs() < 1e-9);
/// assert!((coeffs[1] - 0.25).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CoefficientInterpolator {
    polynomials: Vec<Polynomial>,
    order: usize,
}

impl CoefficientInterpolator {
    /// Fits a polynomial of degree `order` to each column of `table`
    /// against `linspace(-1, 1, rows)`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::EmptyTable`] for a table without rows.
    pub fn fit(table: &CoefficientTable, order: usize) -> ModelResult<Self> {
        if table.is_empty() {
            return Err(ModelError::EmptyTable);
        }
        let positions = linspace(-1.0, 1.0, table.len());
        let polynomials = (0..table.num_modes())
            .map(|mode| {
                let values = table.column(mode).unwrap_or_default();
                Polynomial::fit(&positions, &values, order)
            })
            .collect::<ModelResult<Vec<_>>>()?;
        debug!(rows = table.len(), modes = polynomials.len(), order, "Fitted coefficient curves");
        Ok(Self { polynomials, order })
    }

    /// Polynomial degree used for every mode.
    #[must_use]
    pub const fn order(&self) -> usize {
        self.order
    }

    /// The per-mode polynomials.
    #[must_use]
    pub fn polynomials(&self) -> &[Polynomial] {
        &self.polynomials
    }

    /// Coefficients of every mode at `position`.
    ///
    /// Positions outside `[-1, 1]` extrapolate; they are not clamped.
    #[must_use]
    pub fn evaluate(&self, position: f64) -> Vec<f64> {
        self.polynomials.iter().map(|p| p.evaluate(position)).collect()
    }
}
