//! Statistical shape modelling for bones in point correspondence.
//!
//! Given training meshes whose point `i` always marks the same anatomical
//! location, this crate builds a linear model of their shape variation and
//! works with its coefficients:
//!
//! - [`ShapeModel`] - PCA over flattened point coordinates
//! - [`ShapeModel::parameterize`] - Shape from coefficients
//! - [`ShapeModel::fit`] - Coefficients of a shape (orthogonal projection)
//! - [`CoefficientTable`] - Fitted coefficients with text export
//! - [`CoefficientInterpolator`] - One polynomial per mode over a motion
//! - [`mode_sweep`] - Animation loop along a single mode
//!
//! # Example
//!
//! ```
//! use shape_model::{CoefficientInterpolator, ModelParams, ShapeModel};
//! use shape_types::unit_cube;
//!
//! // Three poses of a growing cube.
//! let poses: Vec<_> = [1.0, 1.5, 2.5]
//!     .iter()
//!     .map(|&s| {
//!         let mut cube = unit_cube();
//!         cube.map_positions(|p| *p * s);
//!         cube
//!     })
//!     .collect();
//!
//! let model = ShapeModel::build(&poses, &ModelParams::default()).unwrap();
//! let table = model.fit_all(&poses).unwrap();
//! assert_eq!(table.len(), 3);
//!
//! // Drive every mode from one position along the motion.
//! let curves = CoefficientInterpolator::fit(&table, 2).unwrap();
//! let shape = model.parameterize(&curves.evaluate(1.0)).unwrap();
//! assert!((shape.vertices[6].position.x - 2.5).abs() < 1e-9);
//! ```
//!
//! # Correspondence
//!
//! [`ShapeModel::build`] rejects meshes whose point counts differ, or whose
//! [`CorrespondenceGroup`](shape_types::CorrespondenceGroup) tags disagree,
//! before any decomposition runs.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod error;
mod interpolate;
mod model;
mod params;
mod sweep;
mod table;

pub use error::{ModelError, ModelResult};
pub use interpolate::{linspace, CoefficientInterpolator, Polynomial};
pub use model::ShapeModel;
pub use params::ModelParams;
pub use sweep::{mode_sweep, sweep_values};
pub use table::{CoefficientTable, COEFFICIENTS_FILE, FILENAMES_FILE};
