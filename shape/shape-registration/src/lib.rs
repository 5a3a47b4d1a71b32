//! Surface registration for bone shape modelling.
//!
//! Brings one bone surface into alignment with another so that the moved
//! surface keeps its own point numbering. Registering a single reference
//! shape onto every subject is what puts training meshes into point
//! correspondence.
//!
//! - [`icp_align`] / [`align`] - Iterative Closest Point in three modes
//! - [`apply_transform_to_other`] - Carry a computed transform onto another mesh
//! - [`solve`] - Closed-form best fit for already paired points
//!
//! # Modes
//!
//! | [`IcpMode`]  | Linear part                        |
//! |--------------|------------------------------------|
//! | `Rigid`      | rotation, `det = +1`               |
//! | `Similarity` | rotation × one uniform scale       |
//! | `Affine`     | any invertible 3×3 matrix          |
//!
//! # Example
//!
//! ```
//! use shape_registration::{align, IcpParams, IcpMode};
//! use shape_types::unit_cube;
//! use nalgebra::Vector3;
//!
//! let source = unit_cube();
//! let mut target = unit_cube();
//! target.translate(Vector3::new(10.0, 0.0, 0.0));
//!
//! let params = IcpParams::default().with_mode(IcpMode::Similarity);
//! let (registered, result) = align(&source, &target, &params).unwrap();
//!
//! assert!(result.converged);
//! assert!((registered.vertices[0].position.x - 10.0).abs() < 1e-9);
//! ```
//!
//! # Degenerate Input
//!
//! ICP refuses point sets with fewer than four points or without extent in
//! all three dimensions ([`RegistrationError::InsufficientGeometry`]); it
//! never falls back to the identity.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod closest;
mod error;
mod icp;
mod solve;
mod transform;

pub use closest::SurfaceLocator;
pub use error::{RegistrationError, RegistrationResult};
pub use icp::{align, apply_transform_to_other, icp_align, IcpMode, IcpParams, IcpResult};
pub use solve::{check_geometry, solve, solve_affine, solve_rigid, solve_similarity};
pub use transform::RigidTransform;
