//! Surface processing for bone shape modelling.
//!
//! Extracted label surfaces are staircase-shaped and dense. This crate
//! prepares them for registration:
//!
//! - [`compute_normals`] - Area-weighted per-point normals
//! - [`weld`] - Merge coincident points, drop degenerate triangles
//! - [`smooth`] - Laplacian smoothing with a relaxation factor
//! - [`decimate`] - Quadric edge collapse that never changes topology
//! - [`process`] - The canonical chain of all of the above
//!
//! # Canonical Order
//!
//! ```text
//! normals → weld → smooth → decimate → weld → normals
//! ```
//!
//! Welding before smoothing gives the Laplacian real neighbourhoods, welding
//! after decimation restores shared points, and normals are recomputed last
//! because every earlier step may move points.
//!
//! # Correspondence
//!
//! Operations that only move points ([`smooth`], [`compute_normals`]) keep
//! the mesh's [`CorrespondenceGroup`](shape_types::CorrespondenceGroup).
//! Operations that renumber points reset it.
//!
//! # Example
//!
//! ```
//! use shape_process::{process, ProcessParams};
//! use shape_types::unit_cube;
//!
//! let params = ProcessParams::default().with_smoothing(5, 0.3);
//! let out = process(&unit_cube(), &params);
//! println!("{out}");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod decimate;
mod error;
mod normals;
mod params;
mod process;
mod quadric;
mod smooth;
mod weld;

pub use decimate::{decimate, DecimationResult};
pub use error::{ProcessError, ProcessResult};
pub use normals::compute_normals;
pub use params::ProcessParams;
pub use process::{process, ProcessOutput};
pub use smooth::{point_neighbors, smooth};
pub use weld::{weld, WeldResult};
