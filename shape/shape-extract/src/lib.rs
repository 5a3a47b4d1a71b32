//! Label surface extraction for bone shape modelling.
//!
//! Turns one label of a segmented [`LabelVolume`](shape_types::LabelVolume)
//! into a closed, outward-wound triangle surface using boolean surface nets:
//! a discrete isosurface of the binary mask `voxel == label` with one shared
//! point per boundary cell.
//!
//! Extraction is a pure function of its inputs. A label that does not occur
//! in the volume is reported as [`ExtractError::EmptyRegion`] rather than
//! producing an empty mesh, so a missing bone cannot silently reach
//! registration.
//!
//! # Example
//!
//! ```
//! use shape_extract::{extract, ExtractError};
//! use shape_types::{LabelVolume, Point3, Vector3};
//!
//! let volume = LabelVolume::from_fn([4, 4, 4], Vector3::new(0.5, 0.5, 0.5), Point3::origin(), |x, y, z| {
//!     if (1..3).contains(&x) && (1..3).contains(&y) && (1..3).contains(&z) { 2 } else { 0 }
//! })
//! .unwrap();
//!
//! let bone = extract(&volume, 2).unwrap();
//! assert!(bone.signed_volume() > 0.0);
//! assert_eq!(extract(&volume, 5), Err(ExtractError::EmptyRegion { label: 5 }));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod error;
mod surface_nets;

pub use error::{ExtractError, ExtractResult};
pub use surface_nets::extract;
