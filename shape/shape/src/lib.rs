//! Bone statistical shape modelling from segmented volumes.
//!
//! This umbrella crate re-exports the shape-* crates behind one dependency.
//!
//! # Quick Start
//!
//! ```no_run
//! use shape::prelude::*;
//! use std::path::Path;
//!
//! // Volumes → corresponded bone meshes
//! let config = TrainingConfig::default().with_reference_label(Some(2));
//! TrainingPipeline::new(config)
//!     .run(Path::new("volumes"), Path::new("training"))
//!     .unwrap();
//!
//! // Meshes → shape model → coefficients
//! let (model, training) = build_model(Path::new("training"), &ModelParams::default()).unwrap();
//! let coefficients = model.fit(&training.meshes[0]).unwrap();
//! let shape = model.parameterize(&coefficients).unwrap();
//! save_mesh(&shape, "reconstructed.ply").unwrap();
//! ```
//!
//! # Module Organization
//!
//! - [`types`] - `Mesh`, `Vertex`, correspondence groups, `LabelVolume`
//! - [`io`] - PLY/STL meshes and NIfTI-1 volumes
//! - [`extract`] - Label surface extraction
//! - [`process`] - Normals, welding, smoothing, decimation
//! - [`registration`] - ICP in rigid, similarity and affine modes
//! - [`model`] - PCA shape model, coefficient tables, interpolation
//! - [`pipeline`] - Training runs and directory workflows
//!
//! # Feature Flags
//!
//! - `serde` - Serialize/deserialize configuration and parameter types

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

// =============================================================================
// Re-exports
// =============================================================================

/// Core data structures: `Mesh`, `Vertex`, `LabelVolume`.
pub use shape_types as types;

/// Mesh and volume file I/O.
pub use shape_io as io;

/// Surface extraction from label volumes.
pub use shape_extract as extract;

/// Surface processing chain.
pub use shape_process as process;

/// ICP registration.
pub use shape_registration as registration;

/// PCA shape model and coefficient tools.
pub use shape_model as model;

/// Training-data generation and modelling workflows.
pub use shape_pipeline as pipeline;

// =============================================================================
// Prelude
// =============================================================================

/// Common imports for shape modelling.
///
/// # Usage
///
/// ```
/// use shape::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use shape_types::{CorrespondenceGroup, LabelVolume, Mesh, Point3, Vector3, Vertex};

    // I/O
    pub use shape_io::{load_mesh, load_nifti, save_mesh, MeshFormat};

    // Surfaces
    pub use shape_extract::extract;
    pub use shape_process::{process, ProcessParams};

    // Registration
    pub use shape_registration::{align, apply_transform_to_other, IcpMode, IcpParams, RigidTransform};

    // Model
    pub use shape_model::{CoefficientInterpolator, CoefficientTable, ModelParams, ShapeModel};

    // Workflows
    pub use shape_pipeline::{
        build_model, fit_directory, BoneLabels, BoneSet, PipelineError, TrainingConfig,
        TrainingPipeline,
    };
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use super::types::unit_cube;

    #[test]
    fn prelude_builds_a_model() {
        let mut larger = unit_cube();
        larger.map_positions(|p| *p * 2.0);
        let model = ShapeModel::build(&[unit_cube(), larger], &ModelParams::default());
        assert!(model.is_ok());
    }
}
