//! Workflows that turn labeled volumes into a bone shape model.
//!
//! Two stages:
//!
//! - **Training-data generation** - [`TrainingPipeline`] extracts every bone
//!   from every subject's volume, processes the surfaces and registers them
//!   across subjects with the three-pass [`RegistrationPlan`], then writes
//!   one combined mesh per subject.
//! - **Modelling** - [`build_model`] and [`fit_directory`] build a
//!   [`ShapeModel`](shape_model::ShapeModel) from a mesh directory and
//!   export fitted coefficients; [`interpolate_shapes`] and
//!   [`write_mode_sweep`] produce shape sequences.
//!
//! Files are consumed in natural order ([`natural_cmp`]), so subject 2 comes
//! before subject 10.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use shape_model::ModelParams;
//! use shape_pipeline::{build_model, fit_directory, BoneLabels, TrainingConfig, TrainingPipeline};
//!
//! let config = TrainingConfig::default()
//!     .with_bone_labels(BoneLabels::Explicit(vec![1, 2]))
//!     .with_reference_label(Some(2));
//! let report = TrainingPipeline::new(config)
//!     .run(Path::new("volumes"), Path::new("training"))
//!     .unwrap();
//! println!("{report}");
//!
//! let (model, _) = build_model(Path::new("training"), &ModelParams::default()).unwrap();
//! fit_directory(&model, Path::new("poses"), Path::new("fitted")).unwrap();
//! ```
//!
//! # Failure policy
//!
//! Invalid configuration and unreadable inputs are reported before any
//! computation. An extraction or registration failure aborts the run and
//! names the `(label, subject)` pair; nothing is written unless every stage
//! before export succeeded.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod bones;
mod config;
mod error;
mod loader;
mod modeling;
mod natural;
mod pipeline;
mod progress;
mod register;
mod single_flight;
mod state;

pub use bones::BoneSet;
pub use config::{BoneLabels, PoseAlignment, TrainingConfig};
pub use error::{PipelineError, PipelineResult};
pub use loader::{list_files, load_mesh_directory, load_volume_directory, MeshDirectory, VolumeDirectory};
pub use modeling::{
    build_model, fit_directory, interpolate_shapes, write_mode_sweep, write_sequence, FitReport,
};
pub use natural::{natural_cmp, natural_sort};
pub use pipeline::{
    combined_file_name, extracted_bone_file_name, registered_bone_file_name, TrainingPipeline,
    TrainingReport,
};
pub use progress::{LogProgress, ProgressSink, ProgressTracker};
pub use register::{BoneRef, Pass, RegistrationPlan, RegistrationStep};
pub use single_flight::SingleFlight;
pub use state::PipelineState;
