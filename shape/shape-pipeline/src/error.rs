//! Error types for the training and modelling workflows.

use std::path::PathBuf;

use shape_extract::ExtractError;
use shape_io::IoError;
use shape_model::ModelError;
use shape_registration::RegistrationError;
use thiserror::Error;

use crate::register::Pass;
use crate::state::PipelineState;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors that can occur while running a workflow.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An input file could not be read.
    #[error("cannot read {path}: {source}")]
    Input {
        /// The file that failed.
        path: PathBuf,
        /// Underlying reader error.
        #[source]
        source: IoError,
    },

    /// An input path is missing or is not a directory.
    #[error("not a directory: {path}")]
    NotADirectory {
        /// The offending path.
        path: PathBuf,
    },

    /// A mesh directory holds no PLY or STL files.
    #[error("no mesh files (.ply, .stl) in {path}")]
    EmptyDirectory {
        /// The directory searched.
        path: PathBuf,
    },

    /// A volume directory holds no NIfTI files.
    #[error("no volume files (.nii) in {path}")]
    NoVolumes {
        /// The directory searched.
        path: PathBuf,
    },

    /// The configuration is out of range or inconsistent with the data.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A bone could not be extracted from a subject's volume.
    #[error("extracting bone {label} of subject {subject}: {source}")]
    Extract {
        /// Bone label.
        label: i32,
        /// Subject index.
        subject: usize,
        /// Underlying extraction error.
        #[source]
        source: ExtractError,
    },

    /// An ICP alignment failed during a registration pass.
    #[error("{pass} registration of bone {label}, subject {subject}: {source}")]
    Registration {
        /// Pass in which the failure happened.
        pass: Pass,
        /// Bone label being updated.
        label: i32,
        /// Subject index being updated.
        subject: usize,
        /// Underlying registration error.
        #[source]
        source: RegistrationError,
    },

    /// A bone set is missing an entry or has uneven subject counts.
    #[error("bone set: {0}")]
    BoneSet(String),

    /// An output file could not be written.
    #[error("cannot write {path}: {source}")]
    Output {
        /// The file that failed.
        path: PathBuf,
        /// Underlying writer error.
        #[source]
        source: IoError,
    },

    /// Shape model error.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Another computation is already in flight.
    #[error("a computation is already running")]
    AlreadyRunning,

    /// A state change the pipeline state machine does not allow.
    #[error("invalid pipeline transition {from:?} -> {to:?}")]
    InvalidTransition {
        /// Current state.
        from: PipelineState,
        /// Requested state.
        to: PipelineState,
    },

    /// I/O error from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
