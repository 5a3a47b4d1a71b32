//! Mesh and label volume file I/O for bone shape modelling.
//!
//! Surface meshes:
//!
//! - **PLY** (Polygon File Format) - Binary and ASCII, double precision,
//!   preserves point order exactly. The default training format.
//! - **STL** (Stereolithography) - Binary and ASCII. Corners are re-welded
//!   on load so the result is an indexed mesh.
//!
//! Label volumes:
//!
//! - **NIfTI-1** single-file `.nii` segmentations.
//!
//! # Example
//!
//! ```no_run
//! use shape_io::{load_mesh, load_nifti, save_mesh};
//!
//! let volume = load_nifti("subject_01.nii").unwrap();
//! println!("{:?} voxels", volume.dims());
//!
//! // Format detected from extension
//! let mesh = load_mesh("femur.stl").unwrap();
//! save_mesh(&mesh, "femur.ply").unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod error;
mod nifti;
mod ply;
mod stl;

pub use error::{IoError, IoResult};
pub use nifti::{load_nifti, parse_nifti, save_nifti};
pub use ply::{load_ply, save_ply};
pub use stl::{load_stl, save_stl};

use std::path::Path;

use shape_types::Mesh;

/// Supported surface mesh file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum MeshFormat {
    /// PLY (Polygon File Format).
    #[default]
    Ply,
    /// STL (Stereolithography) format.
    Stl,
}

impl MeshFormat {
    /// Detect format from file extension, case-insensitively.
    ///
    /// Returns `None` if the extension is not recognized.
    #[must_use]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "ply" => Some(Self::Ply),
            "stl" => Some(Self::Stl),
            _ => None,
        }
    }

    /// Get the canonical file extension for this format.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Ply => "ply",
            Self::Stl => "stl",
        }
    }
}

fn detect_format(path: &Path) -> IoResult<MeshFormat> {
    MeshFormat::from_path(path).ok_or_else(|| IoError::UnknownFormat {
        extension: path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("(none)")
            .to_string(),
    })
}

/// Load a mesh from a file, detecting format from extension.
///
/// # Errors
///
/// Returns an error if:
/// - The file format cannot be determined from the extension
/// - The file cannot be read
/// - The file content is invalid for the detected format
pub fn load_mesh<P: AsRef<Path>>(path: P) -> IoResult<Mesh> {
    let path = path.as_ref();
    match detect_format(path)? {
        MeshFormat::Ply => load_ply(path),
        MeshFormat::Stl => load_stl(path),
    }
}

/// Save a mesh to a file in binary form, detecting format from extension.
///
/// # Errors
///
/// Returns an error if the format cannot be determined from the extension
/// or the file cannot be written.
pub fn save_mesh<P: AsRef<Path>>(mesh: &Mesh, path: P) -> IoResult<()> {
    let path = path.as_ref();
    match detect_format(path)? {
        MeshFormat::Ply => save_ply(mesh, path, true),
        MeshFormat::Stl => save_stl(mesh, path, true),
    }
}
