//! Directory loading in natural file-name order.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use shape_io::{load_mesh, load_nifti, MeshFormat};
use shape_model::ModelError;
use shape_types::{CorrespondenceGroup, LabelVolume, Mesh};
use tracing::info;

use crate::error::{PipelineError, PipelineResult};
use crate::natural::natural_cmp;

/// Volumes loaded from a directory, in subject order.
#[derive(Debug, Clone)]
pub struct VolumeDirectory {
    /// Source file of each volume.
    pub files: Vec<PathBuf>,
    /// One volume per file.
    pub volumes: Vec<LabelVolume>,
}

/// Meshes loaded from a directory, in natural file-name order.
#[derive(Debug, Clone)]
pub struct MeshDirectory {
    /// Source file of each mesh.
    pub files: Vec<PathBuf>,
    /// One mesh per file, all in one fresh correspondence group.
    pub meshes: Vec<Mesh>,
}

impl MeshDirectory {
    /// File names (without directory) in row order.
    #[must_use]
    pub fn file_names(&self) -> Vec<String> {
        self.files.iter().map(|p| file_name(p)).collect()
    }
}

/// File name of `path` as text, or the whole path if it has none.
pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

/// Files in `dir` whose extension matches `accept`, naturally sorted.
///
/// # Errors
///
/// Returns [`PipelineError::NotADirectory`] if `dir` is not a directory and
/// [`PipelineError::Io`] if it cannot be listed.
pub fn list_files(dir: &Path, accept: impl Fn(&Path) -> bool) -> PipelineResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(PipelineError::NotADirectory { path: dir.to_path_buf() });
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && accept(&path) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| natural_cmp(&file_name(a), &file_name(b)));
    Ok(files)
}

fn is_nifti(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("nii"))
}

/// Loads the `.nii` volumes in `dir`, at most `limit` of them.
///
/// # Errors
///
/// - [`PipelineError::NotADirectory`] if `dir` is not a directory
/// - [`PipelineError::NoVolumes`] if it holds no `.nii` file
/// - [`PipelineError::Input`] naming the first file that cannot be read
pub fn load_volume_directory(dir: &Path, limit: Option<usize>) -> PipelineResult<VolumeDirectory> {
    let mut files = list_files(dir, is_nifti)?;
    if let Some(limit) = limit {
        files.truncate(limit);
    }
    if files.is_empty() {
        return Err(PipelineError::NoVolumes { path: dir.to_path_buf() });
    }

    let volumes = files
        .par_iter()
        .map(|path| {
            load_nifti(path).map_err(|source| PipelineError::Input {
                path: path.clone(),
                source,
            })
        })
        .collect::<PipelineResult<Vec<_>>>()?;

    info!(dir = %dir.display(), volumes = volumes.len(), "Loaded label volumes");
    Ok(VolumeDirectory { files, volumes })
}

/// Loads the PLY and STL meshes in `dir` for shape modelling.
///
/// Every mesh must have the point count of the first; the loaded meshes
/// are tagged with one fresh correspondence group.
///
/// # Errors
///
/// - [`PipelineError::NotADirectory`] if `dir` is not a directory
/// - [`PipelineError::EmptyDirectory`] if it holds no mesh file
/// - [`PipelineError::Input`] naming the first file that cannot be read
/// - [`PipelineError::Model`] wrapping [`ModelError::CorrespondenceMismatch`]
///   if point counts differ
pub fn load_mesh_directory(dir: &Path) -> PipelineResult<MeshDirectory> {
    let files = list_files(dir, |p| MeshFormat::from_path(p).is_some())?;
    if files.is_empty() {
        return Err(PipelineError::EmptyDirectory { path: dir.to_path_buf() });
    }

    let meshes = files
        .par_iter()
        .map(|path| {
            load_mesh(path).map_err(|source| PipelineError::Input {
                path: path.clone(),
                source,
            })
        })
        .collect::<PipelineResult<Vec<_>>>()?;

    let expected = meshes[0].vertices.len();
    if let Some((index, mesh)) = meshes.iter().enumerate().find(|(_, m)| m.vertices.len() != expected) {
        return Err(ModelError::CorrespondenceMismatch {
            index,
            expected,
            actual: mesh.vertices.len(),
        }
        .into());
    }

    let group = CorrespondenceGroup::fresh();
    let meshes = meshes.into_iter().map(|m| m.with_group(group)).collect::<Vec<_>>();
    info!(dir = %dir.display(), meshes = meshes.len(), points = expected, "Loaded mesh directory");
    Ok(MeshDirectory { files, meshes })
}
