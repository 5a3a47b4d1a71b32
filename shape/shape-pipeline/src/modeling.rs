//! Shape-model workflows over mesh directories.

use std::path::{Path, PathBuf};

use shape_io::{save_mesh, MeshFormat};
use shape_model::{
    linspace, mode_sweep, CoefficientInterpolator, CoefficientTable, ModelParams, ShapeModel,
};
use shape_types::Mesh;
use tracing::info;

use crate::error::{PipelineError, PipelineResult};
use crate::loader::{load_mesh_directory, MeshDirectory};

/// Coefficients fitted to a directory of meshes.
#[derive(Debug, Clone)]
pub struct FitReport {
    /// Fitted mesh files, in row order.
    pub files: Vec<PathBuf>,
    /// One row of coefficients per file.
    pub table: CoefficientTable,
}

impl std::fmt::Display for FitReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Fitted {} meshes with {} modes", self.table.len(), self.table.num_modes())
    }
}

/// Builds a shape model from the meshes in `dir`.
///
/// # Errors
///
/// Errors from [`load_mesh_directory`], or [`PipelineError::Model`] if the
/// model cannot be built.
pub fn build_model(dir: &Path, params: &ModelParams) -> PipelineResult<(ShapeModel, MeshDirectory)> {
    let training = load_mesh_directory(dir)?;
    let model = ShapeModel::build(&training.meshes, params)?;
    info!(dir = %dir.display(), %model, "Shape model ready");
    Ok((model, training))
}

/// Fits `model` to every mesh in `dir` and writes the coefficient table and
/// file list to `output_dir`.
///
/// The meshes are taken to be in correspondence with the model's training
/// set: loading them from one directory with the model's point count is the
/// caller's guarantee, so they are tagged with the model's group.
///
/// # Errors
///
/// Errors from [`load_mesh_directory`], or [`PipelineError::Model`] for a
/// point-count mismatch with the model or a write failure.
pub fn fit_directory(model: &ShapeModel, dir: &Path, output_dir: &Path) -> PipelineResult<FitReport> {
    let targets = load_mesh_directory(dir)?;
    let meshes: Vec<Mesh> = targets
        .meshes
        .iter()
        .map(|m| m.clone().with_group(model.group()))
        .collect();
    let table = model.fit_all(&meshes)?;
    table.write(output_dir, &targets.file_names())?;
    let report = FitReport {
        files: targets.files,
        table,
    };
    info!(output = %output_dir.display(), %report, "Fit complete");
    Ok(report)
}

/// Shapes along the curve of `table` interpolated with polynomials of
/// degree `order`, at `frames` positions spaced evenly over `[-1, 1]`.
///
/// # Errors
///
/// [`PipelineError::Model`] for an empty table or a table with more modes
/// than the model.
pub fn interpolate_shapes(
    model: &ShapeModel,
    table: &CoefficientTable,
    order: usize,
    frames: usize,
) -> PipelineResult<Vec<Mesh>> {
    let curves = CoefficientInterpolator::fit(table, order)?;
    linspace(-1.0, 1.0, frames)
        .into_iter()
        .map(|position| Ok(model.parameterize(&curves.evaluate(position))?))
        .collect()
}

/// Writes `meshes` as `{prefix}_{index}.{ext}` into `dir`.
///
/// # Errors
///
/// [`PipelineError::Output`] naming the first file that cannot be written.
pub fn write_sequence(meshes: &[Mesh], dir: &Path, prefix: &str, format: MeshFormat) -> PipelineResult<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    meshes
        .iter()
        .enumerate()
        .map(|(i, mesh)| {
            let path = dir.join(format!("{prefix}_{i}.{}", format.extension()));
            save_mesh(mesh, &path).map_err(|source| PipelineError::Output {
                path: path.clone(),
                source,
            })?;
            Ok(path)
        })
        .collect()
}

/// Writes the animation loop of one mode as `Mode_{mode}_{frame}` meshes.
///
/// # Errors
///
/// [`PipelineError::Model`] for an inactive mode or bad range, and
/// [`PipelineError::Output`] for a write failure.
pub fn write_mode_sweep(
    model: &ShapeModel,
    mode: usize,
    range: f64,
    steps: usize,
    dir: &Path,
    format: MeshFormat,
) -> PipelineResult<Vec<PathBuf>> {
    let frames = mode_sweep(model, mode, range, steps)?;
    write_sequence(&frames, dir, &format!("Mode_{mode}"), format)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use shape_model::{ModelError, COEFFICIENTS_FILE, FILENAMES_FILE};
    use shape_types::{unit_cube, Point3};

    fn scaled_cube(s: f64, t: f64) -> Mesh {
        let mut mesh = unit_cube();
        mesh.map_positions(|p| Point3::new(p.x * s, p.y * t, p.z));
        mesh
    }

    fn write_training(dir: &Path) {
        for (i, (s, t)) in [(1.0, 1.0), (1.5, 1.2), (2.0, 0.9), (2.5, 1.4)].into_iter().enumerate() {
            save_mesh(&scaled_cube(s, t), dir.join(format!("shape{}.ply", i + 1))).unwrap();
        }
    }

    #[test]
    fn build_then_fit_directory() {
        let training = tempfile::tempdir().unwrap();
        write_training(training.path());
        let (model, loaded) = build_model(training.path(), &ModelParams::default()).unwrap();
        assert_eq!(loaded.meshes.len(), 4);
        // Two independent stretches; the third retained mode carries no variance.
        assert_eq!(model.retained_modes(), 3);
        assert!(model.eigenvalues()[2].abs() < 1e-12);

        let out = tempfile::tempdir().unwrap();
        let report = fit_directory(&model, training.path(), out.path()).unwrap();
        assert_eq!(report.table.len(), 4);
        assert!(out.path().join(COEFFICIENTS_FILE).exists());
        let names = std::fs::read_to_string(out.path().join(FILENAMES_FILE)).unwrap();
        assert_eq!(names.lines().collect::<Vec<_>>(), vec!["shape1.ply", "shape2.ply", "shape3.ply", "shape4.ply"]);
    }

    #[test]
    fn fitting_other_point_count_rejected() {
        let training = tempfile::tempdir().unwrap();
        write_training(training.path());
        let (model, _) = build_model(training.path(), &ModelParams::default()).unwrap();

        let other = tempfile::tempdir().unwrap();
        let mut doubled = unit_cube();
        doubled.merge(&unit_cube());
        save_mesh(&doubled, other.path().join("x.ply")).unwrap();
        let out = tempfile::tempdir().unwrap();
        assert!(matches!(
            fit_directory(&model, other.path(), out.path()),
            Err(PipelineError::Model(ModelError::CorrespondenceMismatch { .. }))
        ));
        assert!(!out.path().join(COEFFICIENTS_FILE).exists());
    }

    #[test]
    fn interpolated_and_sweep_sequences_written() {
        let training = tempfile::tempdir().unwrap();
        write_training(training.path());
        let (model, loaded) = build_model(training.path(), &ModelParams::default()).unwrap();
        let table = model.fit_all(&loaded.meshes).unwrap();

        let shapes = interpolate_shapes(&model, &table, 3, 5).unwrap();
        assert_eq!(shapes.len(), 5);
        // A cubic through four samples reproduces the first and last.
        for (p, q) in shapes[0].positions().zip(loaded.meshes[0].positions()) {
            assert!((p - q).norm() < 1e-4);
        }

        let out = tempfile::tempdir().unwrap();
        let files = write_mode_sweep(&model, 0, 1.0, 3, out.path(), MeshFormat::Stl).unwrap();
        assert_eq!(files.len(), 9);
        assert!(out.path().join("Mode_0_8.stl").exists());
        assert!(write_mode_sweep(&model, 5, 1.0, 3, out.path(), MeshFormat::Ply).is_err());
    }
}
