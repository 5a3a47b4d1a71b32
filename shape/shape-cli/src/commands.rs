//! Command implementations.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use shape_io::{save_mesh, MeshFormat};
use shape_model::{CoefficientTable, ModelParams, ShapeModel};
use shape_pipeline::{
    interpolate_shapes, write_mode_sweep, write_sequence, MeshDirectory, PoseAlignment, TrainingConfig,
    TrainingPipeline,
};
use tracing::info;

use crate::{ModelArgs, TrainArgs};

/// Config file (or defaults) with the command-line overrides applied.
fn training_config(args: &TrainArgs) -> Result<TrainingConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("opening config {}", path.display()))?;
            serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => TrainingConfig::default(),
    };

    if let Some(mode) = args.mode {
        config.icp_mode = mode;
    }
    if let Some(iterations) = args.iterations {
        config.max_iterations = iterations;
    }
    if let Some(landmarks) = args.landmarks {
        config.max_landmarks = landmarks;
    }
    if let Some(rms) = args.rms {
        config.max_rms_error = rms;
    }
    if let Some(labels) = &args.labels {
        config.bone_labels = labels.clone();
    }
    if args.reference.is_some() {
        config.reference_label = args.reference;
    }
    if let Some(smoothing) = args.smoothing {
        config.smoothing_iterations = smoothing;
    }
    if let Some(relaxation) = args.relaxation {
        config.relaxation_factor = relaxation;
    }
    if let Some(decimation) = args.decimation {
        config.decimation_ratio = decimation;
    }
    if let Some(limit) = args.limit {
        config.num_files_limit = limit;
    }
    if let Some(format) = args.format {
        config.mesh_format = format.into();
    }
    config.remove_reference_bone_from_export |= args.remove_reference;
    config.flip_horizontal |= args.flip_horizontal;
    config.flip_vertical |= args.flip_vertical;
    config.save_extracted_bones |= args.save_extracted;
    config.save_registered_bones |= args.save_registered;
    config.skip_registration |= args.skip_registration;
    if args.subject_onto_reference {
        config.pose_alignment = PoseAlignment::SubjectOntoReference;
    }
    Ok(config)
}

pub fn train(args: &TrainArgs) -> Result<()> {
    let config = training_config(args)?;
    let pipeline = TrainingPipeline::new(config);
    let report = pipeline
        .run(&args.volumes, &args.output)
        .with_context(|| format!("training from {}", args.volumes.display()))?;
    if !report.all_converged() {
        info!("Some registrations stopped at the iteration cap; see warnings above");
    }
    println!("{report}");
    Ok(())
}

fn model_params(args: &ModelArgs) -> ModelParams {
    ModelParams::default()
        .with_variance_threshold(args.variance)
        .with_scale_by_std_dev(args.std_dev)
}

fn load_model(meshes: &Path, args: &ModelArgs) -> Result<(ShapeModel, MeshDirectory)> {
    shape_pipeline::build_model(meshes, &model_params(args))
        .with_context(|| format!("building model from {}", meshes.display()))
}

pub fn build_model(meshes: &Path, args: &ModelArgs, mean: Option<&Path>) -> Result<()> {
    let (model, _) = load_model(meshes, args)?;
    println!("{model}");
    let mut cumulative = 0.0;
    for (k, ratio) in model.explained_variance_ratio().iter().enumerate().take(model.num_modes()) {
        cumulative += ratio;
        println!(
            "  mode {k}: eigenvalue {:.6}, {:.2}% ({:.2}% cumulative)",
            model.eigenvalues()[k],
            ratio * 100.0,
            cumulative * 100.0
        );
    }
    if let Some(path) = mean {
        save_mesh(&model.mean_shape(), path).with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

pub fn fit(meshes: &Path, targets: &Path, output: &Path, args: &ModelArgs) -> Result<()> {
    let (model, _) = load_model(meshes, args)?;
    let report = shape_pipeline::fit_directory(&model, targets, output)
        .with_context(|| format!("fitting {}", targets.display()))?;
    println!("{report}");
    Ok(())
}

pub fn interpolate(
    meshes: &Path,
    coefficients: &Path,
    output: &Path,
    order: usize,
    frames: usize,
    format: MeshFormat,
    args: &ModelArgs,
) -> Result<()> {
    let (model, _) = load_model(meshes, args)?;
    let table = CoefficientTable::read(coefficients)
        .with_context(|| format!("reading {}", coefficients.display()))?;
    let shapes = interpolate_shapes(&model, &table, order, frames)?;
    let written = write_sequence(&shapes, output, "Interpolated", format)?;
    println!("Wrote {} interpolated shapes to {}", written.len(), output.display());
    Ok(())
}

pub fn sweep(
    meshes: &Path,
    output: &Path,
    mode: usize,
    range: f64,
    steps: usize,
    format: MeshFormat,
    args: &ModelArgs,
) -> Result<()> {
    let (model, _) = load_model(meshes, args)?;
    let written = write_mode_sweep(&model, mode, range, steps, output, format)?;
    println!("Wrote {} frames of mode {mode} to {}", written.len(), output.display());
    Ok(())
}
