//! Training-data generation: volumes in, corresponded bone meshes out.
//!
//! A run walks the [`PipelineState`] machine:
//!
//! 1. **Extracting** - every configured bone label is extracted from every
//!    subject's volume and passed through the surface processing chain.
//! 2. **Registering** - the [`RegistrationPlan`] passes bring the bones
//!    into correspondence (skipped when `skip_registration` is set).
//! 3. **Exporting** - combined and per-bone meshes are written.
//!
//! Nothing is written before every earlier stage has succeeded, so a failed
//! run leaves no partial export behind.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use rayon::prelude::*;
use shape_extract::extract;
use shape_io::save_mesh;
use shape_process::process;
use shape_types::{CorrespondenceGroup, LabelVolume, Mesh};
use tracing::{debug, info, warn};

use crate::bones::BoneSet;
use crate::config::TrainingConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::loader::{load_volume_directory, VolumeDirectory};
use crate::progress::{LogProgress, ProgressSink, ProgressTracker};
use crate::register::{RegistrationPlan, RegistrationStep};
use crate::single_flight::SingleFlight;
use crate::state::PipelineState;

/// Name of the combined export for the subject loaded from `volume`.
#[must_use]
pub fn combined_file_name(volume: &Path, extension: &str) -> String {
    let stem = volume
        .file_stem()
        .map_or_else(|| "subject".into(), |s| s.to_string_lossy());
    format!("{stem}_combined.{extension}")
}

/// Name of a registered per-bone export.
#[must_use]
pub fn registered_bone_file_name(subject: usize, label: i32, extension: &str) -> String {
    format!("Position_{subject}_bone_{label}.{extension}")
}

/// Name of an extracted (pre-registration) per-bone export.
#[must_use]
pub fn extracted_bone_file_name(subject: usize, label: i32, extension: &str) -> String {
    format!("Bone_{label}_position_{subject}.{extension}")
}

/// Outcome of a successful training run.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    /// Volume files in subject order.
    pub volumes: Vec<PathBuf>,
    /// Bone labels extracted, ascending.
    pub labels: Vec<i32>,
    /// Reference bone of the registration.
    pub reference_label: i32,
    /// Every bone-set update, in the order it was made.
    pub steps: Vec<RegistrationStep>,
    /// Every file written.
    pub written: Vec<PathBuf>,
}

impl TrainingReport {
    /// Number of subjects processed.
    #[must_use]
    pub fn subjects(&self) -> usize {
        self.volumes.len()
    }

    /// Whether every registration met its RMS threshold.
    #[must_use]
    pub fn all_converged(&self) -> bool {
        self.steps.iter().all(|s| s.converged)
    }
}

impl std::fmt::Display for TrainingReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Training data: {} subjects, bones {:?} (reference {}), {} registrations, {} files written",
            self.subjects(),
            self.labels,
            self.reference_label,
            self.steps.len(),
            self.written.len()
        )
    }
}

/// Runs training-data generation with a fixed configuration.
///
/// One run at a time: a call made while another is in flight fails with
/// [`PipelineError::AlreadyRunning`].
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use shape_pipeline::{TrainingConfig, TrainingPipeline};
///
/// let pipeline = TrainingPipeline::new(TrainingConfig::default().with_reference_label(Some(2)));
/// let report = pipeline.run(Path::new("volumes"), Path::new("training")).unwrap();
/// println!("{report}");
/// ```
pub struct TrainingPipeline {
    config: TrainingConfig,
    progress: Arc<dyn ProgressSink>,
    flight: SingleFlight,
    state: Mutex<PipelineState>,
}

impl std::fmt::Debug for TrainingPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainingPipeline")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl TrainingPipeline {
    /// Creates a pipeline that logs progress at debug level.
    #[must_use]
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            progress: Arc::new(LogProgress),
            flight: SingleFlight::new(),
            state: Mutex::new(PipelineState::NotStarted),
        }
    }

    /// Sends progress reports to `sink`.
    #[must_use]
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = sink;
        self
    }

    /// The run configuration.
    #[must_use]
    pub const fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// State of the current or most recent run.
    #[must_use]
    pub fn state(&self) -> PipelineState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a run is in flight.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.flight.is_running()
    }

    /// Loads the volumes in `volume_dir` and writes training meshes to
    /// `output_dir`.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::AlreadyRunning`] if a run is in flight
    /// - [`PipelineError::InvalidConfig`] before anything is loaded
    /// - input errors from [`load_volume_directory`] before anything is computed
    /// - [`PipelineError::Extract`] / [`PipelineError::Registration`] naming
    ///   the failing `(label, subject)`; nothing is written
    /// - [`PipelineError::Output`] if a file cannot be written
    pub fn run(&self, volume_dir: &Path, output_dir: &Path) -> PipelineResult<TrainingReport> {
        self.flight.try_run(|| {
            self.config.validate()?;
            let volumes = load_volume_directory(volume_dir, self.config.file_limit())?;
            self.execute(&volumes, output_dir)
        })
    }

    /// Like [`run`](Self::run), for volumes that are already loaded.
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run), minus the input errors.
    pub fn run_volumes(&self, volumes: &VolumeDirectory, output_dir: &Path) -> PipelineResult<TrainingReport> {
        self.flight.try_run(|| {
            self.config.validate()?;
            self.execute(volumes, output_dir)
        })
    }

    fn set_state(&self, next: PipelineState) -> PipelineResult<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.transition(next)?;
        debug!(state = %next, "Pipeline state");
        Ok(())
    }

    fn execute(&self, volumes: &VolumeDirectory, output_dir: &Path) -> PipelineResult<TrainingReport> {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = PipelineState::NotStarted;
        let result = self.stages(volumes, output_dir);
        if let Err(e) = &result {
            warn!(error = %e, "Training run failed");
            let _ = self.set_state(PipelineState::Failed);
        }
        result
    }

    fn stages(&self, volumes: &VolumeDirectory, output_dir: &Path) -> PipelineResult<TrainingReport> {
        let config = &self.config;
        let Some(first) = volumes.volumes.first() else {
            return Err(PipelineError::BoneSet("no volumes to process".to_string()));
        };
        let labels = config.bone_labels.resolve(&first.labels_present());
        let reference_label = config.resolve_reference(&labels)?;
        let subjects = volumes.volumes.len();

        let registration_units = if config.skip_registration {
            0
        } else {
            RegistrationPlan::units(labels.len(), subjects)
        };
        let tracker = ProgressTracker::new(
            labels.len() * subjects + registration_units + subjects,
            Arc::clone(&self.progress),
        );

        self.set_state(PipelineState::Extracting)?;
        let extracted = self.extract_bones(&volumes.volumes, &labels, &tracker)?;

        let mut steps = Vec::new();
        let mut registered = None;
        if !config.skip_registration {
            self.set_state(PipelineState::Registering)?;
            let mut bones = extracted.clone();
            let plan = RegistrationPlan::new(reference_label, config.icp_params(), config.pose_alignment);
            steps = plan.register(&mut bones, Some(&tracker))?;
            registered = Some(bones);
        }

        self.set_state(PipelineState::Exporting)?;
        std::fs::create_dir_all(output_dir)?;
        let mut written = Vec::new();
        let ext = config.mesh_format.extension();

        if config.skip_registration || config.save_extracted_bones {
            for &label in &labels {
                for subject in 0..subjects {
                    let path = output_dir.join(extracted_bone_file_name(subject, label, ext));
                    written.push(write_mesh(extracted.require(label, subject)?, path)?);
                }
            }
        }

        if let Some(bones) = &registered {
            let export_labels: Vec<i32> = labels
                .iter()
                .copied()
                .filter(|&l| !(config.remove_reference_bone_from_export && l == reference_label))
                .collect();
            if export_labels.is_empty() {
                warn!(reference = reference_label, "No bones left to export after removing the reference bone");
            } else {
                let group = CorrespondenceGroup::fresh();
                for (subject, volume_path) in volumes.files.iter().enumerate() {
                    let combined = bones.combined(subject, &export_labels, group)?;
                    let path = output_dir.join(combined_file_name(volume_path, ext));
                    written.push(write_mesh(&combined, path)?);

                    if config.save_registered_bones {
                        for &label in &export_labels {
                            let path = output_dir.join(registered_bone_file_name(subject, label, ext));
                            written.push(write_mesh(bones.require(label, subject)?, path)?);
                        }
                    }
                    tracker.advance(1);
                }
            }
        }

        self.set_state(PipelineState::Done)?;
        tracker.finish();

        let report = TrainingReport {
            volumes: volumes.files.clone(),
            labels,
            reference_label,
            steps,
            written,
        };
        info!(
            subjects = report.subjects(),
            bones = report.labels.len(),
            reference = report.reference_label,
            files = report.written.len(),
            "Training run complete"
        );
        Ok(report)
    }

    /// Extracts and processes every `(label, subject)` bone in parallel.
    fn extract_bones(
        &self,
        volumes: &[LabelVolume],
        labels: &[i32],
        tracker: &ProgressTracker,
    ) -> PipelineResult<BoneSet> {
        let oriented = volumes
            .iter()
            .map(|v| self.orient(v))
            .collect::<PipelineResult<Vec<_>>>()?;
        let params = self.config.process_params();
        let jobs: Vec<(usize, usize)> = (0..labels.len())
            .flat_map(|l| (0..volumes.len()).map(move |subject| (l, subject)))
            .collect();

        let meshes = jobs
            .par_iter()
            .map(|&(l, subject)| {
                let label = labels[l];
                let raw = extract(&oriented[subject], label)
                    .map_err(|source| PipelineError::Extract { label, subject, source })?;
                let processed = process(&raw, &params);
                debug!(label, subject, %processed, "Extracted bone");
                Ok(processed.mesh)
            })
            .collect::<Vec<PipelineResult<Mesh>>>();

        let mut per_label: Vec<Vec<Mesh>> = vec![Vec::with_capacity(volumes.len()); labels.len()];
        for (&(l, _), mesh) in jobs.iter().zip(meshes) {
            per_label[l].push(mesh?);
            tracker.advance(1);
        }
        info!(bones = labels.len(), subjects = volumes.len(), "Extraction complete");
        Ok(labels.iter().copied().zip(per_label).collect())
    }

    fn orient<'a>(&self, volume: &'a LabelVolume) -> PipelineResult<Cow<'a, LabelVolume>> {
        let mut volume = Cow::Borrowed(volume);
        for (flip, axis) in [(self.config.flip_horizontal, 0), (self.config.flip_vertical, 1)] {
            if flip {
                let flipped = volume
                    .flipped(axis)
                    .map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;
                volume = Cow::Owned(flipped);
            }
        }
        Ok(volume)
    }
}

fn write_mesh(mesh: &Mesh, path: PathBuf) -> PipelineResult<PathBuf> {
    save_mesh(mesh, &path).map_err(|source| PipelineError::Output {
        path: path.clone(),
        source,
    })?;
    debug!(path = %path.display(), points = mesh.vertices.len(), "Wrote mesh");
    Ok(path)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::BoneLabels;
    use shape_types::{Point3, Vector3};

    fn two_box_volume(shift: usize) -> LabelVolume {
        LabelVolume::from_fn([16, 12, 10], Vector3::new(1.0, 1.0, 1.0), Point3::origin(), |x, y, z| {
            let inside = |x0: usize, x1: usize| (x0..x1).contains(&x) && (2..9).contains(&y) && (2..7).contains(&z);
            if inside(2 + shift, 6 + shift) {
                1
            } else if inside(8 + shift, 13) {
                2
            } else {
                0
            }
        })
        .unwrap()
    }

    fn volume_dir(count: usize) -> VolumeDirectory {
        VolumeDirectory {
            files: (0..count).map(|i| PathBuf::from(format!("subject{i}.nii"))).collect(),
            volumes: (0..count).map(two_box_volume).collect(),
        }
    }

    #[test]
    fn export_names() {
        assert_eq!(combined_file_name(Path::new("/a/knee7.nii"), "ply"), "knee7_combined.ply");
        assert_eq!(registered_bone_file_name(3, 2, "stl"), "Position_3_bone_2.stl");
        assert_eq!(extracted_bone_file_name(0, 5, "ply"), "Bone_5_position_0.ply");
    }

    #[test]
    fn skip_registration_writes_extracted_bones_only() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = TrainingPipeline::new(
            TrainingConfig::default()
                .with_skip_registration(true)
                .with_smoothing(0, 0.4),
        );
        let report = pipeline.run_volumes(&volume_dir(2), dir.path()).unwrap();
        assert_eq!(pipeline.state(), PipelineState::Done);
        assert!(report.steps.is_empty());
        assert_eq!(report.written.len(), 4);
        assert!(dir.path().join("Bone_2_position_1.ply").exists());
        assert!(!dir.path().join("subject0_combined.ply").exists());
    }

    #[test]
    fn absent_label_fails_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = TrainingPipeline::new(
            TrainingConfig::default()
                .with_bone_labels(BoneLabels::Explicit(vec![1, 3]))
                .with_reference_label(Some(1)),
        );
        let err = pipeline.run_volumes(&volume_dir(2), dir.path()).unwrap_err();
        assert!(matches!(err, PipelineError::Extract { label: 3, subject: 0, .. }));
        assert_eq!(pipeline.state(), PipelineState::Failed);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn invalid_config_rejected_up_front() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = TrainingPipeline::new(TrainingConfig::default().with_max_rms_error(-1.0));
        assert!(matches!(
            pipeline.run_volumes(&volume_dir(1), dir.path()),
            Err(PipelineError::InvalidConfig(_))
        ));
        assert_eq!(pipeline.state(), PipelineState::NotStarted);
    }
}
