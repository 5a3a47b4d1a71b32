//! Training run configuration.

use shape_io::MeshFormat;
use shape_process::ProcessParams;
use shape_registration::{IcpMode, IcpParams};

use crate::error::{PipelineError, PipelineResult};

/// Which bone labels a training run extracts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum BoneLabels {
    /// Every label present in the first volume, except the background.
    #[default]
    Auto,
    /// Exactly these labels.
    Explicit(Vec<i32>),
}

impl BoneLabels {
    /// Resolves the label list against the labels found in the first volume.
    ///
    /// `present` must be sorted ascending; its first entry is the background.
    /// The result is sorted and free of duplicates.
    #[must_use]
    pub fn resolve(&self, present: &[i32]) -> Vec<i32> {
        let mut labels = match self {
            Self::Auto => present.iter().skip(1).copied().collect(),
            Self::Explicit(labels) => labels.clone(),
        };
        labels.sort_unstable();
        labels.dedup();
        labels
    }
}

impl std::fmt::Display for BoneLabels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Explicit(labels) => {
                let joined: Vec<String> = labels.iter().map(ToString::to_string).collect();
                f.write_str(&joined.join(","))
            }
        }
    }
}

impl std::str::FromStr for BoneLabels {
    type Err = PipelineError;

    /// Parses `auto` or a comma-separated label list such as `1,2,5`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        s.split(',')
            .map(|part| {
                part.trim()
                    .parse::<i32>()
                    .map_err(|_| PipelineError::InvalidConfig(format!("bad bone label '{part}'")))
            })
            .collect::<PipelineResult<Vec<_>>>()
            .map(Self::Explicit)
    }
}

/// Direction of the cross-subject alignment in the propagate and
/// reference passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PoseAlignment {
    /// Align subject 0's reference bone onto subject `i`'s reference bone.
    #[default]
    ReferenceOntoSubject,
    /// Align subject `i`'s reference bone onto subject 0's, bringing every
    /// subject into subject 0's frame.
    SubjectOntoReference,
}

/// Configuration for one training-data generation run.
///
/// # Example
///
/// ```
/// use shape_pipeline::{BoneLabels, TrainingConfig};
/// use shape_registration::IcpMode;
///
/// let config = TrainingConfig::default()
///     .with_bone_labels(BoneLabels::Explicit(vec![1, 2]))
///     .with_reference_label(Some(2))
///     .with_icp_mode(IcpMode::Similarity);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TrainingConfig {
    /// ICP transform family. Default: rigid
    pub icp_mode: IcpMode,
    /// ICP iteration cap. Default: 100
    pub max_iterations: u32,
    /// ICP landmark cap. Default: 500
    pub max_landmarks: usize,
    /// ICP RMS stopping threshold. Default: 0.01
    pub max_rms_error: f64,
    /// Bone anchoring cross-subject alignment. `None` picks the largest
    /// label minus one if present, else the largest label.
    pub reference_label: Option<i32>,
    /// Labels to extract. Default: auto
    pub bone_labels: BoneLabels,
    /// Laplacian smoothing iterations. Default: 10
    pub smoothing_iterations: u32,
    /// Smoothing relaxation factor in `[0, 1]`. Default: 0.4
    pub relaxation_factor: f64,
    /// Fraction of triangles to remove, `0` disables. Default: 0.0
    pub decimation_ratio: f64,
    /// Leave the reference bone out of exported meshes. Default: false
    pub remove_reference_bone_from_export: bool,
    /// Maximum number of volumes to load, `-1` for all. Default: -1
    pub num_files_limit: i64,
    /// Flip every volume along its second axis before extraction.
    pub flip_vertical: bool,
    /// Flip every volume along its first axis before extraction.
    pub flip_horizontal: bool,
    /// Also write each processed bone before registration.
    pub save_extracted_bones: bool,
    /// Also write each registered bone separately.
    pub save_registered_bones: bool,
    /// Stop after extraction and processing.
    pub skip_registration: bool,
    /// Direction of cross-subject alignment.
    pub pose_alignment: PoseAlignment,
    /// Output mesh format. Default: PLY
    pub mesh_format: MeshFormat,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        let icp = IcpParams::default();
        let process = ProcessParams::default();
        Self {
            icp_mode: icp.mode,
            max_iterations: icp.max_iterations,
            max_landmarks: icp.max_landmarks,
            max_rms_error: icp.max_rms_error,
            reference_label: None,
            bone_labels: BoneLabels::Auto,
            smoothing_iterations: process.smoothing_iterations,
            relaxation_factor: process.relaxation_factor,
            decimation_ratio: process.decimation_ratio,
            remove_reference_bone_from_export: false,
            num_files_limit: -1,
            flip_vertical: false,
            flip_horizontal: false,
            save_extracted_bones: false,
            save_registered_bones: false,
            skip_registration: false,
            pose_alignment: PoseAlignment::ReferenceOntoSubject,
            mesh_format: MeshFormat::Ply,
        }
    }
}

impl TrainingConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the ICP transform family.
    #[must_use]
    pub const fn with_icp_mode(mut self, mode: IcpMode) -> Self {
        self.icp_mode = mode;
        self
    }

    /// Sets the ICP iteration cap.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the ICP landmark cap.
    #[must_use]
    pub const fn with_max_landmarks(mut self, max_landmarks: usize) -> Self {
        self.max_landmarks = max_landmarks;
        self
    }

    /// Sets the ICP RMS stopping threshold.
    #[must_use]
    pub const fn with_max_rms_error(mut self, max_rms_error: f64) -> Self {
        self.max_rms_error = max_rms_error;
        self
    }

    /// Sets the reference label, or `None` to pick it from the label set.
    #[must_use]
    pub const fn with_reference_label(mut self, label: Option<i32>) -> Self {
        self.reference_label = label;
        self
    }

    /// Sets the labels to extract.
    #[must_use]
    pub fn with_bone_labels(mut self, labels: BoneLabels) -> Self {
        self.bone_labels = labels;
        self
    }

    /// Sets the smoothing iteration count and relaxation factor.
    #[must_use]
    pub const fn with_smoothing(mut self, iterations: u32, relaxation_factor: f64) -> Self {
        self.smoothing_iterations = iterations;
        self.relaxation_factor = relaxation_factor;
        self
    }

    /// Sets the decimation ratio.
    #[must_use]
    pub const fn with_decimation_ratio(mut self, ratio: f64) -> Self {
        self.decimation_ratio = ratio;
        self
    }

    /// Leaves the reference bone out of exported meshes.
    #[must_use]
    pub const fn with_remove_reference_bone_from_export(mut self, remove: bool) -> Self {
        self.remove_reference_bone_from_export = remove;
        self
    }

    /// Limits the number of volumes loaded; `-1` loads all.
    #[must_use]
    pub const fn with_num_files_limit(mut self, limit: i64) -> Self {
        self.num_files_limit = limit;
        self
    }

    /// Flips volumes along their first and second axes.
    #[must_use]
    pub const fn with_flips(mut self, horizontal: bool, vertical: bool) -> Self {
        self.flip_horizontal = horizontal;
        self.flip_vertical = vertical;
        self
    }

    /// Writes processed bones before registration.
    #[must_use]
    pub const fn with_save_extracted_bones(mut self, save: bool) -> Self {
        self.save_extracted_bones = save;
        self
    }

    /// Writes each registered bone separately.
    #[must_use]
    pub const fn with_save_registered_bones(mut self, save: bool) -> Self {
        self.save_registered_bones = save;
        self
    }

    /// Stops after extraction and processing.
    #[must_use]
    pub const fn with_skip_registration(mut self, skip: bool) -> Self {
        self.skip_registration = skip;
        self
    }

    /// Sets the cross-subject alignment direction.
    #[must_use]
    pub const fn with_pose_alignment(mut self, alignment: PoseAlignment) -> Self {
        self.pose_alignment = alignment;
        self
    }

    /// Sets the output mesh format.
    #[must_use]
    pub const fn with_mesh_format(mut self, format: MeshFormat) -> Self {
        self.mesh_format = format;
        self
    }

    /// Volume count limit, or `None` for all.
    #[must_use]
    pub fn file_limit(&self) -> Option<usize> {
        usize::try_from(self.num_files_limit).ok()
    }

    /// ICP parameters for every registration in the run.
    #[must_use]
    pub const fn icp_params(&self) -> IcpParams {
        IcpParams {
            max_iterations: self.max_iterations,
            max_landmarks: self.max_landmarks,
            max_rms_error: self.max_rms_error,
            mode: self.icp_mode,
        }
    }

    /// Surface processing parameters for every extracted bone.
    #[must_use]
    pub fn process_params(&self) -> ProcessParams {
        ProcessParams::default()
            .with_smoothing(self.smoothing_iterations, self.relaxation_factor)
            .with_decimation(self.decimation_ratio)
    }

    /// Checks every option is in range.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first bad option.
    pub fn validate(&self) -> PipelineResult<()> {
        self.icp_params()
            .validate()
            .map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;
        if !(0.0..=1.0).contains(&self.relaxation_factor) {
            return Err(PipelineError::InvalidConfig(format!(
                "relaxation_factor must be in [0, 1], got {}",
                self.relaxation_factor
            )));
        }
        if !(0.0..1.0).contains(&self.decimation_ratio) {
            return Err(PipelineError::InvalidConfig(format!(
                "decimation_ratio must be in [0, 1), got {}",
                self.decimation_ratio
            )));
        }
        if self.num_files_limit == 0 || self.num_files_limit < -1 {
            return Err(PipelineError::InvalidConfig(format!(
                "num_files_limit must be -1 or at least 1, got {}",
                self.num_files_limit
            )));
        }
        if let BoneLabels::Explicit(labels) = &self.bone_labels {
            if labels.is_empty() {
                return Err(PipelineError::InvalidConfig(
                    "explicit bone label list is empty".to_string(),
                ));
            }
        }
        if let (Some(reference), BoneLabels::Explicit(labels)) = (self.reference_label, &self.bone_labels) {
            if !labels.contains(&reference) {
                return Err(PipelineError::InvalidConfig(format!(
                    "reference label {reference} is not among the bone labels"
                )));
            }
        }
        Ok(())
    }

    /// Picks the reference label for a resolved label set.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the set is empty or the
    /// configured reference is not part of it.
    pub fn resolve_reference(&self, labels: &[i32]) -> PipelineResult<i32> {
        let Some(&largest) = labels.iter().max() else {
            return Err(PipelineError::InvalidConfig("no bone labels to register".to_string()));
        };
        match self.reference_label {
            Some(reference) if labels.contains(&reference) => Ok(reference),
            Some(reference) => Err(PipelineError::InvalidConfig(format!(
                "reference label {reference} is not among the bone labels {labels:?}"
            ))),
            None if labels.contains(&(largest - 1)) => Ok(largest - 1),
            None => Ok(largest),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_generator() {
        let config = TrainingConfig::default();
        assert_eq!(config.max_iterations, 100);
        assert_eq!(config.max_landmarks, 500);
        assert_eq!(config.max_rms_error, 0.01);
        assert_eq!(config.smoothing_iterations, 10);
        assert_eq!(config.relaxation_factor, 0.4);
        assert_eq!(config.file_limit(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn out_of_range_options_rejected() {
        let bad = [
            TrainingConfig::default().with_max_iterations(0),
            TrainingConfig::default().with_max_landmarks(0),
            TrainingConfig::default().with_max_rms_error(0.0),
            TrainingConfig::default().with_smoothing(5, 1.5),
            TrainingConfig::default().with_decimation_ratio(1.0),
            TrainingConfig::default().with_num_files_limit(0),
            TrainingConfig::default().with_bone_labels(BoneLabels::Explicit(vec![])),
            TrainingConfig::default()
                .with_bone_labels(BoneLabels::Explicit(vec![1, 2]))
                .with_reference_label(Some(3)),
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(PipelineError::InvalidConfig(_))), "{config:?}");
        }
    }

    #[test]
    fn reference_defaults_to_second_largest() {
        let config = TrainingConfig::default();
        assert_eq!(config.resolve_reference(&[1, 2, 3]).unwrap(), 2);
        assert_eq!(config.resolve_reference(&[1, 5]).unwrap(), 5);
        assert_eq!(config.resolve_reference(&[4]).unwrap(), 4);
        assert!(config.resolve_reference(&[]).is_err());

        let explicit = config.with_reference_label(Some(1));
        assert_eq!(explicit.resolve_reference(&[1, 2, 3]).unwrap(), 1);
        assert!(explicit.resolve_reference(&[2, 3]).is_err());
    }

    #[test]
    fn labels_resolve_without_background() {
        assert_eq!(BoneLabels::Auto.resolve(&[0, 1, 2]), vec![1, 2]);
        assert_eq!(BoneLabels::Explicit(vec![3, 1, 3]).resolve(&[0, 1, 2]), vec![1, 3]);
        assert_eq!("auto".parse::<BoneLabels>().unwrap(), BoneLabels::Auto);
        assert_eq!(
            " 2, 1 ".parse::<BoneLabels>().unwrap(),
            BoneLabels::Explicit(vec![2, 1])
        );
        assert!("1,x".parse::<BoneLabels>().is_err());
    }

    #[test]
    fn icp_and_process_params_follow_config() {
        let config = TrainingConfig::default()
            .with_icp_mode(IcpMode::Affine)
            .with_max_iterations(7)
            .with_smoothing(0, 0.2)
            .with_decimation_ratio(0.5);
        let icp = config.icp_params();
        assert_eq!(icp.mode, IcpMode::Affine);
        assert_eq!(icp.max_iterations, 7);
        let process = config.process_params();
        assert_eq!(process.smoothing_iterations, 0);
        assert!(process.decimates());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn json_config_fills_defaults() {
        let config: TrainingConfig = serde_json::from_str(
            r#"{ "icp_mode": "similarity", "bone_labels": { "explicit": [1, 2] }, "pose_alignment": "subject_onto_reference" }"#,
        )
        .unwrap();
        assert_eq!(config.icp_mode, IcpMode::Similarity);
        assert_eq!(config.bone_labels, BoneLabels::Explicit(vec![1, 2]));
        assert_eq!(config.pose_alignment, PoseAlignment::SubjectOntoReference);
        assert_eq!(config.max_landmarks, 500);
    }
}
