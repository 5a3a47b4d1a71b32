//! Cross-subject registration protocol.
//!
//! A [`BoneSet`] is brought into correspondence in three passes, each
//! finished for every subject before the next begins:
//!
//! | Pass                   | ICP source → target              | Mesh replaced              |
//! |------------------------|----------------------------------|----------------------------|
//! | [`Pass::Pose`]         | `bone[l][0]` → `bone[l][i]`      | `bone[l][i]` (moved source) |
//! | [`Pass::Propagate`]    | `bone[ref][0]` → `bone[ref][i]`  | `bone[l][i]`, every `l ≠ ref` |
//! | [`Pass::Reference`]    | `bone[ref][0]` → `bone[ref][i]`  | `bone[ref][i]`             |
//!
//! The pose pass gives every subject's bone the point numbering of the
//! subject-0 shape. The propagate pass moves the other bones with the
//! subject's reference-bone pose, computed against the reference bone as it
//! was before the reference pass touches it; running the reference pass
//! first changes the result.
//!
//! Within a pass the ICP calls run in parallel on a snapshot of the set;
//! the results are written back once all of them have succeeded.

use rayon::prelude::*;
use shape_registration::{align, apply_transform_to_other, icp_align, IcpParams, IcpResult};
use shape_types::{CorrespondenceGroup, Mesh};
use tracing::info;

use crate::bones::BoneSet;
use crate::config::PoseAlignment;
use crate::error::{PipelineError, PipelineResult};
use crate::progress::ProgressTracker;

/// One of the three registration passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Pass {
    /// Pass 1: register each bone's subject-0 shape onto every subject.
    Pose,
    /// Pass 2: carry the reference-bone pose onto the other bones.
    Propagate,
    /// Pass 3: register the reference bone itself.
    Reference,
}

impl Pass {
    /// The passes in protocol order.
    pub const ALL: [Self; 3] = [Self::Pose, Self::Propagate, Self::Reference];
}

impl std::fmt::Display for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pose => "pose",
            Self::Propagate => "propagate",
            Self::Reference => "reference",
        };
        f.write_str(name)
    }
}

/// A `(label, subject)` entry of a bone set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoneRef {
    /// Bone label.
    pub label: i32,
    /// Subject index.
    pub subject: usize,
}

impl BoneRef {
    /// Creates a reference to `bone[label][subject]`.
    #[must_use]
    pub const fn new(label: i32, subject: usize) -> Self {
        Self { label, subject }
    }
}

impl std::fmt::Display for BoneRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bone {} / subject {}", self.label, self.subject)
    }
}

/// Record of one bone-set update made by a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationStep {
    /// Pass that made the update.
    pub pass: Pass,
    /// Mesh registered by ICP.
    pub source: BoneRef,
    /// Mesh it was registered onto.
    pub target: BoneRef,
    /// Entry that was replaced.
    pub updated: BoneRef,
    /// Final ICP RMS distance.
    pub rms_error: f64,
    /// ICP iterations used.
    pub iterations: u32,
    /// Whether ICP met its RMS threshold.
    pub converged: bool,
}

impl RegistrationStep {
    fn new(pass: Pass, source: BoneRef, target: BoneRef, updated: BoneRef, icp: &IcpResult) -> Self {
        Self {
            pass,
            source,
            target,
            updated,
            rms_error: icp.rms_error,
            iterations: icp.iterations,
            converged: icp.converged,
        }
    }
}

impl std::fmt::Display for RegistrationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} -> {}, updated {} (RMS {:.6}, {} iterations)",
            self.pass, self.source, self.target, self.updated, self.rms_error, self.iterations
        )
    }
}

/// How a bone set is registered: the anchoring bone, the ICP settings and
/// the alignment direction of the last two passes.
///
/// # Example
///
/// ```
/// use shape_pipeline::{BoneSet, Pass, PoseAlignment, RegistrationPlan};
/// use shape_registration::IcpParams;
/// use shape_types::{unit_cube, Vector3};
///
/// let mut moved = unit_cube();
/// moved.translate(Vector3::new(1.0, 2.0, 3.0));
/// let mut bones: BoneSet = [(1, vec![unit_cube(), moved.clone()]), (2, vec![unit_cube(), moved])]
///     .into_iter()
///     .collect();
///
/// let plan = RegistrationPlan::new(2, IcpParams::default(), PoseAlignment::ReferenceOntoSubject);
/// let steps = plan.register(&mut bones, None).unwrap();
/// assert_eq!(steps.len(), 4 + 2 + 2);
/// assert_eq!(steps.last().unwrap().pass, Pass::Reference);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationPlan {
    /// Bone anchoring cross-subject alignment.
    pub reference_label: i32,
    /// ICP settings for every alignment.
    pub icp: IcpParams,
    /// Direction of the propagate and reference alignments.
    pub alignment: PoseAlignment,
}

impl RegistrationPlan {
    /// Creates a plan.
    #[must_use]
    pub const fn new(reference_label: i32, icp: IcpParams, alignment: PoseAlignment) -> Self {
        Self {
            reference_label,
            icp,
            alignment,
        }
    }

    /// Number of progress units [`register`](Self::register) reports.
    #[must_use]
    pub const fn units(labels: usize, subjects: usize) -> usize {
        labels * subjects + 2 * subjects
    }

    /// Runs the three passes in protocol order.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::BoneSet`] if the set is empty, uneven or
    /// lacks the reference label, and [`PipelineError::Registration`]
    /// naming the pass and `(label, subject)` of the first failed ICP. On
    /// error the set keeps the state left by the last completed pass.
    pub fn register(
        &self,
        bones: &mut BoneSet,
        progress: Option<&ProgressTracker>,
    ) -> PipelineResult<Vec<RegistrationStep>> {
        let mut steps = Vec::new();
        for pass in Pass::ALL {
            steps.extend(self.run_pass(bones, pass, progress)?);
        }
        Ok(steps)
    }

    /// Runs a single pass over the whole set.
    ///
    /// # Errors
    ///
    /// Same as [`register`](Self::register); the set is unchanged on error.
    pub fn run_pass(
        &self,
        bones: &mut BoneSet,
        pass: Pass,
        progress: Option<&ProgressTracker>,
    ) -> PipelineResult<Vec<RegistrationStep>> {
        let subjects = bones.subjects()?;
        if subjects == 0 {
            return Err(PipelineError::BoneSet("no subjects to register".to_string()));
        }
        if !bones.contains(self.reference_label) {
            return Err(PipelineError::BoneSet(format!(
                "reference bone {} is not in the set",
                self.reference_label
            )));
        }

        let steps = match pass {
            Pass::Pose => self.pose_pass(bones, subjects, progress)?,
            Pass::Propagate => self.propagate_pass(bones, subjects, progress)?,
            Pass::Reference => self.reference_pass(bones, subjects, progress)?,
        };

        #[allow(clippy::cast_precision_loss)]
        let mean_rms = steps.iter().map(|s| s.rms_error).sum::<f64>() / steps.len().max(1) as f64;
        info!(
            pass = %pass,
            reference = self.reference_label,
            subjects,
            updates = steps.len(),
            mean_rms,
            "Registration pass complete"
        );
        Ok(steps)
    }

    fn pose_pass(
        &self,
        bones: &mut BoneSet,
        subjects: usize,
        progress: Option<&ProgressTracker>,
    ) -> PipelineResult<Vec<RegistrationStep>> {
        let labels = bones.labels();
        // Each label's subject-0 shape starts a correspondence group that
        // every registered copy inherits.
        let references = labels
            .iter()
            .map(|&label| Ok(bones.require(label, 0)?.clone().with_group(CorrespondenceGroup::fresh())))
            .collect::<PipelineResult<Vec<Mesh>>>()?;
        let jobs: Vec<(usize, usize)> = (0..labels.len())
            .flat_map(|l| (0..subjects).map(move |subject| (l, subject)))
            .collect();

        let snapshot = &*bones;
        let results = jobs
            .par_iter()
            .map(|&(l, subject)| {
                let label = labels[l];
                let target = snapshot.require(label, subject)?;
                align(&references[l], target, &self.icp).map_err(|source| PipelineError::Registration {
                    pass: Pass::Pose,
                    label,
                    subject,
                    source,
                })
            })
            .collect::<Vec<_>>()
            .into_iter()
            .collect::<PipelineResult<Vec<_>>>()?;

        let mut steps = Vec::with_capacity(jobs.len());
        for ((l, subject), (mesh, icp)) in jobs.into_iter().zip(results) {
            let label = labels[l];
            bones.replace(label, subject, mesh)?;
            steps.push(RegistrationStep::new(
                Pass::Pose,
                BoneRef::new(label, 0),
                BoneRef::new(label, subject),
                BoneRef::new(label, subject),
                &icp,
            ));
            if let Some(p) = progress {
                p.advance(1);
            }
        }
        Ok(steps)
    }

    /// ICP source and target for `subject`'s reference-bone alignment.
    fn reference_pair(&self, subject: usize) -> (BoneRef, BoneRef) {
        let first = BoneRef::new(self.reference_label, 0);
        let this = BoneRef::new(self.reference_label, subject);
        match self.alignment {
            PoseAlignment::ReferenceOntoSubject => (first, this),
            PoseAlignment::SubjectOntoReference => (this, first),
        }
    }

    /// One reference-bone alignment per subject, computed on the current set.
    fn subject_transforms(&self, bones: &BoneSet, subjects: usize, pass: Pass) -> PipelineResult<Vec<IcpResult>> {
        (0..subjects)
            .into_par_iter()
            .map(|subject| {
                let (source, target) = self.reference_pair(subject);
                let source = bones.require(source.label, source.subject)?;
                let target = bones.require(target.label, target.subject)?;
                icp_align(source, target, &self.icp).map_err(|source| PipelineError::Registration {
                    pass,
                    label: self.reference_label,
                    subject,
                    source,
                })
            })
            .collect::<Vec<_>>()
            .into_iter()
            .collect()
    }

    fn propagate_pass(
        &self,
        bones: &mut BoneSet,
        subjects: usize,
        progress: Option<&ProgressTracker>,
    ) -> PipelineResult<Vec<RegistrationStep>> {
        let transforms = self.subject_transforms(bones, subjects, Pass::Propagate)?;
        let others: Vec<i32> = bones
            .labels()
            .into_iter()
            .filter(|&label| label != self.reference_label)
            .collect();

        let mut steps = Vec::with_capacity(others.len() * subjects);
        for (subject, icp) in transforms.iter().enumerate() {
            let (source, target) = self.reference_pair(subject);
            for &label in &others {
                let moved = apply_transform_to_other(&icp.transform, bones.require(label, subject)?);
                bones.replace(label, subject, moved)?;
                steps.push(RegistrationStep::new(
                    Pass::Propagate,
                    source,
                    target,
                    BoneRef::new(label, subject),
                    icp,
                ));
            }
            if let Some(p) = progress {
                p.advance(1);
            }
        }
        Ok(steps)
    }

    fn reference_pass(
        &self,
        bones: &mut BoneSet,
        subjects: usize,
        progress: Option<&ProgressTracker>,
    ) -> PipelineResult<Vec<RegistrationStep>> {
        let transforms = self.subject_transforms(bones, subjects, Pass::Reference)?;
        let label = self.reference_label;

        let mut steps = Vec::with_capacity(subjects);
        for (subject, icp) in transforms.iter().enumerate() {
            let (source, target) = self.reference_pair(subject);
            let moved = apply_transform_to_other(&icp.transform, bones.require(label, subject)?);
            bones.replace(label, subject, moved)?;
            steps.push(RegistrationStep::new(
                Pass::Reference,
                source,
                target,
                BoneRef::new(label, subject),
                icp,
            ));
            if let Some(p) = progress {
                p.advance(1);
            }
        }
        Ok(steps)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::cast_precision_loss)]
mod tests {
    use super::*;
    use shape_registration::RegistrationError;
    use shape_types::{unit_cube, Point3, Vector3};

    fn shifted(mesh: &Mesh, offset: Vector3<f64>) -> Mesh {
        let mut mesh = mesh.clone();
        mesh.translate(offset);
        mesh
    }

    fn stretched_cube(sx: f64) -> Mesh {
        let mut mesh = unit_cube();
        mesh.map_positions(|p| Point3::new(p.x * sx, p.y, p.z * 0.5));
        mesh
    }

    fn two_subject_set() -> BoneSet {
        let a = stretched_cube(2.0);
        let b = shifted(&stretched_cube(3.0), Vector3::new(5.0, 0.0, 0.0));
        let offset = Vector3::new(0.5, -1.0, 2.0);
        [
            (1, vec![a.clone(), shifted(&a, offset)]),
            (2, vec![b.clone(), shifted(&b, offset)]),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn pose_pass_shares_reference_topology() {
        let mut bones = two_subject_set();
        let plan = RegistrationPlan::new(2, IcpParams::default(), PoseAlignment::ReferenceOntoSubject);
        let steps = plan.run_pass(&mut bones, Pass::Pose, None).unwrap();
        assert_eq!(steps.len(), 4);

        for label in [1, 2] {
            let first = bones.get(label, 0).unwrap();
            let second = bones.get(label, 1).unwrap();
            assert!(first.group.is_assigned());
            assert!(first.group.compatible_with(&second.group));
            assert_eq!(first.faces, second.faces);
        }
        assert!(!bones.get(1, 0).unwrap().group.compatible_with(&bones.get(2, 0).unwrap().group));
    }

    #[test]
    fn propagate_never_touches_reference_bone() {
        let mut bones = two_subject_set();
        let plan = RegistrationPlan::new(2, IcpParams::default(), PoseAlignment::ReferenceOntoSubject);
        plan.run_pass(&mut bones, Pass::Pose, None).unwrap();
        let before = bones.get(2, 1).unwrap().clone();
        let steps = plan.run_pass(&mut bones, Pass::Propagate, None).unwrap();

        assert!(steps.iter().all(|s| s.updated.label == 1));
        assert!(steps.iter().all(|s| s.source == BoneRef::new(2, 0)));
        assert_eq!(bones.get(2, 1).unwrap().vertices, before.vertices);
    }

    #[test]
    fn subject_onto_reference_brings_subjects_home() {
        let mut bones = two_subject_set();
        let plan = RegistrationPlan::new(2, IcpParams::default(), PoseAlignment::SubjectOntoReference);
        let steps = plan.register(&mut bones, None).unwrap();
        let last = steps.last().unwrap();
        assert_eq!(last.source, BoneRef::new(2, 1));
        assert_eq!(last.target, BoneRef::new(2, 0));

        // Every subject now sits where subject 0 was.
        for label in [1, 2] {
            let home = bones.get(label, 0).unwrap();
            let moved = bones.get(label, 1).unwrap();
            for (p, q) in home.positions().zip(moved.positions()) {
                assert!((p - q).norm() < 1e-6);
            }
        }
    }

    #[test]
    fn progress_counts_units() {
        let mut bones = two_subject_set();
        let tracker = ProgressTracker::new(RegistrationPlan::units(2, 2), std::sync::Arc::new(crate::LogProgress));
        let plan = RegistrationPlan::new(2, IcpParams::default(), PoseAlignment::ReferenceOntoSubject);
        plan.register(&mut bones, Some(&tracker)).unwrap();
        assert!((tracker.fraction() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn missing_reference_and_degenerate_bone_reported() {
        let mut bones = two_subject_set();
        let plan = RegistrationPlan::new(7, IcpParams::default(), PoseAlignment::ReferenceOntoSubject);
        assert!(matches!(plan.register(&mut bones, None), Err(PipelineError::BoneSet(_))));

        let flat = Mesh::from_points((0..10).map(|i| Point3::new(f64::from(i), 0.0, 0.0)));
        bones.insert(1, vec![flat.clone(), flat]);
        let plan = RegistrationPlan::new(2, IcpParams::default(), PoseAlignment::ReferenceOntoSubject);
        match plan.register(&mut bones, None) {
            Err(PipelineError::Registration {
                pass: Pass::Pose,
                label: 1,
                subject: 0,
                source: RegistrationError::InsufficientGeometry { .. },
            }) => {}
            other => panic!("expected insufficient geometry, got {other:?}"),
        }
    }
}
