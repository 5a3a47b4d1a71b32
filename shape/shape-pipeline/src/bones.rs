//! Per-label, per-subject bone surfaces.

use std::collections::BTreeMap;

use shape_types::{CorrespondenceGroup, Mesh};

use crate::error::{PipelineError, PipelineResult};

/// Bone surfaces keyed by label, one mesh per subject.
///
/// Labels iterate in ascending order. Every label holds the same number of
/// subjects once a training run has populated the set; entries are replaced
/// wholesale, never edited in place.
#[derive(Debug, Clone, Default)]
pub struct BoneSet {
    bones: BTreeMap<i32, Vec<Mesh>>,
}

impl BoneSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-subject meshes of `label`, returning the previous ones.
    pub fn insert(&mut self, label: i32, meshes: Vec<Mesh>) -> Option<Vec<Mesh>> {
        self.bones.insert(label, meshes)
    }

    /// Labels in ascending order.
    #[must_use]
    pub fn labels(&self) -> Vec<i32> {
        self.bones.keys().copied().collect()
    }

    /// Whether the set has no labels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// Whether `label` is present.
    #[must_use]
    pub fn contains(&self, label: i32) -> bool {
        self.bones.contains_key(&label)
    }

    /// Subject count shared by every label.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::BoneSet`] if labels hold different counts.
    pub fn subjects(&self) -> PipelineResult<usize> {
        let mut counts = self.bones.iter().map(|(label, meshes)| (*label, meshes.len()));
        let Some((_, first)) = counts.next() else {
            return Ok(0);
        };
        match counts.find(|(_, count)| *count != first) {
            Some((label, count)) => Err(PipelineError::BoneSet(format!(
                "bone {label} has {count} subjects, expected {first}"
            ))),
            None => Ok(first),
        }
    }

    /// The mesh of `label` for `subject`.
    #[must_use]
    pub fn get(&self, label: i32, subject: usize) -> Option<&Mesh> {
        self.bones.get(&label)?.get(subject)
    }

    /// Like [`get`](Self::get), but a missing entry is an error.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::BoneSet`] naming the missing pair.
    pub fn require(&self, label: i32, subject: usize) -> PipelineResult<&Mesh> {
        self.get(label, subject)
            .ok_or_else(|| PipelineError::BoneSet(format!("no mesh for bone {label}, subject {subject}")))
    }

    /// All subjects' meshes of `label`.
    #[must_use]
    pub fn meshes(&self, label: i32) -> Option<&[Mesh]> {
        self.bones.get(&label).map(Vec::as_slice)
    }

    /// Replaces the mesh of `label` for `subject`, returning the old one.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::BoneSet`] if the entry does not exist.
    pub fn replace(&mut self, label: i32, subject: usize, mesh: Mesh) -> PipelineResult<Mesh> {
        let slot = self
            .bones
            .get_mut(&label)
            .and_then(|meshes| meshes.get_mut(subject))
            .ok_or_else(|| PipelineError::BoneSet(format!("no mesh for bone {label}, subject {subject}")))?;
        Ok(std::mem::replace(slot, mesh))
    }

    /// Removes `label` and its meshes.
    pub fn remove_label(&mut self, label: i32) -> Option<Vec<Mesh>> {
        self.bones.remove(&label)
    }

    /// Every listed label's mesh for `subject`, merged in label order.
    ///
    /// The result is tagged with `group`; pass the same group for every
    /// subject so the combined meshes stay in correspondence.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::BoneSet`] if any listed entry is missing.
    pub fn combined(&self, subject: usize, labels: &[i32], group: CorrespondenceGroup) -> PipelineResult<Mesh> {
        let parts = labels
            .iter()
            .map(|&label| self.require(label, subject))
            .collect::<PipelineResult<Vec<_>>>()?;
        Ok(Mesh::combine(parts).with_group(group))
    }
}

impl FromIterator<(i32, Vec<Mesh>)> for BoneSet {
    fn from_iter<T: IntoIterator<Item = (i32, Vec<Mesh>)>>(iter: T) -> Self {
        Self {
            bones: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use shape_types::{unit_cube, Vector3};

    fn shifted_cube(dx: f64) -> Mesh {
        let mut mesh = unit_cube();
        mesh.translate(Vector3::new(dx, 0.0, 0.0));
        mesh
    }

    #[test]
    fn subject_counts_must_agree() {
        let mut set = BoneSet::new();
        set.insert(1, vec![unit_cube(), unit_cube()]);
        set.insert(2, vec![unit_cube(), unit_cube()]);
        assert_eq!(set.subjects().unwrap(), 2);
        set.insert(3, vec![unit_cube()]);
        assert!(matches!(set.subjects(), Err(PipelineError::BoneSet(_))));
    }

    #[test]
    fn replace_swaps_whole_entry() {
        let mut set: BoneSet = [(1, vec![unit_cube()])].into_iter().collect();
        let old = set.replace(1, 0, shifted_cube(5.0)).unwrap();
        assert_eq!(old.vertices[0].position.x, 0.0);
        assert_eq!(set.get(1, 0).unwrap().vertices[0].position.x, 5.0);
        assert!(set.replace(1, 1, unit_cube()).is_err());
        assert!(set.replace(9, 0, unit_cube()).is_err());
    }

    #[test]
    fn combined_appends_in_label_order() {
        let set: BoneSet = [(2, vec![shifted_cube(3.0)]), (1, vec![unit_cube()])]
            .into_iter()
            .collect();
        let group = CorrespondenceGroup::fresh();
        let mesh = set.combined(0, &set.labels(), group).unwrap();
        assert_eq!(mesh.vertices.len(), 16);
        assert_eq!(mesh.faces.len(), 24);
        assert_eq!(mesh.vertices[0].position.x, 0.0);
        assert_eq!(mesh.vertices[8].position.x, 3.0);
        assert_eq!(mesh.group, group);
        assert!(mesh.validate().is_ok());
        assert!(set.combined(1, &[1], group).is_err());
    }
}
