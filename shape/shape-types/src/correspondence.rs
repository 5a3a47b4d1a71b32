//! Correspondence-group tags.

use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

static NEXT_GROUP: AtomicU64 = AtomicU64::new(1);

/// Identifies a family of meshes that are in point correspondence.
///
/// Two meshes are in correspondence when point `i` on each refers to the same
/// anatomical location. Meshes that share an assigned group are guaranteed by
/// construction to have been derived from the same point numbering, so they may
/// be stacked into a shape model or combined point-by-point.
///
/// # Example
///
/// ```
/// use shape_types::CorrespondenceGroup;
///
/// let a = CorrespondenceGroup::fresh();
/// let b = CorrespondenceGroup::fresh();
/// assert!(a.compatible_with(&a));
/// assert!(!a.compatible_with(&b));
/// assert!(!CorrespondenceGroup::Unassigned.compatible_with(&CorrespondenceGroup::Unassigned));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CorrespondenceGroup {
    /// Point IDs carry no correspondence guarantee.
    #[default]
    Unassigned,
    /// Member of the group with this identifier.
    Group(u64),
}

impl CorrespondenceGroup {
    /// Mint a new group identifier, unique within this process.
    #[must_use]
    pub fn fresh() -> Self {
        Self::Group(NEXT_GROUP.fetch_add(1, Ordering::Relaxed))
    }

    /// Whether this tag names a group.
    #[inline]
    #[must_use]
    pub const fn is_assigned(&self) -> bool {
        matches!(self, Self::Group(_))
    }

    /// The group identifier, if assigned.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> Option<u64> {
        match self {
            Self::Unassigned => None,
            Self::Group(id) => Some(*id),
        }
    }

    /// Whether two tags name the same assigned group.
    ///
    /// `Unassigned` is never compatible with anything, itself included.
    #[inline]
    #[must_use]
    pub fn compatible_with(&self, other: &Self) -> bool {
        self.is_assigned() && self == other
    }
}

impl std::fmt::Display for CorrespondenceGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unassigned => write!(f, "unassigned"),
            Self::Group(id) => write!(f, "group #{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_groups_are_distinct() {
        let a = CorrespondenceGroup::fresh();
        let b = CorrespondenceGroup::fresh();
        assert_ne!(a, b);
        assert!(a.is_assigned());
        assert!(a.id().is_some());
    }

    #[test]
    fn unassigned_is_default() {
        let g = CorrespondenceGroup::default();
        assert_eq!(g, CorrespondenceGroup::Unassigned);
        assert!(g.id().is_none());
        assert_eq!(g.to_string(), "unassigned");
    }
}
