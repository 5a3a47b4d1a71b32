//! Labeled 3D volume.

use crate::{TypesError, TypesResult};
use nalgebra::{Point3, Vector3};

/// An immutable 3D image of integer labels with voxel geometry.
///
/// Voxels are stored with x varying fastest, then y, then z. Voxel `(i, j, k)`
/// sits at world position `origin + (i * sx, j * sy, k * sz)`.
///
/// # Example
///
/// ```
/// use shape_types::{LabelVolume, Point3, Vector3};
///
/// let volume = LabelVolume::from_fn([4, 4, 4], Vector3::new(1.0, 1.0, 2.0), Point3::origin(), |x, y, z| {
///     i32::from(x == 1 && y == 1 && z == 1)
/// })
/// .unwrap();
///
/// assert_eq!(volume.labels_present(), vec![0, 1]);
/// assert_eq!(volume.count_label(1), 1);
/// assert_eq!(volume.voxel_to_world(1.0, 1.0, 1.0), Point3::new(1.0, 1.0, 2.0));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LabelVolume {
    dims: [usize; 3],
    spacing: Vector3<f64>,
    origin: Point3<f64>,
    data: Vec<i32>,
}

impl LabelVolume {
    /// Create a volume from raw voxel data.
    ///
    /// # Errors
    ///
    /// - [`TypesError::VolumeSizeMismatch`] if `data.len()` is not the product of `dims`.
    /// - [`TypesError::InvalidSpacing`] if any spacing is not finite and positive.
    pub fn new(
        dims: [usize; 3],
        spacing: Vector3<f64>,
        origin: Point3<f64>,
        data: Vec<i32>,
    ) -> TypesResult<Self> {
        let expected = dims[0] * dims[1] * dims[2];
        if data.len() != expected {
            return Err(TypesError::VolumeSizeMismatch {
                dims,
                expected,
                actual: data.len(),
            });
        }
        if spacing.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(TypesError::InvalidSpacing {
                x: spacing.x,
                y: spacing.y,
                z: spacing.z,
            });
        }
        Ok(Self {
            dims,
            spacing,
            origin,
            data,
        })
    }

    /// Create a volume by evaluating `f(x, y, z)` at every voxel.
    ///
    /// # Errors
    ///
    /// Same as [`LabelVolume::new`].
    pub fn from_fn(
        dims: [usize; 3],
        spacing: Vector3<f64>,
        origin: Point3<f64>,
        f: impl Fn(usize, usize, usize) -> i32,
    ) -> TypesResult<Self> {
        let mut data = Vec::with_capacity(dims[0] * dims[1] * dims[2]);
        for z in 0..dims[2] {
            for y in 0..dims[1] {
                for x in 0..dims[0] {
                    data.push(f(x, y, z));
                }
            }
        }
        Self::new(dims, spacing, origin, data)
    }

    /// Voxel counts along x, y and z.
    #[inline]
    #[must_use]
    pub const fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Voxel spacing along x, y and z.
    #[inline]
    #[must_use]
    pub const fn spacing(&self) -> Vector3<f64> {
        self.spacing
    }

    /// World position of voxel (0, 0, 0).
    #[inline]
    #[must_use]
    pub const fn origin(&self) -> Point3<f64> {
        self.origin
    }

    /// Raw voxel labels, x fastest.
    #[inline]
    #[must_use]
    pub fn data(&self) -> &[i32] {
        &self.data
    }

    /// Total number of voxels.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the volume has no voxels.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Label at a voxel, `None` outside the volume.
    #[inline]
    #[must_use]
    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<i32> {
        if x >= self.dims[0] || y >= self.dims[1] || z >= self.dims[2] {
            return None;
        }
        self.data
            .get((z * self.dims[1] + y) * self.dims[0] + x)
            .copied()
    }

    /// Map (possibly fractional) voxel coordinates to world space.
    #[inline]
    #[must_use]
    pub fn voxel_to_world(&self, x: f64, y: f64, z: f64) -> Point3<f64> {
        self.origin + Vector3::new(x * self.spacing.x, y * self.spacing.y, z * self.spacing.z)
    }

    /// Sorted distinct labels present in the volume.
    #[must_use]
    pub fn labels_present(&self) -> Vec<i32> {
        let mut labels = self.data.clone();
        labels.sort_unstable();
        labels.dedup();
        labels
    }

    /// Smallest label in the volume, conventionally the background.
    #[must_use]
    pub fn background(&self) -> Option<i32> {
        self.data.iter().copied().min()
    }

    /// Number of voxels equal to `label`.
    #[must_use]
    pub fn count_label(&self, label: i32) -> usize {
        self.data.iter().filter(|&&v| v == label).count()
    }

    /// A copy with voxel order reversed along one axis.
    ///
    /// Geometry (spacing, origin) is unchanged; only voxel contents move.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::InvalidAxis`] if `axis > 2`.
    pub fn flipped(&self, axis: usize) -> TypesResult<Self> {
        if axis > 2 {
            return Err(TypesError::InvalidAxis(axis));
        }
        let [nx, ny, nz] = self.dims;
        let mut data = Vec::with_capacity(self.data.len());
        for z in 0..nz {
            for y in 0..ny {
                for x in 0..nx {
                    let (sx, sy, sz) = match axis {
                        0 => (nx - 1 - x, y, z),
                        1 => (x, ny - 1 - y, z),
                        _ => (x, y, nz - 1 - z),
                    };
                    data.push(self.data[(sz * ny + sy) * nx + sx]);
                }
            }
        }
        Ok(Self {
            dims: self.dims,
            spacing: self.spacing,
            origin: self.origin,
            data,
        })
    }
}
