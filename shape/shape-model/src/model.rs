//! Principal component shape model.

use nalgebra::{DMatrix, DVector, Point3, Vector3};
use shape_types::{CorrespondenceGroup, Mesh, Vertex};
use tracing::{debug, info};

use crate::error::{ModelError, ModelResult};
use crate::params::ModelParams;
use crate::table::CoefficientTable;

/// Linear shape model `shape = mean + Σ cₖ·eₖ` over meshes in point
/// correspondence.
///
/// Each training mesh is flattened to a `3P` vector `[x₀, y₀, z₀, x₁, …]`.
/// The modes `eₖ` are the principal directions of the centred training
/// vectors, sorted by decreasing variance. A model built from `N` meshes
/// retains `min(N − 1, 3P)` modes; modes with no variance carry a zero
/// vector.
#[derive(Debug, Clone)]
pub struct ShapeModel {
    mean: DVector<f64>,
    /// `3P × retained` matrix whose columns are unit modes or zero.
    modes: DMatrix<f64>,
    eigenvalues: Vec<f64>,
    num_modes: usize,
    faces: Vec<[u32; 3]>,
    group: CorrespondenceGroup,
    training_count: usize,
    params: ModelParams,
}

impl ShapeModel {
    /// Builds a model from training meshes in point correspondence.
    ///
    /// All meshes must have the first mesh's point count, and meshes tagged
    /// with a correspondence group must agree on it; both are checked before
    /// any decomposition. The model takes the shared group, or a fresh one
    /// when no input is tagged. Faces come from the first mesh.
    ///
    /// # Errors
    ///
    /// - [`ModelError::NoMeshes`] for an empty input
    /// - [`ModelError::CorrespondenceMismatch`] for a differing point count
    /// - [`ModelError::GroupMismatch`] for meshes tagged with different groups
    /// - [`ModelError::InvalidParameter`] for bad parameters or meshes without points
    /// - [`ModelError::SvdFailed`] if the decomposition fails
    ///
    /// # Example
    ///
    /// ```
    /// use shape_model::{ModelParams, ShapeModel};
    /// use shape_types::unit_cube;
    ///
    /// let small = unit_cube();
    /// let mut large = unit_cube();
    /// large.map_positions(|p| *p * 2.0);
    ///
    /// let model = ShapeModel::build(&[small, large], &ModelParams::default()).unwrap();
    /// assert_eq!(model.num_modes(), 1);
    ///
    /// let middle = model.parameterize(&[0.0]).unwrap();
    /// assert!((middle.vertices[6].position.x - 1.5).abs() < 1e-12);
    /// ```
    pub fn build(meshes: &[Mesh], params: &ModelParams) -> ModelResult<Self> {
        params.validate()?;
        let first = meshes.first().ok_or(ModelError::NoMeshes)?;
        let points = first.vertices.len();
        for (index, mesh) in meshes.iter().enumerate() {
            if mesh.vertices.len() != points {
                return Err(ModelError::CorrespondenceMismatch {
                    index,
                    expected: points,
                    actual: mesh.vertices.len(),
                });
            }
        }
        if points == 0 {
            return Err(ModelError::InvalidParameter(
                "training meshes have no points".to_string(),
            ));
        }
        let group = shared_group(meshes)?;

        let n = meshes.len();
        let dim = 3 * points;
        let mut data = DMatrix::<f64>::zeros(n, dim);
        for (row, mesh) in meshes.iter().enumerate() {
            for (i, p) in mesh.positions().enumerate() {
                data[(row, 3 * i)] = p.x;
                data[(row, 3 * i + 1)] = p.y;
                data[(row, 3 * i + 2)] = p.z;
            }
        }
        let mean: DVector<f64> = data.row_mean().transpose();
        for (c, mut column) in data.column_iter_mut().enumerate() {
            column.add_scalar_mut(-mean[c]);
        }

        let retained = (n - 1).min(dim);
        let mut modes = DMatrix::<f64>::zeros(dim, retained);
        let mut eigenvalues = vec![0.0; retained];

        if retained > 0 {
            let svd = data.svd(false, true);
            let v_t = svd.v_t.ok_or(ModelError::SvdFailed)?;
            let singular = svd.singular_values;
            let mut order: Vec<usize> = (0..singular.len()).collect();
            order.sort_by(|&a, &b| singular[b].total_cmp(&singular[a]));

            let tolerance = 1e-9 * mean.amax().max(1.0);
            #[allow(clippy::cast_precision_loss)]
            let dof = (n - 1) as f64;
            for (k, &source) in order.iter().take(retained).enumerate() {
                let s = singular[source];
                if s <= tolerance {
                    continue;
                }
                let mut column = v_t.row(source).transpose();
                // Sign convention: the largest-magnitude component is positive.
                if column[column.iamax()] < 0.0 {
                    column.neg_mut();
                }
                modes.set_column(k, &column);
                eigenvalues[k] = s * s / dof;
            }
        }

        let mut model = Self {
            mean,
            modes,
            eigenvalues,
            num_modes: retained,
            faces: first.faces.clone(),
            group,
            training_count: n,
            params: params.clone(),
        };
        model.num_modes = model.modes_required_for(params.variance_threshold);

        info!(
            meshes = n,
            points,
            retained,
            active = model.num_modes,
            total_variance = model.total_variance(),
            "Built shape model"
        );
        Ok(model)
    }

    /// Number of points per shape.
    #[must_use]
    pub fn num_points(&self) -> usize {
        self.mean.len() / 3
    }

    /// Number of training meshes.
    #[must_use]
    pub const fn training_count(&self) -> usize {
        self.training_count
    }

    /// Modes active for [`parameterize`](Self::parameterize) and [`fit`](Self::fit).
    #[must_use]
    pub const fn num_modes(&self) -> usize {
        self.num_modes
    }

    /// Modes retained by the decomposition, `min(N − 1, 3P)`.
    #[must_use]
    pub fn retained_modes(&self) -> usize {
        self.eigenvalues.len()
    }

    /// Variance along each retained mode, largest first.
    #[must_use]
    pub fn eigenvalues(&self) -> &[f64] {
        &self.eigenvalues
    }

    /// Sum of all eigenvalues.
    #[must_use]
    pub fn total_variance(&self) -> f64 {
        self.eigenvalues.iter().sum()
    }

    /// Correspondence group shared by the model and every shape it produces.
    #[must_use]
    pub const fn group(&self) -> CorrespondenceGroup {
        self.group
    }

    /// Parameters the model was built with.
    #[must_use]
    pub const fn params(&self) -> &ModelParams {
        &self.params
    }

    /// Fraction of total variance explained by each retained mode.
    ///
    /// All zeros when the training shapes are identical.
    #[must_use]
    pub fn explained_variance_ratio(&self) -> Vec<f64> {
        let total = self.total_variance();
        if total <= 0.0 {
            return vec![0.0; self.eigenvalues.len()];
        }
        self.eigenvalues.iter().map(|ev| ev / total).collect()
    }

    /// Smallest number of leading modes explaining at least `fraction` of
    /// the total variance.
    ///
    /// A fraction of 1 or more, or a model without variance, yields every
    /// retained mode.
    #[must_use]
    pub fn modes_required_for(&self, fraction: f64) -> usize {
        let total = self.total_variance();
        if total <= 0.0 || fraction >= 1.0 {
            return self.retained_modes();
        }
        let mut explained = 0.0;
        for (k, ev) in self.eigenvalues.iter().enumerate() {
            explained += ev;
            if explained >= fraction * total {
                return k + 1;
            }
        }
        self.retained_modes()
    }

    /// Per-point displacement of one retained mode.
    #[must_use]
    pub fn mode_vectors(&self, mode: usize) -> Option<Vec<Vector3<f64>>> {
        (mode < self.retained_modes()).then(|| {
            let values: Vec<f64> = self.modes.column(mode).iter().copied().collect();
            values
                .chunks_exact(3)
                .map(|c| Vector3::new(c[0], c[1], c[2]))
                .collect()
        })
    }

    /// The mean shape.
    #[must_use]
    pub fn mean_shape(&self) -> Mesh {
        self.to_mesh(&self.mean)
    }

    /// Shape for the given coefficients, `mean + Σ cₖ·eₖ`.
    ///
    /// Coefficient `k` applies to mode `k`; fewer coefficients than active
    /// modes leave the remaining modes at zero.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ModeCount`] if more coefficients are given than
    /// the model has active modes.
    pub fn parameterize(&self, coefficients: &[f64]) -> ModelResult<Mesh> {
        self.check_mode_count(coefficients.len())?;
        let mut shape = self.mean.clone();
        for (k, &c) in coefficients.iter().enumerate() {
            let weight = if self.params.scale_by_std_dev {
                c * self.eigenvalues[k].sqrt()
            } else {
                c
            };
            shape += self.modes.column(k) * weight;
        }
        Ok(self.to_mesh(&shape))
    }

    /// Coefficients of every active mode for `target`.
    ///
    /// # Errors
    ///
    /// See [`fit_modes`](Self::fit_modes).
    pub fn fit(&self, target: &Mesh) -> ModelResult<Vec<f64>> {
        self.fit_modes(target, self.num_modes)
    }

    /// Orthogonal projection of `target − mean` onto the first `count` modes.
    ///
    /// # Errors
    ///
    /// - [`ModelError::ModeCount`] if `count` exceeds the active modes
    /// - [`ModelError::CorrespondenceMismatch`] if the point count differs
    /// - [`ModelError::GroupMismatch`] if `target` is tagged with another group
    pub fn fit_modes(&self, target: &Mesh, count: usize) -> ModelResult<Vec<f64>> {
        self.check_mode_count(count)?;
        self.check_mesh(target, 0)?;
        Ok(self.project(target, count))
    }

    /// Fits every mesh and collects the coefficients into a table, one row
    /// per mesh in input order.
    ///
    /// # Errors
    ///
    /// As [`fit`](Self::fit); the error names the offending mesh index.
    pub fn fit_all(&self, meshes: &[Mesh]) -> ModelResult<CoefficientTable> {
        for (index, mesh) in meshes.iter().enumerate() {
            self.check_mesh(mesh, index)?;
        }
        let rows: Vec<Vec<f64>> = meshes.iter().map(|m| self.project(m, self.num_modes)).collect();
        debug!(meshes = meshes.len(), modes = self.num_modes, "Fitted shape coefficients");
        CoefficientTable::with_columns(rows, self.num_modes)
    }

    fn project(&self, target: &Mesh, count: usize) -> Vec<f64> {
        let mut diff = DVector::<f64>::zeros(self.mean.len());
        for (i, p) in target.positions().enumerate() {
            diff[3 * i] = p.x - self.mean[3 * i];
            diff[3 * i + 1] = p.y - self.mean[3 * i + 1];
            diff[3 * i + 2] = p.z - self.mean[3 * i + 2];
        }
        (0..count)
            .map(|k| {
                let c = self.modes.column(k).dot(&diff);
                if self.params.scale_by_std_dev {
                    let sd = self.eigenvalues[k].sqrt();
                    if sd > 0.0 {
                        c / sd
                    } else {
                        0.0
                    }
                } else {
                    c
                }
            })
            .collect()
    }

    fn check_mode_count(&self, requested: usize) -> ModelResult<()> {
        if requested > self.num_modes {
            return Err(ModelError::ModeCount {
                requested,
                available: self.num_modes,
            });
        }
        Ok(())
    }

    fn check_mesh(&self, mesh: &Mesh, index: usize) -> ModelResult<()> {
        if mesh.vertices.len() != self.num_points() {
            return Err(ModelError::CorrespondenceMismatch {
                index,
                expected: self.num_points(),
                actual: mesh.vertices.len(),
            });
        }
        if let (Some(expected), Some(actual)) = (self.group.id(), mesh.group.id()) {
            if expected != actual {
                return Err(ModelError::GroupMismatch {
                    index,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }

    fn to_mesh(&self, shape: &DVector<f64>) -> Mesh {
        let vertices = shape
            .as_slice()
            .chunks_exact(3)
            .map(|c| Vertex::new(Point3::new(c[0], c[1], c[2])))
            .collect();
        Mesh::from_parts(vertices, self.faces.clone()).with_group(self.group)
    }
}

impl std::fmt::Display for ShapeModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let explained: f64 = self
            .explained_variance_ratio()
            .iter()
            .take(self.num_modes)
            .sum();
        write!(
            f,
            "Shape model: {} meshes, {} points, {}/{} modes ({:.1}% variance)",
            self.training_count,
            self.num_points(),
            self.num_modes,
            self.retained_modes(),
            explained * 100.0
        )
    }
}

/// The one assigned group among `meshes`, or a fresh group if none is
/// tagged.
fn shared_group(meshes: &[Mesh]) -> ModelResult<CorrespondenceGroup> {
    let mut shared: Option<u64> = None;
    for (index, mesh) in meshes.iter().enumerate() {
        let Some(id) = mesh.group.id() else {
            continue;
        };
        match shared {
            None => shared = Some(id),
            Some(expected) if expected != id => {
                return Err(ModelError::GroupMismatch {
                    index,
                    expected,
                    actual: id,
                });
            }
            Some(_) => {}
        }
    }
    Ok(shared.map_or_else(CorrespondenceGroup::fresh, CorrespondenceGroup::Group))
}
