//! Algebraic properties of the shape model.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::cast_precision_loss)]

use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shape_model::{
    CoefficientInterpolator, CoefficientTable, ModelError, ModelParams, ShapeModel, COEFFICIENTS_FILE,
    FILENAMES_FILE,
};
use shape_types::{CorrespondenceGroup, Mesh, Point3, Vector3};

/// A bumpy closed-ish point set; each call perturbs the same base shape so
/// the meshes are distinct but plausible members of one population.
fn population(n: usize, points: usize, seed: u64) -> Vec<Mesh> {
    let mut rng = StdRng::seed_from_u64(seed);
    let group = CorrespondenceGroup::fresh();
    let base: Vec<Point3<f64>> = (0..points)
        .map(|i| {
            let t = i as f64 / points as f64 * std::f64::consts::TAU;
            Point3::new(10.0 * t.cos(), 6.0 * t.sin(), 2.0 * (3.0 * t).sin())
        })
        .collect();
    (0..n)
        .map(|_| {
            let offset = Vector3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), 0.0);
            Mesh::from_points(base.iter().map(|p| {
                let noise = Vector3::new(
                    rng.gen_range(-0.3..0.3),
                    rng.gen_range(-0.3..0.3),
                    rng.gen_range(-0.3..0.3),
                );
                p + offset + noise
            }))
            .with_group(group)
        })
        .collect()
}

fn assert_same_points(a: &Mesh, b: &Mesh, epsilon: f64) {
    assert_eq!(a.vertices.len(), b.vertices.len());
    for (p, q) in a.positions().zip(b.positions()) {
        assert_relative_eq!(*p, *q, epsilon = epsilon);
    }
}

#[test]
fn fit_inverts_parameterize() {
    let mut rng = StdRng::seed_from_u64(11);
    for modes in 1..=5 {
        let training = population(modes + 1, 40, 100 + modes as u64);
        let model = ShapeModel::build(&training, &ModelParams::default()).unwrap();
        assert_eq!(model.num_modes(), modes);

        let coeffs: Vec<f64> = (0..modes).map(|_| rng.gen_range(-3.0..3.0)).collect();
        let shape = model.parameterize(&coeffs).unwrap();
        let fitted = model.fit(&shape).unwrap();
        for (a, b) in coeffs.iter().zip(&fitted) {
            assert_relative_eq!(*a, *b, epsilon = 1e-8);
        }
    }
}

#[test]
fn training_shapes_reconstruct_exactly() {
    let training = population(6, 30, 7);
    let model = ShapeModel::build(&training, &ModelParams::default()).unwrap();
    for mesh in &training {
        let coeffs = model.fit(mesh).unwrap();
        let rebuilt = model.parameterize(&coeffs).unwrap();
        assert_same_points(&rebuilt, mesh, 1e-8);
    }
}

#[test]
fn identical_meshes_give_zero_variance() {
    let one = population(1, 25, 3).remove(0);
    let training = vec![one.clone(), one.clone(), one.clone(), one];
    let model = ShapeModel::build(&training, &ModelParams::default()).unwrap();

    assert_eq!(model.retained_modes(), 3);
    assert!(model.eigenvalues().iter().all(|ev| ev.abs() < 1e-12));

    let mean = model.mean_shape();
    for coeffs in [vec![5.0], vec![-2.0, 7.5, 100.0]] {
        let shape = model.parameterize(&coeffs).unwrap();
        assert_same_points(&shape, &mean, 1e-12);
    }
    assert_same_points(&mean, &training[0], 1e-12);
}

#[test]
fn mismatched_point_count_rejected_before_decomposition() {
    let mut training = population(4, 20, 5);
    training.push(Mesh::from_points(vec![Point3::origin(); 19]));
    let err = ShapeModel::build(&training, &ModelParams::default()).unwrap_err();
    assert!(matches!(
        err,
        ModelError::CorrespondenceMismatch {
            index: 4,
            expected: 20,
            actual: 19
        }
    ));
}

#[test]
fn fitted_coefficients_export_and_interpolate() {
    let training = population(5, 30, 21);
    let model = ShapeModel::build(&training, &ModelParams::default()).unwrap();
    let table = model.fit_all(&training).unwrap();
    assert_eq!(table.len(), 5);
    assert_eq!(table.num_modes(), 4);

    let dir = tempfile::tempdir().unwrap();
    let names: Vec<String> = (0..5).map(|i| format!("pose{i}.ply")).collect();
    table.write(dir.path(), &names).unwrap();
    assert_eq!(
        std::fs::read_to_string(dir.path().join(FILENAMES_FILE)).unwrap().lines().count(),
        5
    );

    let back = CoefficientTable::read(&dir.path().join(COEFFICIENTS_FILE)).unwrap();
    assert_eq!(back.num_modes(), 4);
    for (a, b) in back.rows().iter().flatten().zip(table.rows().iter().flatten()) {
        assert!((a - b).abs() <= 5e-7);
    }

    // A curve of full order passes through every sample.
    let curves = CoefficientInterpolator::fit(&table, 4).unwrap();
    let middle = curves.evaluate(0.0);
    for (a, b) in middle.iter().zip(table.row(2).unwrap()) {
        assert_relative_eq!(*a, *b, epsilon = 1e-6);
    }
}
