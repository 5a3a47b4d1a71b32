//! The propagate pass must see the reference bone before the reference pass
//! moves it.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::cast_precision_loss)]

use shape_pipeline::{BoneSet, Pass, PoseAlignment, RegistrationPlan};
use shape_registration::IcpParams;
use shape_types::{Mesh, Point3, Vector3};

const REFERENCE: i32 = 2;

/// Points spread evenly over an ellipsoid surface.
fn ellipsoid(centre: Point3<f64>, radii: Vector3<f64>, count: usize) -> Mesh {
    let golden = std::f64::consts::PI * (3.0 - 5.0_f64.sqrt());
    Mesh::from_points((0..count).map(|i| {
        let y = 1.0 - 2.0 * (i as f64 + 0.5) / count as f64;
        let r = (1.0 - y * y).sqrt();
        let theta = golden * i as f64;
        centre + Vector3::new(r * theta.cos() * radii.x, y * radii.y, r * theta.sin() * radii.z)
    }))
}

fn offset(mesh: &Mesh, by: Vector3<f64>) -> Mesh {
    let mut mesh = mesh.clone();
    mesh.translate(by);
    mesh
}

/// Two bones in three subjects; each subject sits at its own offset.
fn bone_set() -> BoneSet {
    let small = ellipsoid(Point3::new(0.0, 0.0, 20.0), Vector3::new(4.0, 3.0, 2.5), 300);
    let large = ellipsoid(Point3::origin(), Vector3::new(10.0, 7.0, 5.0), 400);
    let offsets = [
        Vector3::zeros(),
        Vector3::new(3.0, -1.0, 2.0),
        Vector3::new(-2.0, 4.0, 1.0),
    ];
    [
        (1, offsets.iter().map(|&o| offset(&small, o)).collect::<Vec<_>>()),
        (REFERENCE, offsets.iter().map(|&o| offset(&large, o)).collect::<Vec<_>>()),
    ]
    .into_iter()
    .collect()
}

fn run(order: [Pass; 3]) -> BoneSet {
    let plan = RegistrationPlan::new(REFERENCE, IcpParams::default(), PoseAlignment::ReferenceOntoSubject);
    let mut bones = bone_set();
    for pass in order {
        plan.run_pass(&mut bones, pass, None).unwrap();
    }
    bones
}

fn max_difference(a: &Mesh, b: &Mesh) -> f64 {
    a.positions()
        .zip(b.positions())
        .map(|(p, q)| (p - q).norm())
        .fold(0.0, f64::max)
}

#[test]
fn swapping_propagate_and_reference_changes_result() {
    let ordered = run([Pass::Pose, Pass::Propagate, Pass::Reference]);
    let swapped = run([Pass::Pose, Pass::Reference, Pass::Propagate]);

    let differs = (0..3).any(|subject| {
        max_difference(ordered.get(1, subject).unwrap(), swapped.get(1, subject).unwrap()) > 1e-3
    });
    assert!(differs, "pass order had no effect on the propagated bone");

    // The reference pass reads only the reference bone, which the propagate
    // pass never writes, so the reference bone itself is order-independent.
    for subject in 0..3 {
        let d = max_difference(
            ordered.get(REFERENCE, subject).unwrap(),
            swapped.get(REFERENCE, subject).unwrap(),
        );
        assert!(d < 1e-9, "subject {subject}: {d}");
    }
}

#[test]
fn protocol_order_is_pose_propagate_reference() {
    let plan = RegistrationPlan::new(REFERENCE, IcpParams::default(), PoseAlignment::ReferenceOntoSubject);
    let mut bones = bone_set();
    let steps = plan.register(&mut bones, None).unwrap();

    let passes: Vec<Pass> = steps.iter().map(|s| s.pass).collect();
    let mut sorted = passes.clone();
    sorted.sort();
    assert_eq!(passes, sorted);

    assert_eq!(steps.iter().filter(|s| s.pass == Pass::Pose).count(), 6);
    assert!(steps
        .iter()
        .filter(|s| s.pass == Pass::Propagate)
        .all(|s| s.updated.label == 1 && s.target.label == REFERENCE));
    assert!(steps
        .iter()
        .filter(|s| s.pass == Pass::Reference)
        .all(|s| s.updated.label == REFERENCE && s.updated == s.target));
}

#[test]
fn registered_bones_share_point_numbering() {
    let bones = run(Pass::ALL);
    for label in [1, REFERENCE] {
        let meshes = bones.meshes(label).unwrap();
        assert!(meshes.iter().all(|m| m.vertices.len() == meshes[0].vertices.len()));
        assert!(meshes.iter().all(|m| m.group.compatible_with(&meshes[0].group)));
    }
}
