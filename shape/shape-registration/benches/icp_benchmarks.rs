//! Benchmarks for ICP registration.
//!
//! Run with: cargo bench -p shape-registration
//!
//! To compare against baseline:
//! 1. First run: cargo bench -p shape-registration -- --save-baseline main
//! 2. After changes: cargo bench -p shape-registration -- --baseline main

#![allow(missing_docs, clippy::cast_precision_loss, clippy::unwrap_used)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nalgebra::{Point3, UnitQuaternion, Vector3};
use shape_registration::{apply_transform_to_other, icp_align, IcpMode, IcpParams, RigidTransform};
use shape_types::Mesh;

// =============================================================================
// Test Shape Generation
// =============================================================================

/// Fibonacci points on an ellipsoid, a stand-in for a smooth bone surface.
fn ellipsoid(n: usize) -> Mesh {
    let golden = std::f64::consts::PI * (3.0 - 5.0_f64.sqrt());
    Mesh::from_points((0..n).map(|i| {
        let z = 1.0 - 2.0 * (i as f64 + 0.5) / n as f64;
        let r = (1.0 - z * z).sqrt();
        let theta = golden * i as f64;
        Point3::new(30.0 * r * theta.cos(), 20.0 * r * theta.sin(), 12.0 * z)
    }))
}

fn perturbed(mesh: &Mesh) -> Mesh {
    let t = RigidTransform::from_rotation(
        UnitQuaternion::from_euler_angles(0.05, -0.04, 0.06),
        Vector3::new(4.0, -3.0, 2.0),
    );
    apply_transform_to_other(&t, mesh)
}

// =============================================================================
// ICP Benchmarks
// =============================================================================

fn bench_icp(c: &mut Criterion) {
    let mut group = c.benchmark_group("ICP");
    group.sample_size(20);

    for n in [1_000, 5_000, 20_000] {
        let source = ellipsoid(n);
        let target = perturbed(&source);
        group.throughput(Throughput::Elements(n as u64));

        for mode in [IcpMode::Rigid, IcpMode::Similarity, IcpMode::Affine] {
            let params = IcpParams::default().with_mode(mode).with_max_iterations(30);
            group.bench_with_input(
                BenchmarkId::new(mode.to_string(), n),
                &(&source, &target),
                |b, (source, target)| {
                    b.iter(|| icp_align(black_box(source), black_box(target), &params).unwrap());
                },
            );
        }
    }

    group.finish();
}

// =============================================================================
// Criterion Setup
// =============================================================================

criterion_group!(benches, bench_icp);
criterion_main!(benches);
