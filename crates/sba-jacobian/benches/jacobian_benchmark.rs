//! Schur Jacobian assembly benchmark
//!
//! Measures serial and parallel assembly on synthetic scenes where every view observes
//! every point through its own unknown pinhole camera.
//!
//! ## Usage
//!
//! ```bash
//! cargo bench --bench jacobian_benchmark
//! ```

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use nalgebra::{Isometry3, Point3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sba_jacobian::{
    CameraModel, Estimate, PinholeCamera, SceneCodec, SceneObservations, SceneStructureMetric,
    SchurJacobian, SchurJacobianConfig,
};
use std::hint::black_box;
use std::sync::Arc;

/// Random scene with `num_views` cameras on a small arc looking at `num_points` points.
fn synthetic_scene(num_views: usize, num_points: usize) -> (SceneStructureMetric, SceneObservations) {
    let mut rng = StdRng::seed_from_u64(2024);
    let mut structure = SceneStructureMetric::new(false);
    let mut observations = SceneObservations::new(num_views);

    let points: Vec<Vector3<f64>> = (0..num_points)
        .map(|_| {
            Vector3::new(
                rng.random_range(-2.0..2.0),
                rng.random_range(-2.0..2.0),
                rng.random_range(8.0..12.0),
            )
        })
        .collect();
    for p in &points {
        structure.add_point(*p);
    }

    for view in 0..num_views {
        let camera = PinholeCamera::new(600.0, 600.0, 320.0, 240.0).expect("valid intrinsics");
        let pose = Isometry3::new(
            Vector3::new(0.2 * view as f64, 0.0, 0.0),
            Vector3::new(0.0, -0.02 * view as f64, 0.0),
        );
        for (index, p) in points.iter().enumerate() {
            let p_cam = pose.transform_point(&Point3::from(*p)).coords;
            if let Ok(pixel) = camera.project(&p_cam) {
                observations.add(view, index, pixel);
            }
        }
        let camera = structure.add_camera(Estimate::Unknown(Box::new(camera)));
        structure.add_view(camera, Estimate::Unknown(pose));
    }

    (structure, observations)
}

fn jacobian_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("schur_jacobian");

    for &(num_views, num_points) in &[(10, 1_000), (50, 5_000)] {
        let (structure, observations) = synthetic_scene(num_views, num_points);
        let structure = Arc::new(structure);
        let observations = Arc::new(observations);

        for parallel in [false, true] {
            let config = SchurJacobianConfig::new()
                .with_parallel(parallel)
                .with_parallel_threshold(0);
            let mut jacobian = SchurJacobian::new(config);
            jacobian
                .configure(structure.clone(), observations.clone())
                .expect("valid scene");
            let parameters =
                SceneCodec::encode(&structure, jacobian.layout().expect("configured"));

            let name = if parallel { "parallel" } else { "serial" };
            let id = BenchmarkId::new(name, format!("{num_views}x{num_points}"));
            group.bench_with_input(id, &parameters, |b, parameters| {
                b.iter(|| black_box(jacobian.process(parameters).expect("evaluation")))
            });
        }
    }

    group.finish();
}

criterion_group!(benches, jacobian_benchmark);
criterion_main!(benches);
