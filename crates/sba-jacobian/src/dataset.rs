//! Build a scene from a BAL dataset.

use crate::jacobian::JacobianError;
use crate::scene::{Estimate, SceneObservations, SceneStructureMetric};
use nalgebra::{Isometry3, Translation3, UnitQuaternion};
use sba_camera_models::BalPinholeCamera;
use sba_io::BalDataset;
use tracing::debug;

/// Convert `dataset` into a Euclidean scene where every pose, intrinsic and point is unknown.
///
/// Each BAL camera becomes one view with its own [`BalPinholeCamera`]. When `max_points`
/// is set only the first `max_points` points are kept, together with their observations.
/// Observations keep their file order within each view.
pub fn scene_from_bal(
    dataset: &BalDataset,
    max_points: Option<usize>,
) -> Result<(SceneStructureMetric, SceneObservations), JacobianError> {
    let num_points = max_points.map_or(dataset.points.len(), |n| n.min(dataset.points.len()));

    let mut structure = SceneStructureMetric::new(false);
    for point in &dataset.points[..num_points] {
        structure.add_point(point.position);
    }

    for cam in &dataset.cameras {
        let model = BalPinholeCamera::new(cam.focal_length, cam.k1, cam.k2)?;
        let camera = structure.add_camera(Estimate::Unknown(Box::new(model)));
        let pose = Isometry3::from_parts(
            Translation3::from(cam.translation),
            UnitQuaternion::from_scaled_axis(cam.rotation),
        );
        structure.add_view(camera, Estimate::Unknown(pose));
    }

    let mut observations = SceneObservations::new(dataset.cameras.len());
    for obs in &dataset.observations {
        if obs.point_index < num_points {
            observations.add(obs.camera_index, obs.point_index, obs.pixel);
        }
    }

    debug!(
        views = structure.views.len(),
        points = num_points,
        observations = observations.observation_count(),
        "built scene from BAL dataset"
    );

    Ok((structure, observations))
}
