//! Metric scene structure: points, views and cameras, each either known or unknown.

use crate::jacobian::JacobianError;
use nalgebra::{Isometry3, Vector3, Vector4};
use sba_camera_models::CameraModel;

/// A value that is either fixed or being estimated.
///
/// Both variants carry the current value. Unknown values are the ones encoded into the
/// optimizer's parameter vector.
#[derive(Debug, Clone, PartialEq)]
pub enum Estimate<T> {
    Known(T),
    Unknown(T),
}

impl<T> Estimate<T> {
    pub fn value(&self) -> &T {
        match self {
            Estimate::Known(v) | Estimate::Unknown(v) => v,
        }
    }

    pub fn value_mut(&mut self) -> &mut T {
        match self {
            Estimate::Known(v) | Estimate::Unknown(v) => v,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Estimate::Known(_))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Estimate::Unknown(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Estimate::Known(v) | Estimate::Unknown(v) => v,
        }
    }
}

/// A 3D point, Euclidean `(x, y, z)` or homogeneous `(x, y, z, w)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScenePoint {
    Euclidean(Vector3<f64>),
    Homogeneous(Vector4<f64>),
}

impl ScenePoint {
    /// Number of coordinates, 3 or 4.
    pub fn dimension(&self) -> usize {
        match self {
            ScenePoint::Euclidean(_) => 3,
            ScenePoint::Homogeneous(_) => 4,
        }
    }

    pub fn coordinates(&self) -> &[f64] {
        match self {
            ScenePoint::Euclidean(p) => p.as_slice(),
            ScenePoint::Homogeneous(p) => p.as_slice(),
        }
    }

    /// Overwrite the coordinates from a slice of [`ScenePoint::dimension`] values.
    pub(crate) fn set_coordinates(&mut self, values: &[f64]) {
        match self {
            ScenePoint::Euclidean(p) => p.copy_from_slice(values),
            ScenePoint::Homogeneous(p) => p.copy_from_slice(values),
        }
    }

    /// Dehomogenized position. Points at infinity (`w == 0`) produce non-finite values.
    pub fn to_euclidean(&self) -> Vector3<f64> {
        match self {
            ScenePoint::Euclidean(p) => *p,
            ScenePoint::Homogeneous(p) => p.xyz() / p.w,
        }
    }
}

/// A view: the camera that captured it and its world-to-view transform.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneView {
    pub camera: usize,
    pub world_to_view: Estimate<Isometry3<f64>>,
}

/// A camera and its intrinsic model.
#[derive(Debug, Clone)]
pub struct SceneCamera {
    pub model: Estimate<Box<dyn CameraModel>>,
}

impl SceneCamera {
    /// Number of intrinsic parameters contributed to the parameter vector.
    pub fn unknown_parameter_count(&self) -> usize {
        match &self.model {
            Estimate::Known(_) => 0,
            Estimate::Unknown(model) => model.intrinsic_count(),
        }
    }
}

/// Metric scene: every point uses the same representation, selected at construction.
#[derive(Debug, Clone, Default)]
pub struct SceneStructureMetric {
    homogeneous: bool,
    pub points: Vec<ScenePoint>,
    pub views: Vec<SceneView>,
    pub cameras: Vec<SceneCamera>,
}

impl SceneStructureMetric {
    /// Empty structure whose points are homogeneous when `homogeneous` is set.
    pub fn new(homogeneous: bool) -> Self {
        Self {
            homogeneous,
            ..Self::default()
        }
    }

    pub fn is_homogeneous(&self) -> bool {
        self.homogeneous
    }

    /// Coordinates per point, 3 or 4.
    pub fn point_dim(&self) -> usize {
        if self.homogeneous { 4 } else { 3 }
    }

    /// Append a Euclidean point and return its index.
    pub fn add_point(&mut self, position: Vector3<f64>) -> usize {
        self.points.push(ScenePoint::Euclidean(position));
        self.points.len() - 1
    }

    /// Append a homogeneous point and return its index.
    pub fn add_point_homogeneous(&mut self, position: Vector4<f64>) -> usize {
        self.points.push(ScenePoint::Homogeneous(position));
        self.points.len() - 1
    }

    /// Append a camera and return its index.
    pub fn add_camera(&mut self, model: Estimate<Box<dyn CameraModel>>) -> usize {
        self.cameras.push(SceneCamera { model });
        self.cameras.len() - 1
    }

    /// Append a view of `camera` and return its index.
    pub fn add_view(&mut self, camera: usize, world_to_view: Estimate<Isometry3<f64>>) -> usize {
        self.views.push(SceneView {
            camera,
            world_to_view,
        });
        self.views.len() - 1
    }

    pub fn unknown_view_count(&self) -> usize {
        self.views
            .iter()
            .filter(|v| v.world_to_view.is_unknown())
            .count()
    }

    pub fn unknown_camera_count(&self) -> usize {
        self.cameras.iter().filter(|c| c.model.is_unknown()).count()
    }

    /// Total number of intrinsic parameters over all unknown cameras.
    pub fn unknown_camera_parameter_count(&self) -> usize {
        self.cameras
            .iter()
            .map(SceneCamera::unknown_parameter_count)
            .sum()
    }

    /// Check point dimensionality and camera references.
    pub fn validate(&self) -> Result<(), JacobianError> {
        let expected = self.point_dim();
        if let Some((index, point)) = self
            .points
            .iter()
            .enumerate()
            .find(|(_, p)| p.dimension() != expected)
        {
            return Err(JacobianError::Configuration(format!(
                "point {index} has {} coordinates but the structure uses {expected}",
                point.dimension()
            )));
        }

        if let Some((index, view)) = self
            .views
            .iter()
            .enumerate()
            .find(|(_, v)| v.camera >= self.cameras.len())
        {
            return Err(JacobianError::Configuration(format!(
                "view {index} references camera {} but only {} cameras exist",
                view.camera,
                self.cameras.len()
            )));
        }

        Ok(())
    }
}
