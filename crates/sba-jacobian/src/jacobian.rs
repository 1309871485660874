//! Sparse Jacobian of the reprojection residuals, split for a Schur-complement solve.
//!
//! For every observation `k` of a point `X` from view `(R, T)` through camera `π`:
//!
//! ```text
//! p     = R·xyz + T·w              (w = 1 for Euclidean points)
//! r_k   = π(p) − observed          rows 2k (x) and 2k+1 (y)
//! G     = ∂π/∂p                     2×3 camera gradient
//! ```
//!
//! and the chain rule gives the blocks written by [`SchurJacobian::process`]:
//!
//! | unknown          | block   | columns                           | value                    |
//! | ---------------- | ------- | --------------------------------- | ------------------------ |
//! | point xyz        | `left`  | `d·point .. d·point+2`            | `G·R`                    |
//! | point w          | `left`  | `d·point+3` (homogeneous only)    | `G·T`                    |
//! | view rotation    | `right` | `view .. view+2`                  | `G·(∂R/∂vᵢ·xyz)`         |
//! | view translation | `right` | `view+3 .. view+5`                | `G·w`                    |
//! | camera           | `right` | `views + camera .. +K`            | `∂π/∂θ`                  |
//!
//! `left` holds the point parameters and `right` the view and camera parameters, in the
//! order of the parameter vector (see [`crate::layout`]).

use crate::layout::{ParameterLayout, ParameterSlot};
use crate::scene::{SceneObservations, SceneStructureMetric};
use crate::sparse::{SparseError, SparseMatrix, TripletAccumulator};
use nalgebra::{Matrix2x3, Matrix3, Vector3};
use rayon::prelude::*;
use sba_camera_models::{CameraModel, CameraModelError};
use sba_manifolds::RodriguesJacobian;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, trace};

/// Jacobian configuration and evaluation errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum JacobianError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Dimension mismatch in {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Jacobian evaluated before configure")]
    NotConfigured,

    #[error(transparent)]
    Sparse(#[from] SparseError),

    #[error("Camera model error: {0}")]
    Camera(#[from] CameraModelError),
}

impl JacobianError {
    /// Log the error with `tracing::error!` and return it.
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }

    /// Log the error together with the context that produced it, then return it.
    #[must_use]
    pub fn log_with_source<E: std::fmt::Debug>(self, source_error: E) -> Self {
        error!("{} | Source: {:?}", self, source_error);
        self
    }
}

/// Evaluation options for [`SchurJacobian`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchurJacobianConfig {
    /// Evaluate views concurrently with rayon
    pub parallel: bool,
    /// Minimum number of observations before the parallel path is used
    pub parallel_threshold: usize,
}

impl Default for SchurJacobianConfig {
    fn default() -> Self {
        Self {
            parallel: false,
            parallel_threshold: 1000,
        }
    }
}

impl SchurJacobianConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }
}

/// Check that `observations` matches `structure`: one list per view and valid point indices.
pub fn validate_scene(
    structure: &SceneStructureMetric,
    observations: &SceneObservations,
) -> Result<(), JacobianError> {
    structure.validate()?;

    if observations.views.len() != structure.views.len() {
        return Err(JacobianError::Configuration(format!(
            "{} observation lists for {} views",
            observations.views.len(),
            structure.views.len()
        )));
    }

    for (view, obs) in observations.iter() {
        if obs.point >= structure.points.len() {
            return Err(JacobianError::Configuration(format!(
                "view {view} observes point {} but only {} points exist",
                obs.point,
                structure.points.len()
            )));
        }
    }

    Ok(())
}

/// Reject a parameter vector whose length differs from the layout.
pub(crate) fn check_parameter_length(
    layout: &ParameterLayout,
    parameters: &[f64],
) -> Result<(), JacobianError> {
    if parameters.len() != layout.input_dimension() {
        return Err(JacobianError::DimensionMismatch {
            what: "parameter vector",
            expected: layout.input_dimension(),
            actual: parameters.len(),
        });
    }
    Ok(())
}

/// Copy the intrinsics of every unknown camera from the parameter vector into `cameras`.
pub(crate) fn decode_cameras(
    layout: &ParameterLayout,
    parameters: &[f64],
    cameras: &mut [Box<dyn CameraModel>],
) -> Result<(), JacobianError> {
    for (index, camera) in cameras.iter_mut().enumerate() {
        if let (ParameterSlot::Free { width, .. }, Some(start)) =
            (layout.cameras[index], layout.camera_offset(index))
        {
            camera.set_intrinsics(&parameters[start..start + width])?;
        }
    }
    Ok(())
}

/// Rotation and translation of one view for the current parameter vector.
pub(crate) struct ViewPose {
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
    /// Rotation derivatives and right-block column, unknown views only
    pub unknown: Option<(RodriguesJacobian, usize)>,
}

impl ViewPose {
    /// Decode view `view`: from the parameter vector when unknown, from the scene otherwise.
    pub(crate) fn decode(
        structure: &SceneStructureMetric,
        layout: &ParameterLayout,
        parameters: &[f64],
        view: usize,
    ) -> Self {
        match (layout.views[view], layout.view_offset(view)) {
            (ParameterSlot::Free { offset, .. }, Some(start)) => {
                let p = &parameters[start..start + 6];
                let derivative = RodriguesJacobian::from_rodrigues(&Vector3::new(p[0], p[1], p[2]));
                Self {
                    rotation: derivative.rotation,
                    translation: Vector3::new(p[3], p[4], p[5]),
                    unknown: Some((derivative, offset)),
                }
            }
            _ => {
                let pose = structure.views[view].world_to_view.value();
                Self {
                    rotation: pose.rotation.to_rotation_matrix().into_inner(),
                    translation: pose.translation.vector,
                    unknown: None,
                }
            }
        }
    }

    /// Camera-frame position of a point given by its `xyz` part and weight `w`.
    #[inline]
    pub(crate) fn transform(&self, xyz: &Vector3<f64>, w: f64) -> Vector3<f64> {
        self.rotation * xyz + self.translation * w
    }
}

/// Split stored point coordinates into `xyz` and the homogeneous weight.
#[inline]
pub(crate) fn split_point(coordinates: &[f64]) -> (Vector3<f64>, f64) {
    let xyz = Vector3::new(coordinates[0], coordinates[1], coordinates[2]);
    let w = coordinates.get(3).copied().unwrap_or(1.0);
    (xyz, w)
}

/// Borrowed inputs of one Jacobian evaluation.
struct Evaluation<'a> {
    structure: &'a SceneStructureMetric,
    observations: &'a SceneObservations,
    layout: &'a ParameterLayout,
    cameras: &'a [Box<dyn CameraModel>],
    parameters: &'a [f64],
}

impl Evaluation<'_> {
    /// Append the rows of every observation of `view`, starting at observation index `first`.
    fn accumulate_view(
        &self,
        view: usize,
        first: usize,
        left: &mut TripletAccumulator,
        right: &mut TripletAccumulator,
    ) -> Result<(), JacobianError> {
        let layout = self.layout;
        let homogeneous = layout.point_dim == 4;
        let pose = ViewPose::decode(self.structure, layout, self.parameters, view);

        let camera_index = self.structure.views[view].camera;
        let camera = &self.cameras[camera_index];
        let camera_block = match layout.cameras[camera_index] {
            ParameterSlot::Free { offset, width } => Some((layout.view_parameter_count() + offset, width)),
            ParameterSlot::Fixed => None,
        };

        for (i, obs) in self.observations.views[view].iter().enumerate() {
            let row_x = 2 * (first + i);
            let row_y = row_x + 1;

            let point_col = layout.point_offset(obs.point);
            let (xyz, w) =
                split_point(&self.parameters[point_col..point_col + layout.point_dim]);
            let p_cam = pose.transform(&xyz, w);

            let (gradient, intrinsic) = camera.gradient(&p_cam, camera_block.is_some());

            //============ Camera intrinsics
            if let Some((column, width)) = camera_block {
                // a missing gradient counts as zero columns
                let intrinsic = match intrinsic {
                    Some(intrinsic) if intrinsic.ncols() == width => intrinsic,
                    other => {
                        return Err(JacobianError::DimensionMismatch {
                            what: "intrinsic gradient width",
                            expected: width,
                            actual: other.map_or(0, |j| j.ncols()),
                        }
                        .log_with_source(format!(
                            "camera {camera_index} ({})",
                            camera.model_name()
                        )));
                    }
                };
                for j in 0..width {
                    right.add_item_checked(row_x, column + j, intrinsic[(0, j)])?;
                    right.add_item_checked(row_y, column + j, intrinsic[(1, j)])?;
                }
            }

            //============ Point
            add_row_pair(left, row_x, point_col, &(gradient * pose.rotation));
            if homogeneous {
                let g_t = gradient * pose.translation;
                left.add_item(row_x, point_col + 3, g_t.x);
                left.add_item(row_y, point_col + 3, g_t.y);
            }

            //============ View
            if let Some((derivative, column)) = &pose.unknown {
                for (axis, partial) in derivative.partials().into_iter().enumerate() {
                    let g = gradient * (partial * xyz);
                    right.add_item(row_x, column + axis, g.x);
                    right.add_item(row_y, column + axis, g.y);
                }
                for j in 0..3 {
                    right.add_item_checked(row_x, column + 3 + j, gradient[(0, j)] * w)?;
                    right.add_item(row_y, column + 3 + j, gradient[(1, j)] * w);
                }
            }
        }

        Ok(())
    }
}

/// Write a 2×3 block at rows `(row_x, row_x + 1)` and columns `col .. col + 3`.
#[inline]
fn add_row_pair(acc: &mut TripletAccumulator, row_x: usize, col: usize, block: &Matrix2x3<f64>) {
    for r in 0..2 {
        for c in 0..3 {
            acc.add_item(row_x + r, col + c, block[(r, c)]);
        }
    }
}

/// Scene, layout and per-view row offsets fixed by [`SchurJacobian::configure`].
#[derive(Debug)]
struct Configured {
    structure: Arc<SceneStructureMetric>,
    observations: Arc<SceneObservations>,
    layout: ParameterLayout,
    /// Index of the first observation of each view
    first_observation: Vec<usize>,
    observation_count: usize,
}

/// Buffers reused across evaluations.
#[derive(Debug, Default)]
struct Scratch {
    /// Copies of the scene cameras; unknown ones receive the decoded intrinsics
    cameras: Vec<Box<dyn CameraModel>>,
    left: TripletAccumulator,
    right: TripletAccumulator,
    /// Per-view `(left, right)` accumulators of the parallel path, one pair per view
    view_chunks: Vec<(TripletAccumulator, TripletAccumulator)>,
}

/// Sparse Jacobian of a metric bundle adjustment problem in Schur-complement form.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use nalgebra::{Isometry3, Vector2, Vector3};
/// use sba_camera_models::PinholeCamera;
/// use sba_jacobian::{Estimate, SceneCodec, SceneObservations, SceneStructureMetric, SchurJacobian};
///
/// let mut structure = SceneStructureMetric::new(false);
/// structure.add_point(Vector3::new(0.0, 0.0, 5.0));
/// let camera = structure.add_camera(Estimate::Known(Box::new(PinholeCamera::new(1.0, 1.0, 0.0, 0.0)?)));
/// structure.add_view(camera, Estimate::Unknown(Isometry3::identity()));
///
/// let mut observations = SceneObservations::new(1);
/// observations.add(0, 0, Vector2::new(0.0, 0.0));
///
/// let mut jacobian = SchurJacobian::default();
/// jacobian.configure(Arc::new(structure), Arc::new(observations))?;
/// let parameters = SceneCodec::encode(jacobian.structure().ok_or("configured")?, jacobian.layout().ok_or("configured")?);
///
/// let (left, right) = jacobian.process(&parameters)?;
/// assert_eq!((left.nrows(), left.ncols()), (2, 3));
/// assert_eq!((right.nrows(), right.ncols()), (2, 6));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Default)]
pub struct SchurJacobian {
    config: SchurJacobianConfig,
    state: Option<Configured>,
    scratch: Scratch,
}

impl SchurJacobian {
    pub fn new(config: SchurJacobianConfig) -> Self {
        Self {
            config,
            state: None,
            scratch: Scratch::default(),
        }
    }

    pub fn config(&self) -> &SchurJacobianConfig {
        &self.config
    }

    /// Fix the scene and derive the parameter layout.
    ///
    /// Must be called again whenever the known/unknown composition of the scene changes.
    ///
    /// # Errors
    ///
    /// [`JacobianError::Configuration`] when the observations do not match the structure
    /// (view count, point or camera index out of range, mixed point dimensionality).
    pub fn configure(
        &mut self,
        structure: Arc<SceneStructureMetric>,
        observations: Arc<SceneObservations>,
    ) -> Result<(), JacobianError> {
        validate_scene(&structure, &observations).map_err(JacobianError::log)?;

        let layout = ParameterLayout::new(&structure);

        let mut first_observation = Vec::with_capacity(observations.views.len());
        let mut observation_count = 0;
        for view in &observations.views {
            first_observation.push(observation_count);
            observation_count += view.len();
        }

        self.scratch.cameras = structure
            .cameras
            .iter()
            .map(|camera| camera.model.value().clone())
            .collect();

        debug!(
            points = structure.points.len(),
            views = structure.views.len(),
            unknown_views = structure.unknown_view_count(),
            cameras = structure.cameras.len(),
            unknown_cameras = structure.unknown_camera_count(),
            observations = observation_count,
            parameters = layout.input_dimension(),
            homogeneous = structure.is_homogeneous(),
            "configured Schur Jacobian"
        );

        self.state = Some(Configured {
            structure,
            observations,
            layout,
            first_observation,
            observation_count,
        });
        Ok(())
    }

    /// Number of parameters N.
    pub fn input_dimension(&self) -> usize {
        self.state
            .as_ref()
            .map_or(0, |state| state.layout.input_dimension())
    }

    /// Number of residuals M, twice the number of observations.
    pub fn output_dimension(&self) -> usize {
        self.state
            .as_ref()
            .map_or(0, |state| 2 * state.observation_count)
    }

    pub fn layout(&self) -> Option<&ParameterLayout> {
        self.state.as_ref().map(|state| &state.layout)
    }

    pub fn structure(&self) -> Option<&SceneStructureMetric> {
        self.state.as_ref().map(|state| state.structure.as_ref())
    }

    pub fn observations(&self) -> Option<&SceneObservations> {
        self.state.as_ref().map(|state| state.observations.as_ref())
    }

    /// Evaluate the Jacobian at `parameters`.
    ///
    /// Returns `(left, right)` where `left` is `M × (points · d)` and `right` is
    /// `M × (view parameters + camera parameters)`.
    ///
    /// # Errors
    ///
    /// - [`JacobianError::NotConfigured`] before the first [`SchurJacobian::configure`]
    /// - [`JacobianError::DimensionMismatch`] when `parameters` has the wrong length or a
    ///   camera returns an intrinsic gradient of the wrong width
    /// - [`JacobianError::Sparse`] when an entry falls outside the declared shape
    pub fn process(
        &mut self,
        parameters: &[f64],
    ) -> Result<(SparseMatrix, SparseMatrix), JacobianError> {
        let state = self.state.as_ref().ok_or(JacobianError::NotConfigured)?;
        let layout = &state.layout;
        check_parameter_length(layout, parameters).map_err(JacobianError::log)?;

        let Scratch {
            cameras,
            left,
            right,
            view_chunks,
        } = &mut self.scratch;

        let rows = 2 * state.observation_count;
        left.reshape(rows, layout.point_parameter_count());
        right.reshape(
            rows,
            layout.view_parameter_count() + layout.camera_parameter_count(),
        );

        decode_cameras(layout, parameters, cameras)?;

        let evaluation = Evaluation {
            structure: &state.structure,
            observations: &state.observations,
            layout,
            cameras: cameras.as_slice(),
            parameters,
        };
        let num_views = state.structure.views.len();

        if self.config.parallel && state.observation_count >= self.config.parallel_threshold {
            let (left_shape, right_shape) = (left.shape(), right.shape());
            view_chunks.resize_with(num_views, Default::default);
            view_chunks
                .par_iter_mut()
                .enumerate()
                .try_for_each(|(view, (view_left, view_right))| {
                    view_left.reshape(left_shape.0, left_shape.1);
                    view_right.reshape(right_shape.0, right_shape.1);
                    evaluation.accumulate_view(
                        view,
                        state.first_observation[view],
                        view_left,
                        view_right,
                    )
                })?;

            for (view_left, view_right) in view_chunks.iter() {
                left.extend_from(view_left);
                right.extend_from(view_right);
            }
        } else {
            for view in 0..num_views {
                evaluation.accumulate_view(view, state.first_observation[view], left, right)?;
            }
        }

        let left_matrix = left.to_compressed()?;
        let right_matrix = right.to_compressed()?;

        trace!(
            rows,
            left_cols = left_matrix.ncols(),
            right_cols = right_matrix.ncols(),
            left_entries = left.len(),
            right_entries = right.len(),
            "evaluated Schur Jacobian"
        );

        Ok((left_matrix, right_matrix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SceneCodec;
    use crate::scene::Estimate;
    use crate::sparse::{sparse_entry, to_dense_rows};
    use nalgebra::{DVector, Isometry3, Matrix2xX, Translation3, UnitQuaternion, Vector2, Vector4};
    use sba_camera_models::PinholeCamera;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn unit_pinhole() -> Result<Box<dyn CameraModel>, CameraModelError> {
        Ok(Box::new(PinholeCamera::new(1.0, 1.0, 0.0, 0.0)?))
    }

    /// Pinhole camera that reports only the first `columns` intrinsic derivatives, and no
    /// intrinsic gradient at all when `columns` is zero.
    #[derive(Debug, Clone)]
    struct TruncatedIntrinsics {
        inner: PinholeCamera,
        columns: usize,
    }

    impl CameraModel for TruncatedIntrinsics {
        fn intrinsic_count(&self) -> usize {
            self.inner.intrinsic_count()
        }

        fn intrinsics(&self) -> DVector<f64> {
            self.inner.intrinsics()
        }

        fn set_intrinsics(&mut self, params: &[f64]) -> Result<(), CameraModelError> {
            self.inner.set_intrinsics(params)
        }

        fn project(&self, p_cam: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError> {
            self.inner.project(p_cam)
        }

        fn is_valid_point(&self, p_cam: &Vector3<f64>) -> bool {
            self.inner.is_valid_point(p_cam)
        }

        fn jacobian_point(&self, p_cam: &Vector3<f64>) -> Matrix2x3<f64> {
            self.inner.jacobian_point(p_cam)
        }

        fn jacobian_intrinsics(&self, p_cam: &Vector3<f64>) -> Matrix2xX<f64> {
            self.inner
                .jacobian_intrinsics(p_cam)
                .columns(0, self.columns)
                .into_owned()
        }

        fn gradient(
            &self,
            p_cam: &Vector3<f64>,
            with_intrinsics: bool,
        ) -> (Matrix2x3<f64>, Option<Matrix2xX<f64>>) {
            let intrinsics =
                (with_intrinsics && self.columns > 0).then(|| self.jacobian_intrinsics(p_cam));
            (self.jacobian_point(p_cam), intrinsics)
        }

        fn validate_params(&self) -> Result<(), CameraModelError> {
            self.inner.validate_params()
        }

        fn model_name(&self) -> &'static str {
            "truncated_intrinsics"
        }

        fn clone_box(&self) -> Box<dyn CameraModel> {
            Box::new(self.clone())
        }
    }

    fn truncated_camera_scene(
        columns: usize,
    ) -> Result<(SceneStructureMetric, SceneObservations), CameraModelError> {
        let mut structure = SceneStructureMetric::new(false);
        structure.add_point(Vector3::new(0.0, 0.0, 5.0));
        let camera = structure.add_camera(Estimate::Unknown(Box::new(TruncatedIntrinsics {
            inner: PinholeCamera::new(1.0, 1.0, 0.0, 0.0)?,
            columns,
        })));
        structure.add_view(camera, Estimate::Unknown(Isometry3::identity()));

        let mut observations = SceneObservations::new(1);
        observations.add(0, 0, Vector2::zeros());
        Ok((structure, observations))
    }

    fn single_point_scene(
        camera_known: bool,
    ) -> Result<(SceneStructureMetric, SceneObservations), CameraModelError> {
        let mut structure = SceneStructureMetric::new(false);
        structure.add_point(Vector3::new(0.0, 0.0, 5.0));
        let camera = if camera_known {
            Estimate::Known(unit_pinhole()?)
        } else {
            Estimate::Unknown(unit_pinhole()?)
        };
        let camera = structure.add_camera(camera);
        structure.add_view(camera, Estimate::Unknown(Isometry3::identity()));

        let mut observations = SceneObservations::new(1);
        observations.add(0, 0, Vector2::zeros());
        Ok((structure, observations))
    }

    fn configured(
        structure: SceneStructureMetric,
        observations: SceneObservations,
    ) -> Result<(SchurJacobian, Vec<f64>), JacobianError> {
        let parameters = SceneCodec::encode(&structure, &ParameterLayout::new(&structure));
        let mut jacobian = SchurJacobian::default();
        jacobian.configure(Arc::new(structure), Arc::new(observations))?;
        Ok((jacobian, parameters))
    }

    #[test]
    fn test_point_on_optical_axis() -> TestResult {
        let (structure, observations) = single_point_scene(true)?;
        let (mut jacobian, parameters) = configured(structure, observations)?;

        assert_eq!(jacobian.input_dimension(), 9);
        assert_eq!(jacobian.output_dimension(), 2);

        // identity view keeps the point at (0, 0, 5), which projects to the principal point
        let state = jacobian.state.as_ref().ok_or("configured")?;
        let pose = ViewPose::decode(&state.structure, &state.layout, &parameters, 0);
        let (xyz, w) = split_point(&parameters[..3]);
        let p_cam = pose.transform(&xyz, w);
        assert_eq!(p_cam, Vector3::new(0.0, 0.0, 5.0));
        assert_eq!(unit_pinhole()?.project(&p_cam)?, Vector2::new(0.0, 0.0));

        let (left, right) = jacobian.process(&parameters)?;

        // G at (0, 0, 5) with unit focal length, identity rotation: G·R = G
        let expected_left = vec![vec![0.2, 0.0, 0.0], vec![0.0, 0.2, 0.0]];
        assert_eq!(to_dense_rows(&left), expected_left);

        // Rotation columns: G·([e_i]× · xyz) for xyz = (0, 0, 5)
        let right = to_dense_rows(&right);
        assert!((right[0][0] - 0.0).abs() < 1e-12);
        assert!((right[0][1] - 1.0).abs() < 1e-12);
        assert!((right[1][0] + 1.0).abs() < 1e-12);
        assert!((right[1][1] - 0.0).abs() < 1e-12);
        // Translation columns equal G
        assert_eq!(&right[0][3..6], &[0.2, 0.0, 0.0]);
        assert_eq!(&right[1][3..6], &[0.0, 0.2, 0.0]);
        Ok(())
    }

    #[test]
    fn test_unknown_camera_columns() -> TestResult {
        let (structure, observations) = single_point_scene(false)?;
        let (mut jacobian, parameters) = configured(structure, observations)?;
        assert_eq!(jacobian.input_dimension(), 3 + 6 + 4);

        let (_, right) = jacobian.process(&parameters)?;
        assert_eq!(right.ncols(), 10);
        // ∂u/∂cx = 1, ∂v/∂cy = 1
        assert_eq!(sparse_entry(&right, 0, 8), 1.0);
        assert_eq!(sparse_entry(&right, 1, 9), 1.0);
        Ok(())
    }

    #[test]
    fn test_narrow_intrinsic_gradient_rejected() -> TestResult {
        let (structure, observations) = truncated_camera_scene(3)?;
        let (mut jacobian, parameters) = configured(structure, observations)?;

        assert_eq!(
            jacobian.process(&parameters).err(),
            Some(JacobianError::DimensionMismatch {
                what: "intrinsic gradient width",
                expected: 4,
                actual: 3
            })
        );
        Ok(())
    }

    #[test]
    fn test_missing_intrinsic_gradient_rejected() -> TestResult {
        let (structure, observations) = truncated_camera_scene(0)?;
        let (mut jacobian, parameters) = configured(structure, observations)?;

        assert_eq!(
            jacobian.process(&parameters).err(),
            Some(JacobianError::DimensionMismatch {
                what: "intrinsic gradient width",
                expected: 4,
                actual: 0
            })
        );
        Ok(())
    }

    #[test]
    fn test_full_width_wrapper_matches_pinhole() -> TestResult {
        let (structure, observations) = truncated_camera_scene(4)?;
        let (mut wrapped, parameters) = configured(structure, observations)?;
        let (structure, observations) = single_point_scene(false)?;
        let (mut plain, _) = configured(structure, observations)?;

        let (left_w, right_w) = wrapped.process(&parameters)?;
        let (left_p, right_p) = plain.process(&parameters)?;
        assert_eq!(to_dense_rows(&left_w), to_dense_rows(&left_p));
        assert_eq!(to_dense_rows(&right_w), to_dense_rows(&right_p));
        Ok(())
    }

    #[test]
    fn test_parallel_buffers_reused_across_evaluations() -> TestResult {
        let mut structure = SceneStructureMetric::new(false);
        for i in 0..4 {
            structure.add_point(Vector3::new(0.1 * i as f64, -0.2, 5.0 + i as f64));
        }
        let camera = structure.add_camera(Estimate::Unknown(unit_pinhole()?));
        let mut observations = SceneObservations::new(3);
        for view in 0..3 {
            let pose = Isometry3::new(
                Vector3::new(0.1 * view as f64, 0.0, 0.2),
                Vector3::new(0.0, 0.05 * view as f64, 0.0),
            );
            structure.add_view(camera, Estimate::Unknown(pose));
            for point in 0..4 {
                observations.add(view, point, Vector2::zeros());
            }
        }

        let parameters = SceneCodec::encode(&structure, &ParameterLayout::new(&structure));
        let structure = Arc::new(structure);
        let observations = Arc::new(observations);

        let mut serial = SchurJacobian::default();
        serial.configure(structure.clone(), observations.clone())?;
        let mut parallel = SchurJacobian::new(
            SchurJacobianConfig::new()
                .with_parallel(true)
                .with_parallel_threshold(0),
        );
        parallel.configure(structure, observations)?;

        let (left_s, right_s) = serial.process(&parameters)?;
        let (left_a, right_a) = parallel.process(&parameters)?;
        assert_eq!(parallel.scratch.view_chunks.len(), 3);
        let (left_b, right_b) = parallel.process(&parameters)?;
        assert_eq!(parallel.scratch.view_chunks.len(), 3);

        // the second call must not carry entries over from the first
        assert_eq!(left_a.compute_nnz(), left_b.compute_nnz());
        assert_eq!(right_a.compute_nnz(), right_b.compute_nnz());
        assert_eq!(to_dense_rows(&left_a), to_dense_rows(&left_b));
        assert_eq!(to_dense_rows(&right_a), to_dense_rows(&right_b));
        assert_eq!(to_dense_rows(&left_s), to_dense_rows(&left_b));
        assert_eq!(to_dense_rows(&right_s), to_dense_rows(&right_b));
        Ok(())
    }

    #[test]
    fn test_homogeneous_weight_column() -> TestResult {
        let mut structure = SceneStructureMetric::new(true);
        structure.add_point_homogeneous(Vector4::new(0.0, 0.0, 5.0, 1.0));
        let camera = structure.add_camera(Estimate::Known(unit_pinhole()?));
        let pose = Isometry3::from_parts(Translation3::new(0.5, -0.5, 1.0), UnitQuaternion::identity());
        structure.add_view(camera, Estimate::Known(pose));

        let mut observations = SceneObservations::new(1);
        observations.add(0, 0, Vector2::zeros());
        let (mut jacobian, parameters) = configured(structure, observations)?;

        let (left, right) = jacobian.process(&parameters)?;
        assert_eq!(left.ncols(), 4);
        assert_eq!(right.ncols(), 0);

        // p = (0.5, -0.5, 6), column 3 = G·T
        let p = Vector3::new(0.5, -0.5, 6.0);
        let g = PinholeCamera::new(1.0, 1.0, 0.0, 0.0)?.jacobian_point(&p);
        let g_t = g * Vector3::new(0.5, -0.5, 1.0);
        assert!((sparse_entry(&left, 0, 3) - g_t.x).abs() < 1e-15);
        assert!((sparse_entry(&left, 1, 3) - g_t.y).abs() < 1e-15);
        Ok(())
    }

    #[test]
    fn test_wrong_parameter_length() -> TestResult {
        let (structure, observations) = single_point_scene(true)?;
        let (mut jacobian, parameters) = configured(structure, observations)?;

        let result = jacobian.process(&parameters[..parameters.len() - 1]);
        assert_eq!(
            result.err(),
            Some(JacobianError::DimensionMismatch {
                what: "parameter vector",
                expected: 9,
                actual: 8
            })
        );
        Ok(())
    }

    #[test]
    fn test_not_configured() {
        let mut jacobian = SchurJacobian::default();
        assert_eq!(jacobian.input_dimension(), 0);
        assert_eq!(jacobian.output_dimension(), 0);
        assert_eq!(jacobian.process(&[]).err(), Some(JacobianError::NotConfigured));
    }

    #[test]
    fn test_configure_rejects_bad_point_index() -> TestResult {
        let (structure, mut observations) = single_point_scene(true)?;
        observations.add(0, 3, Vector2::zeros());

        let mut jacobian = SchurJacobian::default();
        let result = jacobian.configure(Arc::new(structure), Arc::new(observations));
        assert!(matches!(result, Err(JacobianError::Configuration(_))));
        Ok(())
    }

    #[test]
    fn test_configure_rejects_view_count_mismatch() -> TestResult {
        let (structure, _) = single_point_scene(true)?;
        let mut jacobian = SchurJacobian::default();
        let result = jacobian.configure(Arc::new(structure), Arc::new(SceneObservations::new(2)));
        assert!(matches!(result, Err(JacobianError::Configuration(_))));
        Ok(())
    }

    #[test]
    fn test_config_builder() {
        let config = SchurJacobianConfig::new()
            .with_parallel(true)
            .with_parallel_threshold(10);
        assert!(config.parallel);
        assert_eq!(config.parallel_threshold, 10);
        assert_eq!(SchurJacobian::new(config).config(), &config);
    }
}
