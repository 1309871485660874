//! Reprojection residuals matching the row order of [`crate::SchurJacobian`].

use crate::jacobian::{
    JacobianError, ViewPose, check_parameter_length, decode_cameras, split_point, validate_scene,
};
use crate::layout::ParameterLayout;
use crate::scene::{SceneObservations, SceneStructureMetric};
use nalgebra::DVector;
use sba_camera_models::CameraModel;
use std::sync::Arc;
use tracing::debug;

/// Residual function `r(x) = π(p) − observed`, two rows per observation.
#[derive(Debug, Default)]
pub struct ReprojectionResidual {
    structure: Option<Arc<SceneStructureMetric>>,
    observations: Option<Arc<SceneObservations>>,
    layout: Option<ParameterLayout>,
    cameras: Vec<Box<dyn CameraModel>>,
}

impl ReprojectionResidual {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configure(
        &mut self,
        structure: Arc<SceneStructureMetric>,
        observations: Arc<SceneObservations>,
    ) -> Result<(), JacobianError> {
        validate_scene(&structure, &observations).map_err(JacobianError::log)?;

        self.cameras = structure
            .cameras
            .iter()
            .map(|camera| camera.model.value().clone())
            .collect();
        self.layout = Some(ParameterLayout::new(&structure));

        debug!(
            observations = observations.observation_count(),
            "configured reprojection residual"
        );
        self.structure = Some(structure);
        self.observations = Some(observations);
        Ok(())
    }

    pub fn input_dimension(&self) -> usize {
        self.layout
            .as_ref()
            .map_or(0, ParameterLayout::input_dimension)
    }

    pub fn output_dimension(&self) -> usize {
        self.observations
            .as_ref()
            .map_or(0, |obs| 2 * obs.observation_count())
    }

    /// Write the residuals at `parameters` into `output`.
    ///
    /// A point that projects behind its camera fails with [`JacobianError::Camera`].
    pub fn process(&mut self, parameters: &[f64], output: &mut [f64]) -> Result<(), JacobianError> {
        let (Some(structure), Some(observations), Some(layout)) =
            (&self.structure, &self.observations, &self.layout)
        else {
            return Err(JacobianError::NotConfigured);
        };
        check_parameter_length(layout, parameters)?;

        let rows = 2 * observations.observation_count();
        if output.len() != rows {
            return Err(JacobianError::DimensionMismatch {
                what: "residual vector",
                expected: rows,
                actual: output.len(),
            });
        }

        decode_cameras(layout, parameters, &mut self.cameras)?;

        let mut row = 0;
        for (view, list) in observations.views.iter().enumerate() {
            let pose = ViewPose::decode(structure, layout, parameters, view);
            let camera = &self.cameras[structure.views[view].camera];

            for obs in list.iter() {
                let start = layout.point_offset(obs.point);
                let (xyz, w) = split_point(&parameters[start..start + layout.point_dim]);
                let predicted = camera.project(&pose.transform(&xyz, w))?;

                output[row] = predicted.x - obs.pixel.x;
                output[row + 1] = predicted.y - obs.pixel.y;
                row += 2;
            }
        }

        Ok(())
    }

    /// Allocate and return the residual vector at `parameters`.
    pub fn compute(&mut self, parameters: &[f64]) -> Result<DVector<f64>, JacobianError> {
        let mut residuals = DVector::zeros(self.output_dimension());
        self.process(parameters, residuals.as_mut_slice())?;
        Ok(residuals)
    }

    /// Root mean square reprojection error in pixels.
    pub fn rms_error(&mut self, parameters: &[f64]) -> Result<f64, JacobianError> {
        let residuals = self.compute(parameters)?;
        let observations = residuals.len() / 2;
        if observations == 0 {
            return Ok(0.0);
        }
        Ok((residuals.norm_squared() / observations as f64).sqrt())
    }
}
