//! Conversion between a scene and the optimizer's flat parameter vector.

use crate::jacobian::{JacobianError, check_parameter_length};
use crate::layout::{ParameterLayout, ParameterSlot};
use crate::scene::SceneStructureMetric;
use nalgebra::{Isometry3, Rotation3, Translation3, UnitQuaternion, Vector3};
use sba_manifolds::{matrix_to_rodrigues, rodrigues_to_matrix};

/// Encodes and decodes the unknowns of a [`SceneStructureMetric`].
///
/// Points are written as stored, views as a Rodrigues vector followed by the translation,
/// and unknown cameras as their intrinsic parameters in model order.
pub struct SceneCodec;

impl SceneCodec {
    /// Flatten every unknown of `structure` into a vector laid out by `layout`.
    pub fn encode(structure: &SceneStructureMetric, layout: &ParameterLayout) -> Vec<f64> {
        let mut parameters = Vec::with_capacity(layout.input_dimension());

        for point in &structure.points {
            parameters.extend_from_slice(point.coordinates());
        }

        for view in &structure.views {
            if view.world_to_view.is_unknown() {
                let pose = view.world_to_view.value();
                let rotation = pose.rotation.to_rotation_matrix().into_inner();
                parameters.extend_from_slice(matrix_to_rodrigues(&rotation).as_slice());
                parameters.extend_from_slice(pose.translation.vector.as_slice());
            }
        }

        for camera in &structure.cameras {
            if camera.model.is_unknown() {
                parameters.extend_from_slice(camera.model.value().intrinsics().as_slice());
            }
        }

        parameters
    }

    /// Write `parameters` back into the unknowns of `structure`.
    ///
    /// Known views and cameras are left untouched.
    ///
    /// # Errors
    ///
    /// [`JacobianError::DimensionMismatch`] on a wrong vector length, and
    /// [`JacobianError::Camera`] when a camera rejects its decoded intrinsics.
    pub fn decode(
        parameters: &[f64],
        layout: &ParameterLayout,
        structure: &mut SceneStructureMetric,
    ) -> Result<(), JacobianError> {
        check_parameter_length(layout, parameters)?;

        let d = layout.point_dim;
        for (index, point) in structure.points.iter_mut().enumerate() {
            let start = layout.point_offset(index);
            point.set_coordinates(&parameters[start..start + d]);
        }

        for (index, view) in structure.views.iter_mut().enumerate() {
            if let Some(start) = layout.view_offset(index) {
                let p = &parameters[start..start + 6];
                *view.world_to_view.value_mut() = Isometry3::from_parts(
                    Translation3::new(p[3], p[4], p[5]),
                    UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(
                        rodrigues_to_matrix(&Vector3::new(p[0], p[1], p[2])),
                    )),
                );
            }
        }

        for (index, camera) in structure.cameras.iter_mut().enumerate() {
            if let (ParameterSlot::Free { width, .. }, Some(start)) =
                (layout.cameras[index], layout.camera_offset(index))
            {
                camera
                    .model
                    .value_mut()
                    .set_intrinsics(&parameters[start..start + width])?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Estimate;
    use nalgebra::Vector4;
    use sba_camera_models::{BalPinholeCamera, PinholeCamera};

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn scene() -> Result<SceneStructureMetric, Box<dyn std::error::Error>> {
        let mut structure = SceneStructureMetric::new(false);
        structure.add_point(Vector3::new(1.0, 2.0, 3.0));
        structure.add_point(Vector3::new(-1.0, 0.5, 4.0));
        let fixed = structure.add_camera(Estimate::Known(Box::new(PinholeCamera::new(
            400.0, 410.0, 320.0, 240.0,
        )?)));
        let free = structure.add_camera(Estimate::Unknown(Box::new(BalPinholeCamera::new(
            500.0, -0.1, 0.01,
        )?)));
        structure.add_view(
            fixed,
            Estimate::Known(Isometry3::new(Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 0.3, 0.0))),
        );
        structure.add_view(
            free,
            Estimate::Unknown(Isometry3::new(
                Vector3::new(0.1, -0.2, 0.3),
                Vector3::new(0.2, 0.1, -0.05),
            )),
        );
        Ok(structure)
    }

    #[test]
    fn test_encode_order() -> TestResult {
        let structure = scene()?;
        let layout = ParameterLayout::new(&structure);
        let parameters = SceneCodec::encode(&structure, &layout);

        assert_eq!(parameters.len(), 6 + 6 + 3);
        assert_eq!(&parameters[..6], &[1.0, 2.0, 3.0, -1.0, 0.5, 4.0]);

        let rotation = &parameters[6..9];
        assert!((rotation[0] - 0.2).abs() < 1e-12);
        assert!((rotation[1] - 0.1).abs() < 1e-12);
        assert!((rotation[2] + 0.05).abs() < 1e-12);
        assert_eq!(&parameters[9..12], &[0.1, -0.2, 0.3]);
        assert_eq!(&parameters[12..], &[500.0, -0.1, 0.01]);
        Ok(())
    }

    #[test]
    fn test_decode_updates_unknowns_only() -> TestResult {
        let original = scene()?;
        let mut structure = scene()?;
        let layout = ParameterLayout::new(&structure);

        let mut parameters = SceneCodec::encode(&structure, &layout);
        parameters[0] = 7.0;
        parameters[9] = 1.5;
        parameters[12] = 450.0;
        SceneCodec::decode(&parameters, &layout, &mut structure)?;

        assert_eq!(structure.points[0].coordinates()[0], 7.0);
        assert_eq!(structure.views[0], original.views[0]);
        assert_eq!(structure.views[1].world_to_view.value().translation.x, 1.5);
        assert_eq!(structure.cameras[1].model.value().intrinsics()[0], 450.0);
        assert_eq!(
            structure.cameras[0].model.value().intrinsics(),
            original.cameras[0].model.value().intrinsics()
        );

        let reencoded = SceneCodec::encode(&structure, &layout);
        for (a, b) in reencoded.iter().zip(&parameters) {
            assert!((a - b).abs() < 1e-12);
        }
        Ok(())
    }

    #[test]
    fn test_decode_homogeneous_points() -> TestResult {
        let mut structure = SceneStructureMetric::new(true);
        structure.add_point_homogeneous(Vector4::new(1.0, 2.0, 3.0, 1.0));
        let layout = ParameterLayout::new(&structure);

        SceneCodec::decode(&[2.0, 4.0, 6.0, 2.0], &layout, &mut structure)?;
        assert_eq!(structure.points[0].to_euclidean(), Vector3::new(1.0, 2.0, 3.0));
        Ok(())
    }

    #[test]
    fn test_decode_wrong_length() -> TestResult {
        let mut structure = scene()?;
        let layout = ParameterLayout::new(&structure);
        let result = SceneCodec::decode(&[0.0; 3], &layout, &mut structure);
        assert!(matches!(
            result,
            Err(JacobianError::DimensionMismatch {
                expected: 15,
                actual: 3,
                ..
            })
        ));
        Ok(())
    }
}
