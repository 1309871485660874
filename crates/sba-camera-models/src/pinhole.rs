//! Pinhole Camera Model
//!
//! The simplest perspective camera model with no lens distortion.
//!
//! # Mathematical Model
//!
//! For a 3D point p = (x, y, z) in camera coordinates:
//!
//! ```text
//! u = fx · (x/z) + cx
//! v = fy · (y/z) + cy
//! ```
//!
//! where:
//! - (fx, fy) are focal lengths in pixels
//! - (cx, cy) is the principal point in pixels
//! - z > 0 (point in front of camera)
//!
//! # Parameters
//!
//! - **Intrinsics**: fx, fy, cx, cy (4 parameters, in that order)
//! - **Distortion**: None
//!
//! # References
//!
//! - Hartley & Zisserman, "Multiple View Geometry in Computer Vision"

use crate::{
    CameraModel, CameraModelError, MIN_DEPTH, PinholeParams, check_parameter_count, to_dynamic,
};
use nalgebra::{DVector, Matrix2x3, Matrix2xX, SMatrix, Vector2, Vector3};

/// Pinhole camera model with 4 intrinsic parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinholeCamera {
    pub pinhole: PinholeParams,
}

impl PinholeCamera {
    /// Number of intrinsic parameters.
    pub const INTRINSIC_DIM: usize = 4;

    /// Creates a new Pinhole camera model.
    ///
    /// # Example
    ///
    /// ```
    /// use sba_camera_models::{CameraModel, PinholeCamera};
    /// use nalgebra::Vector3;
    ///
    /// let camera = PinholeCamera::new(500.0, 500.0, 320.0, 240.0)?;
    /// let uv = camera.project(&Vector3::new(0.0, 0.0, 1.0))?;
    /// assert_eq!(uv.x, 320.0);
    /// # Ok::<(), sba_camera_models::CameraModelError>(())
    /// ```
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Result<Self, CameraModelError> {
        Ok(Self {
            pinhole: PinholeParams::new(fx, fy, cx, cy)?,
        })
    }

    /// Checks the geometric condition for a valid projection.
    pub fn check_projection_condition(&self, z: f64) -> bool {
        z >= MIN_DEPTH
    }

    /// Fixed-size intrinsic Jacobian ∂(u,v)/∂(fx,fy,cx,cy).
    ///
    /// ```text
    /// J = [ x/z    0    1   0 ]
    ///     [  0    y/z   0   1 ]
    /// ```
    pub fn intrinsic_jacobian(&self, p_cam: &Vector3<f64>) -> SMatrix<f64, 2, 4> {
        let inv_z = 1.0 / p_cam.z;
        let x_norm = p_cam.x * inv_z;
        let y_norm = p_cam.y * inv_z;

        SMatrix::<f64, 2, 4>::new(x_norm, 0.0, 1.0, 0.0, 0.0, y_norm, 0.0, 1.0)
    }
}

impl CameraModel for PinholeCamera {
    fn intrinsic_count(&self) -> usize {
        Self::INTRINSIC_DIM
    }

    fn intrinsics(&self) -> DVector<f64> {
        self.into()
    }

    fn set_intrinsics(&mut self, params: &[f64]) -> Result<(), CameraModelError> {
        check_parameter_count(Self::INTRINSIC_DIM, params)?;
        self.pinhole = PinholeParams {
            fx: params[0],
            fy: params[1],
            cx: params[2],
            cy: params[3],
        };
        Ok(())
    }

    fn project(&self, p_cam: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError> {
        if !self.check_projection_condition(p_cam.z) {
            return Err(CameraModelError::PointAtCameraCenter);
        }
        let inv_z = 1.0 / p_cam.z;
        Ok(Vector2::new(
            self.pinhole.fx * p_cam.x * inv_z + self.pinhole.cx,
            self.pinhole.fy * p_cam.y * inv_z + self.pinhole.cy,
        ))
    }

    fn is_valid_point(&self, p_cam: &Vector3<f64>) -> bool {
        self.check_projection_condition(p_cam.z)
    }

    /// Jacobian of projection w.r.t. 3D point coordinates (2×3).
    ///
    /// ```text
    /// J = [ fx/z    0      -fx·x/z² ]
    ///     [  0     fy/z    -fy·y/z² ]
    /// ```
    fn jacobian_point(&self, p_cam: &Vector3<f64>) -> Matrix2x3<f64> {
        let inv_z = 1.0 / p_cam.z;
        let x_norm = p_cam.x * inv_z;
        let y_norm = p_cam.y * inv_z;

        Matrix2x3::new(
            self.pinhole.fx * inv_z,
            0.0,
            -self.pinhole.fx * x_norm * inv_z,
            0.0,
            self.pinhole.fy * inv_z,
            -self.pinhole.fy * y_norm * inv_z,
        )
    }

    fn jacobian_intrinsics(&self, p_cam: &Vector3<f64>) -> Matrix2xX<f64> {
        to_dynamic(&self.intrinsic_jacobian(p_cam))
    }

    /// Validates camera parameters.
    ///
    /// - fx, fy must be positive (> 0)
    /// - cx, cy must be finite (not NaN or infinity)
    fn validate_params(&self) -> Result<(), CameraModelError> {
        self.pinhole.validate()
    }

    fn model_name(&self) -> &'static str {
        "pinhole"
    }

    fn clone_box(&self) -> Box<dyn CameraModel> {
        Box::new(*self)
    }
}

// ============================================================================
// From/Into Trait Implementations
// ============================================================================

/// Convert PinholeCamera to parameter vector.
///
/// Returns intrinsic parameters in the order: [fx, fy, cx, cy]
impl From<&PinholeCamera> for DVector<f64> {
    fn from(camera: &PinholeCamera) -> Self {
        DVector::from_vec(vec![
            camera.pinhole.fx,
            camera.pinhole.fy,
            camera.pinhole.cx,
            camera.pinhole.cy,
        ])
    }
}

/// Create PinholeCamera from fixed-size parameter array, without validation.
///
/// params = [fx, fy, cx, cy]
impl From<[f64; 4]> for PinholeCamera {
    fn from(params: [f64; 4]) -> Self {
        Self {
            pinhole: PinholeParams {
                fx: params[0],
                fy: params[1],
                cx: params[2],
                cy: params[3],
            },
        }
    }
}
