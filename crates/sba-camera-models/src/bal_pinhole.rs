//! BAL (Bundle Adjustment in the Large) pinhole camera model.
//!
//! This module implements a pinhole camera model that follows the BAL dataset convention
//! where cameras look down the -Z axis (negative Z in front of camera).
//!
//! ```text
//! p  = -(x, y) / z
//! r  = 1 + k₁·‖p‖² + k₂·‖p‖⁴
//! uv = f · r · p
//! ```
//!
//! There is no principal point: BAL image coordinates are centered on the optical axis.
//! Intrinsics are ordered `[f, k1, k2]`.

use crate::{CameraModel, CameraModelError, MIN_DEPTH, check_parameter_count, to_dynamic};
use nalgebra::{DVector, Matrix2x3, Matrix2xX, SMatrix, Vector2, Vector3};

/// Single focal length pinhole with two radial distortion terms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalPinholeCamera {
    pub f: f64,
    pub k1: f64,
    pub k2: f64,
}

impl BalPinholeCamera {
    /// Number of intrinsic parameters.
    pub const INTRINSIC_DIM: usize = 3;

    /// Creates a new BAL camera, validating the focal length and distortion.
    pub fn new(f: f64, k1: f64, k2: f64) -> Result<Self, CameraModelError> {
        let camera = Self { f, k1, k2 };
        camera.validate_params()?;
        Ok(camera)
    }

    /// Creates a BAL camera without radial distortion.
    pub fn new_no_distortion(f: f64) -> Result<Self, CameraModelError> {
        Self::new(f, 0.0, 0.0)
    }

    fn check_projection_condition(&self, z: f64) -> bool {
        z < -MIN_DEPTH
    }

    /// Fixed-size intrinsic Jacobian ∂(u,v)/∂(f,k1,k2).
    pub fn intrinsic_jacobian(&self, p_cam: &Vector3<f64>) -> SMatrix<f64, 2, 3> {
        let inv_neg_z = -1.0 / p_cam.z;
        let x_n = p_cam.x * inv_neg_z;
        let y_n = p_cam.y * inv_neg_z;

        let r2 = x_n * x_n + y_n * y_n;
        let r4 = r2 * r2;
        let distortion = 1.0 + self.k1 * r2 + self.k2 * r4;

        SMatrix::<f64, 2, 3>::new(
            x_n * distortion,  // ∂u/∂f
            self.f * x_n * r2, // ∂u/∂k1
            self.f * x_n * r4, // ∂u/∂k2
            y_n * distortion,  // ∂v/∂f
            self.f * y_n * r2, // ∂v/∂k1
            self.f * y_n * r4, // ∂v/∂k2
        )
    }
}

impl From<&BalPinholeCamera> for DVector<f64> {
    fn from(camera: &BalPinholeCamera) -> Self {
        DVector::from_vec(vec![camera.f, camera.k1, camera.k2])
    }
}

impl From<[f64; 3]> for BalPinholeCamera {
    fn from(params: [f64; 3]) -> Self {
        Self {
            f: params[0],
            k1: params[1],
            k2: params[2],
        }
    }
}

impl CameraModel for BalPinholeCamera {
    fn intrinsic_count(&self) -> usize {
        Self::INTRINSIC_DIM
    }

    fn intrinsics(&self) -> DVector<f64> {
        self.into()
    }

    fn set_intrinsics(&mut self, params: &[f64]) -> Result<(), CameraModelError> {
        check_parameter_count(Self::INTRINSIC_DIM, params)?;
        self.f = params[0];
        self.k1 = params[1];
        self.k2 = params[2];
        Ok(())
    }

    fn project(&self, p_cam: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError> {
        // BAL convention: negative Z is in front
        if !self.check_projection_condition(p_cam.z) {
            return Err(CameraModelError::PointAtCameraCenter);
        }
        let inv_neg_z = -1.0 / p_cam.z;

        let x_n = p_cam.x * inv_neg_z;
        let y_n = p_cam.y * inv_neg_z;

        let r2 = x_n * x_n + y_n * y_n;
        let r4 = r2 * r2;
        let distortion = 1.0 + self.k1 * r2 + self.k2 * r4;

        Ok(Vector2::new(
            self.f * x_n * distortion,
            self.f * y_n * distortion,
        ))
    }

    fn is_valid_point(&self, p_cam: &Vector3<f64>) -> bool {
        self.check_projection_condition(p_cam.z)
    }

    fn jacobian_point(&self, p_cam: &Vector3<f64>) -> Matrix2x3<f64> {
        let inv_neg_z = -1.0 / p_cam.z;
        let x_n = p_cam.x * inv_neg_z;
        let y_n = p_cam.y * inv_neg_z;

        let r2 = x_n * x_n + y_n * y_n;
        let r4 = r2 * r2;
        let distortion = 1.0 + self.k1 * r2 + self.k2 * r4;
        let d_dist_dr2 = self.k1 + 2.0 * self.k2 * r2;

        // ∂x_n/∂z = x/z² = x_n·(-1/z)
        let dxn_dz = x_n * inv_neg_z;
        let dyn_dz = y_n * inv_neg_z;

        let dx_d_dxn = distortion + x_n * d_dist_dr2 * 2.0 * x_n;
        let dx_d_dyn = x_n * d_dist_dr2 * 2.0 * y_n;
        let dy_d_dxn = y_n * d_dist_dr2 * 2.0 * x_n;
        let dy_d_dyn = distortion + y_n * d_dist_dr2 * 2.0 * y_n;

        let du_dx = self.f * (dx_d_dxn * inv_neg_z);
        let du_dy = self.f * (dx_d_dyn * inv_neg_z);
        let du_dz = self.f * (dx_d_dxn * dxn_dz + dx_d_dyn * dyn_dz);

        let dv_dx = self.f * (dy_d_dxn * inv_neg_z);
        let dv_dy = self.f * (dy_d_dyn * inv_neg_z);
        let dv_dz = self.f * (dy_d_dxn * dxn_dz + dy_d_dyn * dyn_dz);

        Matrix2x3::new(du_dx, du_dy, du_dz, dv_dx, dv_dy, dv_dz)
    }

    fn jacobian_intrinsics(&self, p_cam: &Vector3<f64>) -> Matrix2xX<f64> {
        to_dynamic(&self.intrinsic_jacobian(p_cam))
    }

    fn validate_params(&self) -> Result<(), CameraModelError> {
        if self.f <= 0.0 {
            return Err(CameraModelError::FocalLengthMustBePositive);
        }
        if !self.k1.is_finite() || !self.k2.is_finite() {
            return Err(CameraModelError::InvalidParams(
                "Distortion coefficients must be finite".to_string(),
            ));
        }
        Ok(())
    }

    fn model_name(&self) -> &'static str {
        "bal_pinhole"
    }

    fn clone_box(&self) -> Box<dyn CameraModel> {
        Box::new(*self)
    }
}
