//! Radial-Tangential Distortion Camera Model
//!
//! The standard OpenCV camera model combining radial and tangential distortion.
//!
//! # Mathematical Model
//!
//! For a 3D point p = (x, y, z) in camera coordinates:
//!
//! ```text
//! x' = x/z,  y' = y/z  (normalized coordinates)
//! r² = x'² + y'²
//!
//! Radial distortion:
//! r' = 1 + k₁·r² + k₂·r⁴ + k₃·r⁶
//!
//! Tangential distortion:
//! dx = 2·p₁·x'·y' + p₂·(r² + 2·x'²)
//! dy = p₁·(r² + 2·y'²) + 2·p₂·x'·y'
//!
//! Distorted coordinates:
//! x'' = r'·x' + dx
//! y'' = r'·y' + dy
//!
//! Final projection:
//! u = fx·x'' + cx
//! v = fy·y'' + cy
//! ```
//!
//! # Parameters
//!
//! fx, fy, cx, cy, k₁, k₂, p₁, p₂, k₃ (9 parameters, in that order)
//!
//! # References
//!
//! - Brown, "Decentering Distortion of Lenses", 1966
//! - OpenCV Camera Calibration Documentation

use crate::{
    CameraModel, CameraModelError, MIN_DEPTH, PinholeParams, check_parameter_count, to_dynamic,
};
use nalgebra::{DVector, Matrix2x3, Matrix2xX, SMatrix, Vector2, Vector3};

/// Radial-tangential (Brown-Conrady) camera with 9 intrinsic parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadTanCamera {
    pub pinhole: PinholeParams,
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

/// Normalized and distorted coordinates shared by projection and both Jacobians.
struct Distorted {
    x_prime: f64,
    y_prime: f64,
    r2: f64,
    r4: f64,
    r6: f64,
    radial: f64,
    x_distorted: f64,
    y_distorted: f64,
}

impl RadTanCamera {
    /// Number of intrinsic parameters.
    pub const INTRINSIC_DIM: usize = 9;

    /// Creates a camera from the linear intrinsics and `[k1, k2, p1, p2, k3]`.
    pub fn new(pinhole: PinholeParams, distortion: [f64; 5]) -> Result<Self, CameraModelError> {
        let [k1, k2, p1, p2, k3] = distortion;
        let camera = Self {
            pinhole,
            k1,
            k2,
            p1,
            p2,
            k3,
        };
        camera.validate_params()?;
        Ok(camera)
    }

    fn check_projection_condition(&self, z: f64) -> bool {
        z >= MIN_DEPTH
    }

    fn distort(&self, p_cam: &Vector3<f64>) -> Distorted {
        let inv_z = 1.0 / p_cam.z;
        let x_prime = p_cam.x * inv_z;
        let y_prime = p_cam.y * inv_z;

        let r2 = x_prime * x_prime + y_prime * y_prime;
        let r4 = r2 * r2;
        let r6 = r4 * r2;

        let radial = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;

        let xy = x_prime * y_prime;
        let dx = 2.0 * self.p1 * xy + self.p2 * (r2 + 2.0 * x_prime * x_prime);
        let dy = self.p1 * (r2 + 2.0 * y_prime * y_prime) + 2.0 * self.p2 * xy;

        Distorted {
            x_prime,
            y_prime,
            r2,
            r4,
            r6,
            radial,
            x_distorted: radial * x_prime + dx,
            y_distorted: radial * y_prime + dy,
        }
    }

    /// Fixed-size intrinsic Jacobian ∂(u,v)/∂(fx,fy,cx,cy,k1,k2,p1,p2,k3).
    pub fn intrinsic_jacobian(&self, p_cam: &Vector3<f64>) -> SMatrix<f64, 2, 9> {
        let d = self.distort(p_cam);
        let (fx, fy) = (self.pinhole.fx, self.pinhole.fy);
        let xy = d.x_prime * d.y_prime;

        let du_dk1 = fx * d.x_prime * d.r2;
        let du_dk2 = fx * d.x_prime * d.r4;
        let du_dp1 = fx * 2.0 * xy;
        let du_dp2 = fx * (d.r2 + 2.0 * d.x_prime * d.x_prime);
        let du_dk3 = fx * d.x_prime * d.r6;

        let dv_dk1 = fy * d.y_prime * d.r2;
        let dv_dk2 = fy * d.y_prime * d.r4;
        let dv_dp1 = fy * (d.r2 + 2.0 * d.y_prime * d.y_prime);
        let dv_dp2 = fy * 2.0 * xy;
        let dv_dk3 = fy * d.y_prime * d.r6;

        SMatrix::<f64, 2, 9>::from_row_slice(&[
            d.x_distorted,
            0.0,
            1.0,
            0.0,
            du_dk1,
            du_dk2,
            du_dp1,
            du_dp2,
            du_dk3,
            0.0,
            d.y_distorted,
            0.0,
            1.0,
            dv_dk1,
            dv_dk2,
            dv_dp1,
            dv_dp2,
            dv_dk3,
        ])
    }
}

impl CameraModel for RadTanCamera {
    fn intrinsic_count(&self) -> usize {
        Self::INTRINSIC_DIM
    }

    fn intrinsics(&self) -> DVector<f64> {
        DVector::from_vec(vec![
            self.pinhole.fx,
            self.pinhole.fy,
            self.pinhole.cx,
            self.pinhole.cy,
            self.k1,
            self.k2,
            self.p1,
            self.p2,
            self.k3,
        ])
    }

    fn set_intrinsics(&mut self, params: &[f64]) -> Result<(), CameraModelError> {
        check_parameter_count(Self::INTRINSIC_DIM, params)?;
        self.pinhole = PinholeParams {
            fx: params[0],
            fy: params[1],
            cx: params[2],
            cy: params[3],
        };
        self.k1 = params[4];
        self.k2 = params[5];
        self.p1 = params[6];
        self.p2 = params[7];
        self.k3 = params[8];
        Ok(())
    }

    fn project(&self, p_cam: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError> {
        if !self.check_projection_condition(p_cam.z) {
            return Err(CameraModelError::PointAtCameraCenter);
        }
        let d = self.distort(p_cam);
        Ok(Vector2::new(
            self.pinhole.fx * d.x_distorted + self.pinhole.cx,
            self.pinhole.fy * d.y_distorted + self.pinhole.cy,
        ))
    }

    fn is_valid_point(&self, p_cam: &Vector3<f64>) -> bool {
        self.check_projection_condition(p_cam.z)
    }

    fn jacobian_point(&self, p_cam: &Vector3<f64>) -> Matrix2x3<f64> {
        let inv_z = 1.0 / p_cam.z;
        let d = self.distort(p_cam);
        let (x_prime, y_prime) = (d.x_prime, d.y_prime);
        let dradial_dr2 = self.k1 + 2.0 * self.k2 * d.r2 + 3.0 * self.k3 * d.r4;

        // ∂x''/∂x' = r' + 2x'²·∂r'/∂r² + 2p₁y' + 6p₂x'
        let dx_dist_dx_prime = d.radial
            + 2.0 * x_prime * x_prime * dradial_dr2
            + 2.0 * self.p1 * y_prime
            + 6.0 * self.p2 * x_prime;

        // ∂x''/∂y' = 2x'y'·∂r'/∂r² + 2p₁x' + 2p₂y'
        let dx_dist_dy_prime = 2.0 * x_prime * y_prime * dradial_dr2
            + 2.0 * self.p1 * x_prime
            + 2.0 * self.p2 * y_prime;

        // ∂y''/∂x' = 2x'y'·∂r'/∂r² + 2p₁x' + 2p₂y'
        let dy_dist_dx_prime = 2.0 * y_prime * x_prime * dradial_dr2
            + 2.0 * self.p1 * x_prime
            + 2.0 * self.p2 * y_prime;

        // ∂y''/∂y' = r' + 2y'²·∂r'/∂r² + 6p₁y' + 2p₂x'
        let dy_dist_dy_prime = d.radial
            + 2.0 * y_prime * y_prime * dradial_dr2
            + 6.0 * self.p1 * y_prime
            + 2.0 * self.p2 * x_prime;

        // x' = x/z: ∂x'/∂x = 1/z, ∂x'/∂z = -x'/z (same for y')
        let (fx, fy) = (self.pinhole.fx, self.pinhole.fy);
        let du_dx = fx * (dx_dist_dx_prime * inv_z);
        let du_dy = fx * (dx_dist_dy_prime * inv_z);
        let du_dz =
            fx * (dx_dist_dx_prime * (-x_prime * inv_z) + dx_dist_dy_prime * (-y_prime * inv_z));

        let dv_dx = fy * (dy_dist_dx_prime * inv_z);
        let dv_dy = fy * (dy_dist_dy_prime * inv_z);
        let dv_dz =
            fy * (dy_dist_dx_prime * (-x_prime * inv_z) + dy_dist_dy_prime * (-y_prime * inv_z));

        Matrix2x3::new(du_dx, du_dy, du_dz, dv_dx, dv_dy, dv_dz)
    }

    fn jacobian_intrinsics(&self, p_cam: &Vector3<f64>) -> Matrix2xX<f64> {
        to_dynamic(&self.intrinsic_jacobian(p_cam))
    }

    fn validate_params(&self) -> Result<(), CameraModelError> {
        self.pinhole.validate()?;
        let distortion = [self.k1, self.k2, self.p1, self.p2, self.k3];
        if distortion.iter().any(|k| !k.is_finite()) {
            return Err(CameraModelError::InvalidParams(
                "Distortion coefficients must be finite".to_string(),
            ));
        }
        Ok(())
    }

    fn model_name(&self) -> &'static str {
        "rad_tan"
    }

    fn clone_box(&self) -> Box<dyn CameraModel> {
        Box::new(*self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{JACOBIAN_TEST_TOLERANCE, NUMERICAL_DERIVATIVE_EPS};

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn test_camera() -> Result<RadTanCamera, CameraModelError> {
        RadTanCamera::new(
            PinholeParams::new(461.629, 460.152, 362.680, 246.049)?,
            [-0.27695497, 0.06712482, 0.00087538, 0.00011556, -0.01],
        )
    }

    #[test]
    fn test_radtan_camera_creation() -> TestResult {
        let camera = test_camera()?;
        assert_eq!(camera.intrinsic_count(), 9);
        assert_eq!(camera.intrinsics()[4], camera.k1);
        assert_eq!(camera.model_name(), "rad_tan");

        let invalid = RadTanCamera::new(
            PinholeParams::new(461.0, 460.0, 362.0, 246.0)?,
            [f64::NAN, 0.0, 0.0, 0.0, 0.0],
        );
        assert!(invalid.is_err());
        Ok(())
    }

    #[test]
    fn test_zero_distortion_matches_pinhole() -> TestResult {
        let pinhole = PinholeParams::new(500.0, 500.0, 320.0, 240.0)?;
        let camera = RadTanCamera::new(pinhole, [0.0; 5])?;
        let uv = camera.project(&Vector3::new(0.1, 0.2, 1.0))?;
        assert!((uv - Vector2::new(370.0, 340.0)).norm() < 1e-10);
        Ok(())
    }

    #[test]
    fn test_projection_behind_camera() -> TestResult {
        let camera = test_camera()?;
        assert!(camera.project(&Vector3::new(0.0, 0.0, -1.0)).is_err());
        assert!(!camera.is_valid_point(&Vector3::new(0.0, 0.0, 0.0)));
        Ok(())
    }

    #[test]
    fn test_jacobian_point_numerical() -> TestResult {
        let camera = test_camera()?;
        let p_cam = Vector3::new(0.3, -0.2, 1.5);

        let jac_analytical = camera.jacobian_point(&p_cam);
        let eps = NUMERICAL_DERIVATIVE_EPS;

        for i in 0..3 {
            let mut p_plus = p_cam;
            let mut p_minus = p_cam;
            p_plus[i] += eps;
            p_minus[i] -= eps;

            let numerical_jac = (camera.project(&p_plus)? - camera.project(&p_minus)?) / (2.0 * eps);

            for r in 0..2 {
                let analytical = jac_analytical[(r, i)];
                let numerical = numerical_jac[r];
                let rel_error = (analytical - numerical).abs() / (1.0 + numerical.abs());
                assert!(
                    rel_error < JACOBIAN_TEST_TOLERANCE,
                    "Jacobian mismatch at ({}, {}): analytical={}, numerical={}, rel_error={}",
                    r,
                    i,
                    analytical,
                    numerical,
                    rel_error
                );
            }
        }
        Ok(())
    }

    #[test]
    fn test_jacobian_intrinsics_numerical() -> TestResult {
        let camera = test_camera()?;
        let p_cam = Vector3::new(0.3, -0.2, 1.5);

        let jac_analytical = camera.jacobian_intrinsics(&p_cam);
        let params = camera.intrinsics();
        let eps = NUMERICAL_DERIVATIVE_EPS;

        for i in 0..9 {
            let mut params_plus = params.clone();
            let mut params_minus = params.clone();
            params_plus[i] += eps;
            params_minus[i] -= eps;

            let mut cam_plus = camera;
            let mut cam_minus = camera;
            cam_plus.set_intrinsics(params_plus.as_slice())?;
            cam_minus.set_intrinsics(params_minus.as_slice())?;

            let numerical_jac =
                (cam_plus.project(&p_cam)? - cam_minus.project(&p_cam)?) / (2.0 * eps);

            for r in 0..2 {
                let analytical = jac_analytical[(r, i)];
                let numerical = numerical_jac[r];
                let rel_error = (analytical - numerical).abs() / (1.0 + numerical.abs());
                assert!(
                    rel_error < JACOBIAN_TEST_TOLERANCE,
                    "Intrinsics Jacobian mismatch at ({}, {}): analytical={}, numerical={}, rel_error={}",
                    r,
                    i,
                    analytical,
                    numerical,
                    rel_error
                );
            }
        }
        Ok(())
    }

    #[test]
    fn test_set_intrinsics_wrong_length() -> TestResult {
        let mut camera = test_camera()?;
        assert!(camera.set_intrinsics(&[1.0; 4]).is_err());
        Ok(())
    }
}
