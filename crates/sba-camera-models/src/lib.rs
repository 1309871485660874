//! Camera projection models for bundle adjustment.
//!
//! Every model maps a point expressed in the camera frame to pixel coordinates and
//! provides the analytic Jacobians the bundle adjustment assembler needs:
//!
//! - `∂(u,v)/∂(x,y,z)`: 2×3 gradient with respect to the camera-frame point
//! - `∂(u,v)/∂θ`: 2×K gradient with respect to the K intrinsic parameters
//!
//! # Key Components
//!
//! - **`CameraModel` trait**: object-safe interface, stored as `Box<dyn CameraModel>` so a
//!   scene can mix models chosen at load time
//! - **`PinholeParams`**: the linear intrinsics shared by the pinhole-family models
//!
//! # Available Camera Models
//!
//! - **Pinhole**: standard perspective projection (fx, fy, cx, cy)
//! - **Radial-Tangential**: OpenCV-compatible distortion model (9 parameters)
//! - **BAL Pinhole**: Bundle Adjustment in the Large convention (f, k1, k2, camera looks down -Z)

use nalgebra::{DVector, Matrix2x3, Matrix2xX, SMatrix, Vector2, Vector3};

// ============================================================================
// Precision Constants
// ============================================================================

/// Minimum depth for valid 3D points (meters).
///
/// Points closer than this to the camera are considered invalid.
/// Default: 1e-6 meters (1 micrometer)
pub const MIN_DEPTH: f64 = 1e-6;

/// Epsilon for numerical differentiation in Jacobian computation.
///
/// Used when computing numerical derivatives for validation and testing.
/// Default: 1e-7 (provides good balance between truncation and round-off error)
pub const NUMERICAL_DERIVATIVE_EPS: f64 = 1e-7;

/// Tolerance for numerical Jacobian validation in tests.
///
/// Maximum allowed difference between analytical and numerical Jacobians.
/// Default: 1e-5 (allows for small numerical errors in finite differences)
pub const JACOBIAN_TEST_TOLERANCE: f64 = 1e-5;

/// Camera model errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CameraModelError {
    #[error("z is close to zero, point is at camera center")]
    PointAtCameraCenter,
    #[error("Focal length must be positive")]
    FocalLengthMustBePositive,
    #[error("Principal point must be finite")]
    PrincipalPointMustBeFinite,
    #[error("Expected {expected} intrinsic parameters, got {actual}")]
    ParameterCount { expected: usize, actual: usize },
    #[error("Invalid camera parameters: {0}")]
    InvalidParams(String),
}

/// The "Common 4" - Linear intrinsic parameters.
///
/// These define the projection matrix K for the pinhole camera model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinholeParams {
    /// Focal length in x direction (pixels)
    pub fx: f64,
    /// Focal length in y direction (pixels)
    pub fy: f64,
    /// Principal point x-coordinate (pixels)
    pub cx: f64,
    /// Principal point y-coordinate (pixels)
    pub cy: f64,
}

impl PinholeParams {
    /// Create new pinhole parameters with validation.
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Result<Self, CameraModelError> {
        let params = Self { fx, fy, cx, cy };
        params.validate()?;
        Ok(params)
    }

    /// Check focal lengths and principal point.
    pub fn validate(&self) -> Result<(), CameraModelError> {
        if self.fx <= 0.0 || self.fy <= 0.0 {
            return Err(CameraModelError::FocalLengthMustBePositive);
        }
        if !self.cx.is_finite() || !self.cy.is_finite() {
            return Err(CameraModelError::PrincipalPointMustBeFinite);
        }
        Ok(())
    }
}

/// Reject a parameter slice whose length differs from the model's intrinsic count.
pub fn check_parameter_count(expected: usize, params: &[f64]) -> Result<(), CameraModelError> {
    if params.len() != expected {
        return Err(CameraModelError::ParameterCount {
            expected,
            actual: params.len(),
        });
    }
    Ok(())
}

/// Copy a fixed-size 2×N Jacobian into a dynamically sized one.
pub(crate) fn to_dynamic<const N: usize>(jacobian: &SMatrix<f64, 2, N>) -> Matrix2xX<f64> {
    let mut out = Matrix2xX::zeros(N);
    out.copy_from(jacobian);
    out
}

// Camera model modules

pub mod bal_pinhole;
pub mod pinhole;
pub mod rad_tan;

// Re-export camera types
pub use bal_pinhole::BalPinholeCamera;
pub use pinhole::PinholeCamera;
pub use rad_tan::RadTanCamera;

// Camera Model Trait

/// Trait for camera projection models.
///
/// The trait is object safe: scenes hold cameras as `Box<dyn CameraModel>` and the
/// Jacobian assembler only talks to them through this interface. Intrinsics are exchanged
/// as flat slices in a model-specific but fixed order, which is the order the parameter
/// vector of the optimizer uses.
pub trait CameraModel: Send + Sync + std::fmt::Debug + 'static {
    /// Number of intrinsic parameters K.
    fn intrinsic_count(&self) -> usize;

    /// Current intrinsic parameters in parameter-vector order.
    fn intrinsics(&self) -> DVector<f64>;

    /// Overwrite the intrinsic parameters from a slice of exactly K values.
    ///
    /// Values are not validated: during optimization an intermediate estimate may leave the
    /// physically meaningful range. Call [`CameraModel::validate_params`] when that matters.
    ///
    /// # Errors
    ///
    /// [`CameraModelError::ParameterCount`] if `params.len() != intrinsic_count()`.
    fn set_intrinsics(&mut self, params: &[f64]) -> Result<(), CameraModelError>;

    /// Projects a 3D point in the camera frame to 2D image coordinates.
    ///
    /// # Returns
    ///
    /// - `Ok(uv)` - 2D image coordinates if projection is valid
    /// - `Err(CameraModelError)` - If point cannot be projected with specific error reason
    fn project(&self, p_cam: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError>;

    /// Checks if a 3D point can be validly projected.
    fn is_valid_point(&self, p_cam: &Vector3<f64>) -> bool;

    /// Jacobian of projection w.r.t. 3D point coordinates (2×3).
    ///
    /// Returns ∂(u,v)/∂(x,y,z) where (x,y,z) is the point in camera frame.
    fn jacobian_point(&self, p_cam: &Vector3<f64>) -> Matrix2x3<f64>;

    /// Jacobian of projection w.r.t. intrinsic parameters (2×K).
    fn jacobian_intrinsics(&self, p_cam: &Vector3<f64>) -> Matrix2xX<f64>;

    /// Point gradient and, when requested, intrinsic gradient at `p_cam`.
    ///
    /// This is the single entry point used by the Jacobian assembler. Models that share
    /// intermediate terms between the two Jacobians may override it.
    fn gradient(
        &self,
        p_cam: &Vector3<f64>,
        with_intrinsics: bool,
    ) -> (Matrix2x3<f64>, Option<Matrix2xX<f64>>) {
        let point = self.jacobian_point(p_cam);
        let intrinsics = with_intrinsics.then(|| self.jacobian_intrinsics(p_cam));
        (point, intrinsics)
    }

    /// Validates camera parameters.
    fn validate_params(&self) -> Result<(), CameraModelError>;

    /// Get model name identifier.
    fn model_name(&self) -> &'static str;

    /// Clone into a new boxed trait object.
    fn clone_box(&self) -> Box<dyn CameraModel>;
}

impl Clone for Box<dyn CameraModel> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_pinhole_params_validation() {
        assert!(PinholeParams::new(500.0, 500.0, 320.0, 240.0).is_ok());
        assert_eq!(
            PinholeParams::new(0.0, 500.0, 320.0, 240.0),
            Err(CameraModelError::FocalLengthMustBePositive)
        );
        assert_eq!(
            PinholeParams::new(500.0, 500.0, f64::NAN, 240.0),
            Err(CameraModelError::PrincipalPointMustBeFinite)
        );
    }

    #[test]
    fn test_check_parameter_count() {
        assert!(check_parameter_count(3, &[1.0, 2.0, 3.0]).is_ok());
        assert_eq!(
            check_parameter_count(4, &[1.0]),
            Err(CameraModelError::ParameterCount {
                expected: 4,
                actual: 1
            })
        );
    }

    #[test]
    fn test_boxed_models_report_their_width() -> TestResult {
        let cameras: Vec<Box<dyn CameraModel>> = vec![
            Box::new(PinholeCamera::new(500.0, 500.0, 320.0, 240.0)?),
            Box::new(RadTanCamera::new(
                PinholeParams::new(500.0, 500.0, 320.0, 240.0)?,
                [0.1, -0.05, 0.001, 0.002, 0.01],
            )?),
            Box::new(BalPinholeCamera::new(500.0, 0.1, 0.01)?),
        ];

        for camera in &cameras {
            assert_eq!(camera.intrinsics().len(), camera.intrinsic_count());
            let p_cam = if camera.model_name() == "bal_pinhole" {
                Vector3::new(0.1, 0.2, -2.0)
            } else {
                Vector3::new(0.1, 0.2, 2.0)
            };
            let (point, intrinsics) = camera.gradient(&p_cam, true);
            assert_eq!(point, camera.jacobian_point(&p_cam));
            let intrinsics = intrinsics.ok_or("intrinsic gradient requested")?;
            assert_eq!(intrinsics.ncols(), camera.intrinsic_count());
            assert!(camera.gradient(&p_cam, false).1.is_none());
        }
        Ok(())
    }

    #[test]
    fn test_boxed_clone_is_independent() -> TestResult {
        let original: Box<dyn CameraModel> = Box::new(PinholeCamera::new(500.0, 500.0, 1.0, 2.0)?);
        let mut copy = original.clone();
        copy.set_intrinsics(&[100.0, 100.0, 0.0, 0.0])?;
        assert_eq!(original.intrinsics()[0], 500.0);
        assert_eq!(copy.intrinsics()[0], 100.0);
        Ok(())
    }
}
