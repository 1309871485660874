//! Error types for the sba-jacobian library
//!
//! Each module reports its own `thiserror` enum; this module provides the umbrella
//! error and result types that binaries and callers spanning several crates use.

use crate::jacobian::JacobianError;
use crate::sparse::SparseError;
use sba_camera_models::CameraModelError;
use sba_io::IoError;
use thiserror::Error;

/// Main result type used throughout the sba-jacobian library
pub type SbaResult<T> = Result<T, SbaError>;

/// Main error type for the sba-jacobian library
#[derive(Debug, Clone, Error)]
pub enum SbaError {
    /// Dataset loading and parsing errors
    #[error("IO error: {0}")]
    Io(String),

    /// Camera model errors
    #[error("Camera error: {0}")]
    Camera(String),

    /// Sparse matrix assembly errors
    #[error("Sparse matrix error: {0}")]
    Sparse(String),

    /// Jacobian configuration and evaluation errors
    #[error("Jacobian error: {0}")]
    Jacobian(String),

    /// Invalid input parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<std::io::Error> for SbaError {
    fn from(err: std::io::Error) -> Self {
        SbaError::Io(err.to_string())
    }
}

impl From<IoError> for SbaError {
    fn from(err: IoError) -> Self {
        SbaError::Io(err.to_string())
    }
}

impl From<CameraModelError> for SbaError {
    fn from(err: CameraModelError) -> Self {
        SbaError::Camera(err.to_string())
    }
}

impl From<SparseError> for SbaError {
    fn from(err: SparseError) -> Self {
        SbaError::Sparse(err.to_string())
    }
}

impl From<JacobianError> for SbaError {
    fn from(err: JacobianError) -> Self {
        SbaError::Jacobian(err.to_string())
    }
}
