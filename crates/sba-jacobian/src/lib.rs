//! # SBA Jacobian
//!
//! Sparse Jacobian assembly for metric bundle adjustment, split for a Schur-complement solve.
//!
//! The residuals of a bundle adjustment problem are the reprojection errors of every
//! observation. Their Jacobian is returned as two sparse matrices sharing the same rows:
//!
//! - **left**: derivatives with respect to the 3D points, one block column per point
//! - **right**: derivatives with respect to the unknown view poses and camera intrinsics
//!
//! which is the partition a Schur-complement solver eliminates the points with.
//!
//! ## Features
//!
//! - **Known/unknown scene elements**: fixed views and cameras contribute no columns
//! - **Euclidean and homogeneous points**: 3 or 4 coordinates per point
//! - **Rodrigues pose parameterization** with exact rotation derivatives
//! - **Pluggable camera models** through [`CameraModel`]
//! - **Optional parallel assembly** with bit-identical output
//!
//! ## Crates
//!
//! - [`sba_manifolds`]: Rodrigues rotation and its derivatives
//! - [`sba_camera_models`]: projection models and their gradients
//! - [`sba_io`]: BAL dataset loader

// Re-export workspace crates
pub use sba_camera_models;
pub use sba_io;
pub use sba_manifolds;

pub use sba_camera_models::{BalPinholeCamera, CameraModel, PinholeCamera, RadTanCamera};
pub use sba_io::{BalDataset, BalLoader};

// Local modules
pub mod codec;
pub mod dataset;
pub mod error;
pub mod jacobian;
pub mod layout;
pub mod logger;
pub mod residual;
pub mod scene;
pub mod sparse;

pub use codec::SceneCodec;
pub use dataset::scene_from_bal;
pub use error::{SbaError, SbaResult};
pub use jacobian::{JacobianError, SchurJacobian, SchurJacobianConfig, validate_scene};
pub use layout::{ParameterLayout, ParameterSlot, VIEW_PARAMETER_COUNT};
pub use logger::{init_logger, init_logger_with_level};
pub use residual::ReprojectionResidual;
pub use scene::{
    Estimate, Observation, ObservationView, SceneCamera, SceneObservations, ScenePoint,
    SceneStructureMetric, SceneView,
};
pub use sparse::{SparseError, SparseMatrix, TripletAccumulator};
