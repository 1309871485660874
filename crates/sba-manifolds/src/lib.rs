//! Rotation parameterizations used by the bundle adjustment Jacobian.
//!
//! Unknown view orientations are optimized as Rodrigues (axis-angle) vectors: a minimal
//! three-parameter representation whose derivatives are available in closed form.
//!
//! | Representation | size | dim | X                     | Constraint | Exp(v)                             |
//! | -------------- | ---- | --- | --------------------- | ---------- | ---------------------------------- |
//! | Rodrigues      | 3    | 3   | v = θ·u ∈ R³          | none       | R = I + sinθ/θ [v]ₓ + (1-cosθ)/θ² [v]ₓ² |
//! | Rotation       | 9    | 3   | R ∈ SO(3)             | RᵀR = I    |                                    |
//!
//! # Example
//!
//! ```
//! use nalgebra::Vector3;
//! use sba_manifolds::rodrigues::RodriguesJacobian;
//!
//! let mut jacobian = RodriguesJacobian::new();
//! jacobian.process(&Vector3::new(0.1, -0.2, 0.05));
//! let [d_rx, d_ry, d_rz] = jacobian.partials();
//! assert!(d_rx.iter().chain(d_ry.iter()).chain(d_rz.iter()).all(|v| v.is_finite()));
//! ```

use nalgebra::{Matrix3, Vector3};

pub mod rodrigues;

pub use rodrigues::{RodriguesJacobian, matrix_to_rodrigues, rodrigues_to_matrix};

/// Squared rotation angle below which the series expansions are used instead of the
/// trigonometric closed forms.
pub const SMALL_ANGLE_THRESHOLD: f64 = 1e-10;

/// Compute skew-symmetric matrix from a 3D vector.
///
/// Returns the cross-product matrix [v]× such that [v]× w = v × w.
///
/// ```text
/// [  0  -vz   vy ]
/// [ vz    0  -vx ]
/// [-vy   vx    0 ]
/// ```
#[inline]
pub fn skew_symmetric(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// Get the ith generator of the so(3) Lie algebra, i.e. `[e_i]×`.
///
/// # Panics
///
/// Panics if `i >= 3`.
pub fn generator(i: usize) -> Matrix3<f64> {
    assert!(i < 3, "SO(3) only has generators for indices 0, 1, 2");

    match i {
        0 => Matrix3::new(0.0, 0.0, 0.0, 0.0, 0.0, -1.0, 0.0, 1.0, 0.0),
        1 => Matrix3::new(0.0, 0.0, 1.0, 0.0, 0.0, 0.0, -1.0, 0.0, 0.0),
        2 => Matrix3::new(0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0),
        _ => unreachable!(),
    }
}
