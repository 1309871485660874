//! Rodrigues rotation vector and the derivative of its rotation matrix.
//!
//! A Rodrigues vector `v = θ·u` encodes a rotation of angle `θ = ‖v‖` about the unit axis
//! `u`. The rotation matrix is
//!
//! ```text
//! R(v) = I + (sin θ / θ) [v]ₓ + ((1 - cos θ) / θ²) [v]ₓ²
//! ```
//!
//! and its partial derivatives (Gallego & Yezzi, "A compact formula for the derivative of a
//! 3-D rotation in exponential coordinates", 2014) are
//!
//! ```text
//! ∂R/∂vᵢ = ((vᵢ [v]ₓ + [v × ((I - R) eᵢ)]ₓ) / θ²) · R
//! ```
//!
//! # Small angles
//!
//! Both formulas divide by θ², so below [`SMALL_ANGLE_THRESHOLD`] the second order series
//! `R ≈ I + [v]ₓ + ½[v]ₓ²` is used, together with its exact derivative
//!
//! ```text
//! ∂R/∂vᵢ ≈ [eᵢ]ₓ + ½ ([eᵢ]ₓ [v]ₓ + [v]ₓ [eᵢ]ₓ)
//! ```
//!
//! At the zero vector this reduces to the so(3) generators `[eᵢ]ₓ`, so optimizers evaluating
//! at (or starting from) the identity rotation never see NaN.

use crate::{SMALL_ANGLE_THRESHOLD, generator, skew_symmetric};
use nalgebra::{Matrix3, Rotation3, Vector3};

/// Convert a Rodrigues vector into a rotation matrix.
pub fn rodrigues_to_matrix(v: &Vector3<f64>) -> Matrix3<f64> {
    let theta_squared = v.norm_squared();
    let v_skew = skew_symmetric(v);
    let v_skew2 = v_skew * v_skew;

    if theta_squared <= SMALL_ANGLE_THRESHOLD {
        Matrix3::identity() + v_skew + 0.5 * v_skew2
    } else {
        let theta = theta_squared.sqrt();
        Matrix3::identity()
            + (theta.sin() / theta) * v_skew
            + ((1.0 - theta.cos()) / theta_squared) * v_skew2
    }
}

/// Convert a rotation matrix into a Rodrigues vector with angle in `[0, π]`.
///
/// The matrix is re-orthonormalized before the conversion, so slightly drifted rotation
/// matrices are accepted.
pub fn matrix_to_rodrigues(rotation: &Matrix3<f64>) -> Vector3<f64> {
    Rotation3::from_matrix(rotation).scaled_axis()
}

/// Rotation matrix of a Rodrigues vector together with its three partial derivatives.
///
/// The struct is meant to be reused: [`RodriguesJacobian::process`] overwrites every field,
/// so an assembler can keep one instance and call it once per view.
#[derive(Debug, Clone, PartialEq)]
pub struct RodriguesJacobian {
    /// Rotation matrix `R(v)`
    pub rotation: Matrix3<f64>,
    /// `[∂R/∂vx, ∂R/∂vy, ∂R/∂vz]`
    pub partials: [Matrix3<f64>; 3],
}

impl Default for RodriguesJacobian {
    fn default() -> Self {
        Self::new()
    }
}

impl RodriguesJacobian {
    /// Jacobian evaluated at the zero vector (identity rotation).
    pub fn new() -> Self {
        Self {
            rotation: Matrix3::identity(),
            partials: [generator(0), generator(1), generator(2)],
        }
    }

    /// Evaluate the rotation and its derivatives at `v`.
    pub fn from_rodrigues(v: &Vector3<f64>) -> Self {
        let mut jacobian = Self::new();
        jacobian.process(v);
        jacobian
    }

    /// Recompute the rotation matrix and the three partial derivatives at `v`.
    pub fn process(&mut self, v: &Vector3<f64>) {
        self.rotation = rodrigues_to_matrix(v);

        let theta_squared = v.norm_squared();
        let v_skew = skew_symmetric(v);

        if theta_squared <= SMALL_ANGLE_THRESHOLD {
            for (i, partial) in self.partials.iter_mut().enumerate() {
                let e_skew = generator(i);
                *partial = e_skew + 0.5 * (e_skew * v_skew + v_skew * e_skew);
            }
            return;
        }

        let i_minus_r = Matrix3::identity() - self.rotation;
        let inv_theta_squared = 1.0 / theta_squared;

        for (i, partial) in self.partials.iter_mut().enumerate() {
            let column: Vector3<f64> = i_minus_r.column(i).into_owned();
            let cross = v.cross(&column);
            *partial = (v[i] * v_skew + skew_symmetric(&cross)) * self.rotation * inv_theta_squared;
        }
    }

    /// Borrow the three partial derivatives.
    pub fn partials(&self) -> [&Matrix3<f64>; 3] {
        [&self.partials[0], &self.partials[1], &self.partials[2]]
    }
}
