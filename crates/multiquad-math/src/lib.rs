#![warn(missing_docs)]

//! Math helpers for the multiquad environment.
//!
//! Thin wrappers around nalgebra: vector and quaternion aliases, rotation
//! matrices from `[w, x, y, z]` quaternions, and the guarded angle between
//! two vectors used for tilt detection.

use nalgebra::{Matrix3, Quaternion, Vector3};
use thiserror::Error;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A 3x3 rotation matrix.
pub type Mat3 = Matrix3<f64>;

/// An orientation quaternion. Not assumed to be normalized.
pub type Quat = Quaternion<f64>;

/// Epsilon added to norm products before dividing.
pub const NORM_EPSILON: f64 = 1e-6;

/// Errors raised by the math helpers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    /// Quaternion with zero or non-finite norm.
    #[error("degenerate quaternion [{w}, {x}, {y}, {z}] cannot be normalized")]
    DegenerateQuaternion {
        /// Scalar part.
        w: f64,
        /// First vector component.
        x: f64,
        /// Second vector component.
        y: f64,
        /// Third vector component.
        z: f64,
    },
}

/// World up direction (z-up).
pub fn world_up() -> Vec3 {
    Vec3::new(0.0, 0.0, 1.0)
}

/// Build a quaternion from `[w, x, y, z]` components.
pub fn quat_from_wxyz(q: [f64; 4]) -> Quat {
    Quaternion::new(q[0], q[1], q[2], q[3])
}

/// Rotation matrix from a quaternion in `[w, x, y, z]` order.
///
/// The quaternion is normalized first. There is no epsilon guard: a zero
/// quaternion is an invariant violation and is reported as an error instead
/// of producing NaN entries.
pub fn rotation_matrix(q: &Quat) -> Result<Mat3, MathError> {
    let norm = q.norm();
    if norm == 0.0 || !norm.is_finite() {
        return Err(MathError::DegenerateQuaternion {
            w: q.w,
            x: q.i,
            y: q.j,
            z: q.k,
        });
    }

    let (w, x, y, z) = (q.w / norm, q.i / norm, q.j / norm, q.k / norm);
    Ok(Matrix3::new(
        1.0 - 2.0 * (y * y + z * z),
        2.0 * (x * y - z * w),
        2.0 * (x * z + y * w),
        2.0 * (x * y + z * w),
        1.0 - 2.0 * (x * x + z * z),
        2.0 * (y * z - x * w),
        2.0 * (x * z - y * w),
        2.0 * (y * z + x * w),
        1.0 - 2.0 * (x * x + y * y),
    ))
}

/// Flatten a 3x3 matrix row by row.
pub fn flatten_row_major(m: &Mat3) -> [f64; 9] {
    let mut out = [0.0; 9];
    for row in 0..3 {
        for col in 0..3 {
            out[row * 3 + col] = m[(row, col)];
        }
    }
    out
}

/// Angle in `[0, π]` between two vectors.
///
/// [`NORM_EPSILON`] is added to the norm product so zero-length inputs do not
/// divide by zero, and the cosine is clipped to `[-1, 1]` before `acos`.
pub fn angle_between(v1: &Vec3, v2: &Vec3) -> f64 {
    let cos_theta = v1.dot(v2) / (v1.norm() * v2.norm() + NORM_EPSILON);
    cos_theta.clamp(-1.0, 1.0).acos()
}

/// Angle between a body's local up axis and world up.
///
/// The local up axis is the z column of the body's rotation matrix.
pub fn tilt_angle(q: &Quat) -> Result<f64, MathError> {
    let r = rotation_matrix(q)?;
    let local_up: Vec3 = r.column(2).into_owned();
    Ok(angle_between(&local_up, &world_up()))
}
