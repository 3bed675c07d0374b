//! Rotor layout and thrust-to-wrench mapping for quadrotor bodies.

use nalgebra::{Isometry3, Point3, Vector3};

use crate::scene::ROTORS_PER_QUAD;

/// One rotor attached to a body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotor {
    /// Index of the carrying body in scene order.
    pub body: usize,
    /// Rotor hub position in the body frame.
    pub offset: Point3<f32>,
    /// Reaction yaw torque per newton of thrust (sign encodes spin direction).
    pub yaw_coeff: f32,
}

/// Rotors of an X-configuration quadrotor.
///
/// Order: front-right, back-right, back-left, front-left; spin direction
/// alternates so equal thrusts produce no net yaw torque.
pub fn x_layout(body: usize, arm_length: f32, yaw_torque_coeff: f32) -> [Rotor; ROTORS_PER_QUAD] {
    let d = arm_length / std::f32::consts::SQRT_2;
    let hub = |x: f32, y: f32, spin: f32| Rotor {
        body,
        offset: Point3::new(x, y, 0.0),
        yaw_coeff: spin * yaw_torque_coeff,
    };
    [
        hub(d, -d, -1.0),
        hub(-d, -d, 1.0),
        hub(-d, d, -1.0),
        hub(d, d, 1.0),
    ]
}

/// World-frame wrench produced by one rotor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotorWrench {
    /// Force along the body z axis.
    pub force: Vector3<f32>,
    /// Point of application in world coordinates.
    pub point: Point3<f32>,
    /// Reaction torque about the body z axis.
    pub torque: Vector3<f32>,
}

impl Rotor {
    /// Wrench for `thrust` newtons with the body at `pose`.
    pub fn wrench(&self, pose: &Isometry3<f32>, thrust: f32) -> RotorWrench {
        let axis = pose.rotation * Vector3::z();
        RotorWrench {
            force: axis * thrust,
            point: pose * self.offset,
            torque: axis * (self.yaw_coeff * thrust),
        }
    }
}
