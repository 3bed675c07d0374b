//! Contract between the environment and a rigid-body physics engine.

use multiquad_math::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::PhysicsError;

/// Number of generalized position values per free body `[x, y, z, qw, qx, qy, qz]`.
pub const QPOS_PER_BODY: usize = 7;

/// Number of generalized velocity values per free body `[vx, vy, vz, wx, wy, wz]`.
pub const QVEL_PER_BODY: usize = 6;

/// Opaque handle to a body, resolved once from its scene name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BodyId(usize);

impl BodyId {
    /// Handle for the body at `index` in scene order. Meant for engine
    /// implementations; environments obtain ids through [`PhysicsEngine::resolve`].
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }

    /// Position of the body in scene order.
    pub fn index(self) -> usize {
        self.0
    }
}

/// World pose of a body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Position in meters.
    pub position: Vec3,
    /// Orientation, `[w, x, y, z]` quaternion.
    pub orientation: Quat,
}

/// Kinematic state of a single body in world frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    /// Position and orientation.
    pub pose: Pose,
    /// Linear velocity (m/s).
    pub linvel: Vec3,
    /// Angular velocity (rad/s).
    pub angvel: Vec3,
    /// Linear acceleration (m/s²).
    pub linacc: Vec3,
    /// Angular acceleration (rad/s²).
    pub angacc: Vec3,
}

impl BodyState {
    /// A body at rest at `position` with identity orientation.
    pub fn at_rest(position: Vec3) -> Self {
        Self {
            pose: Pose {
                position,
                orientation: Quat::identity(),
            },
            linvel: Vec3::zeros(),
            angvel: Vec3::zeros(),
            linacc: Vec3::zeros(),
            angacc: Vec3::zeros(),
        }
    }

    /// World position.
    pub fn position(&self) -> Vec3 {
        self.pose.position
    }

    /// Spatial velocity laid out as `[angular; linear]`.
    pub fn spatial_velocity(&self) -> [f64; 6] {
        spatial(&self.angvel, &self.linvel)
    }

    /// Spatial acceleration laid out as `[angular; linear]`.
    pub fn spatial_acceleration(&self) -> [f64; 6] {
        spatial(&self.angacc, &self.linacc)
    }
}

fn spatial(angular: &Vec3, linear: &Vec3) -> [f64; 6] {
    [
        angular.x, angular.y, angular.z, linear.x, linear.y, linear.z,
    ]
}

/// Fixed integration timing: `substeps` physics steps of `dt` per control interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepTiming {
    /// Physics timestep in seconds.
    pub dt: f64,
    /// Physics steps per control interval.
    pub substeps: u32,
}

impl StepTiming {
    /// Timing for a policy running at `policy_freq` Hz with `substeps` physics
    /// steps per action.
    pub fn from_policy(policy_freq: f64, substeps: u32) -> Result<Self, PhysicsError> {
        if !(policy_freq.is_finite() && policy_freq > 0.0) {
            return Err(PhysicsError::InvalidTiming(format!(
                "policy frequency must be positive, got {policy_freq}"
            )));
        }
        if substeps == 0 {
            return Err(PhysicsError::InvalidTiming(
                "at least one substep per action is required".to_string(),
            ));
        }
        Ok(Self {
            dt: (1.0 / policy_freq) / substeps as f64,
            substeps,
        })
    }

    /// Length of one control interval in seconds.
    pub fn control_interval(&self) -> f64 {
        self.dt * self.substeps as f64
    }
}

/// Read access to an engine snapshot.
pub trait SimSnapshot {
    /// State of a body previously resolved by name.
    fn body_state(&self, body: BodyId) -> Result<BodyState, PhysicsError>;

    /// Simulated time in seconds since `init`.
    fn time(&self) -> f64;
}

/// A rigid-body engine driven by actuator commands.
///
/// Implementations are stateless between calls: `init` and `step` return new
/// snapshots and never mutate their inputs, so one engine can serve many
/// episodes in parallel.
pub trait PhysicsEngine: Send + Sync {
    /// Opaque simulation state.
    type Snapshot: SimSnapshot + Clone + Send + Sync;

    /// Resolve a named body. Called once at environment construction.
    fn resolve(&self, name: &str) -> Result<BodyId, PhysicsError>;

    /// Integration timing used by [`PhysicsEngine::step`].
    fn timing(&self) -> StepTiming;

    /// Number of actuators.
    fn num_actuators(&self) -> usize;

    /// Body driven by `actuator`, or `None` when out of range.
    fn actuated_body(&self, actuator: usize) -> Option<BodyId>;

    /// Number of generalized position values.
    fn nq(&self) -> usize;

    /// Number of generalized velocity values.
    fn nv(&self) -> usize;

    /// Nominal generalized positions (the scene's rest pose).
    fn nominal_qpos(&self) -> Vec<f64>;

    /// Build a snapshot from generalized positions and velocities.
    fn init(&self, qpos: &[f64], qvel: &[f64]) -> Result<Self::Snapshot, PhysicsError>;

    /// Advance one control interval under constant actuator commands.
    fn step(
        &self,
        snapshot: &Self::Snapshot,
        controls: &[f64],
    ) -> Result<Self::Snapshot, PhysicsError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_timing_from_policy() {
        let t = StepTiming::from_policy(250.0, 4).unwrap();
        assert_relative_eq!(t.dt, 0.001);
        assert_relative_eq!(t.control_interval(), 0.004);
    }

    #[test]
    fn test_timing_rejects_bad_input() {
        assert!(StepTiming::from_policy(0.0, 1).is_err());
        assert!(StepTiming::from_policy(f64::NAN, 1).is_err());
        assert!(StepTiming::from_policy(100.0, 0).is_err());
    }

    #[test]
    fn test_spatial_layout_is_angular_then_linear() {
        let mut s = BodyState::at_rest(Vec3::zeros());
        s.angvel = Vec3::new(1.0, 2.0, 3.0);
        s.linvel = Vec3::new(4.0, 5.0, 6.0);
        assert_eq!(s.spatial_velocity(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }
}
