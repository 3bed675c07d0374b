//! Collision and out-of-bounds checks on raw body state.

use multiquad_math::tilt_angle;
use multiquad_physics::BodyState;

use crate::error::EnvError;
use crate::reward::COLLISION_DISTANCE;

/// Largest allowed tilt from world up, degrees.
pub const MAX_TILT_DEG: f64 = 80.0;
/// Lowest allowed height for any body, meters.
pub const MIN_HEIGHT: f64 = 0.05;

/// Geometry-derived flags for one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafetyAssessment {
    /// Tilt of agent 1, radians.
    pub angle_q1: f64,
    /// Tilt of agent 2, radians.
    pub angle_q2: f64,
    /// Distance between the agents, meters.
    pub quad_distance: f64,
    /// Agents are closer than [`COLLISION_DISTANCE`].
    pub collision: bool,
    /// Some body left the allowed region or an agent tipped over.
    pub out_of_bounds: bool,
}

/// Evaluate tilt, separation and height limits.
pub fn assess(
    payload: &BodyState,
    agent1: &BodyState,
    agent2: &BodyState,
) -> Result<SafetyAssessment, EnvError> {
    let angle_q1 = tilt_angle(&agent1.pose.orientation)?;
    let angle_q2 = tilt_angle(&agent2.pose.orientation)?;
    let quad_distance = (agent1.position() - agent2.position()).norm();

    let max_tilt = MAX_TILT_DEG.to_radians();
    let payload_z = payload.position().z;
    let agent_out = |angle: f64, agent: &BodyState| {
        let z = agent.position().z;
        angle.abs() > max_tilt || z < MIN_HEIGHT || z < payload_z
    };
    let out_of_bounds =
        agent_out(angle_q1, agent1) || agent_out(angle_q2, agent2) || payload_z < MIN_HEIGHT;

    Ok(SafetyAssessment {
        angle_q1,
        angle_q2,
        quad_distance,
        collision: quad_distance < COLLISION_DISTANCE,
        out_of_bounds,
    })
}
