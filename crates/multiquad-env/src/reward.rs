//! Shaped reward and termination.
//!
//! The reward is a fixed weighted sum of tracking, safety, attitude and
//! effort terms, divided by [`REWARD_SCALE`]. None of the weights are
//! configurable.

use multiquad_math::NORM_EPSILON;
use serde::{Deserialize, Serialize};

use crate::action::{Action, ThrustCommand, ACTION_DIM};
use crate::error::{ensure_finite, EnvError};
use crate::observation::{Agent, Observation};

/// Agents closer than this have collided (meters).
pub const COLLISION_DISTANCE: f64 = 0.11;
/// Separation at which the safe-distance reward saturates (meters).
pub const SAFE_DISTANCE: f64 = 0.15;
/// Penalty for a collision.
pub const COLLISION_PENALTY: f64 = 5.0;
/// Penalty for leaving the allowed region.
pub const OUT_OF_BOUNDS_PENALTY: f64 = 50.0;
/// Final divisor applied to the weighted sum.
pub const REWARD_SCALE: f64 = 25.0;

/// Everything the reward depends on for one step.
#[derive(Debug, Clone, Copy)]
pub struct RewardInputs<'a> {
    /// Observation after the step.
    pub obs: &'a Observation,
    /// Simulated time after the step.
    pub time: f64,
    /// Agents closer than [`COLLISION_DISTANCE`].
    pub collision: bool,
    /// Out-of-bounds condition.
    pub out_of_bounds: bool,
    /// Thrust applied during the step.
    pub applied: &'a ThrustCommand,
    /// Tilt of agent 1 from world up, radians.
    pub angle_q1: f64,
    /// Tilt of agent 2 from world up, radians.
    pub angle_q2: f64,
    /// Action recorded before the step.
    pub prev_action: &'a Action,
}

/// Individual reward terms, before weighting.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RewardBreakdown {
    /// Payload distance shaping.
    pub distance_reward: f64,
    /// Cosine between payload error and payload velocity.
    pub velocity_towards_target: f64,
    /// Ramp over the safe separation band.
    pub safe_distance_reward: f64,
    /// Payload speed.
    pub linvel_penalty: f64,
    /// Collision penalty.
    pub collision_penalty: f64,
    /// Out-of-bounds penalty.
    pub out_of_bounds_penalty: f64,
    /// Mean change between applied thrust and previous action, normalized.
    pub smooth_action_penalty: f64,
    /// Mean applied thrust, normalized.
    pub action_energy_penalty: f64,
    /// Uprightness of both agents.
    pub up_reward: f64,
    /// Agent angular speed.
    pub ang_vel_penalty: f64,
    /// Agent linear speed.
    pub linvel_quad_penalty: f64,
    /// Final scaled reward.
    pub total: f64,
}

/// Which termination conditions fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Termination {
    /// Agents collided.
    pub collision: bool,
    /// Out-of-bounds condition.
    pub out_of_bounds: bool,
    /// Episode time limit exceeded.
    pub timed_out: bool,
}

impl Termination {
    /// At least one condition holds.
    pub fn is_terminal(&self) -> bool {
        self.collision || self.out_of_bounds || self.timed_out
    }
}

/// Computes reward and termination.
#[derive(Debug, Clone, Copy)]
pub struct RewardShaper {
    max_thrust: f64,
    max_episode_time: f64,
    check_finite: bool,
}

impl RewardShaper {
    /// Shaper for actuators saturating at `max_thrust` and episodes of at most
    /// `max_episode_time` seconds.
    pub fn new(max_thrust: f64, max_episode_time: f64, check_finite: bool) -> Self {
        Self {
            max_thrust,
            max_episode_time,
            check_finite,
        }
    }

    /// Reward terms for one step.
    pub fn reward(&self, inputs: &RewardInputs<'_>) -> Result<RewardBreakdown, EnvError> {
        let obs = inputs.obs;
        let payload_error = obs.payload_error();
        let payload_linvel = obs.payload_linvel();

        let dis = payload_error.norm();
        let z_error = payload_error.z.abs();
        let distance_reward =
            (1.0 - dis + (-10.0 * dis).exp()) + (-10.0 * z_error).exp() - z_error.powi(2);

        let velocity_towards_target = payload_error.dot(&payload_linvel)
            / (dis.max(NORM_EPSILON) * payload_linvel.norm().max(NORM_EPSILON));

        let quad_distance =
            (obs.agent_rel_position(Agent::One) - obs.agent_rel_position(Agent::Two)).norm();
        let safe_distance_reward = ((quad_distance - COLLISION_DISTANCE)
            / (SAFE_DISTANCE - COLLISION_DISTANCE))
            .clamp(0.0, 1.0);

        let collision_penalty = if inputs.collision { COLLISION_PENALTY } else { 0.0 };
        let out_of_bounds_penalty = if inputs.out_of_bounds {
            OUT_OF_BOUNDS_PENALTY
        } else {
            0.0
        };

        let applied = &inputs.applied.0;
        let prev = &inputs.prev_action.0;
        let smooth_action_penalty = applied
            .iter()
            .zip(prev)
            .map(|(a, p)| (a - p).abs())
            .sum::<f64>()
            / ACTION_DIM as f64
            / self.max_thrust;
        let action_energy_penalty =
            applied.iter().map(|a| a.abs()).sum::<f64>() / ACTION_DIM as f64 / self.max_thrust;

        let up_reward = (-inputs.angle_q1.abs()).exp() + (-inputs.angle_q2.abs()).exp();

        let ang_vel_penalty = 0.1
            * (obs.agent_angvel(Agent::One).norm_squared()
                + obs.agent_angvel(Agent::Two).norm_squared());
        let linvel_quad_penalty = 0.1
            * (obs.agent_linvel(Agent::One).norm_squared()
                + obs.agent_linvel(Agent::Two).norm_squared());
        let linvel_penalty = payload_linvel.norm();

        let weighted = 10.0 * distance_reward + safe_distance_reward + velocity_towards_target
            + up_reward
            - 10.0 * linvel_penalty
            - collision_penalty
            - out_of_bounds_penalty
            - 2.0 * smooth_action_penalty
            - action_energy_penalty
            - ang_vel_penalty
            - 5.0 * linvel_quad_penalty;
        let total = weighted / REWARD_SCALE;

        if self.check_finite {
            ensure_finite("reward", &[total])?;
        }

        Ok(RewardBreakdown {
            distance_reward,
            velocity_towards_target,
            safe_distance_reward,
            linvel_penalty,
            collision_penalty,
            out_of_bounds_penalty,
            smooth_action_penalty,
            action_energy_penalty,
            up_reward,
            ang_vel_penalty,
            linvel_quad_penalty,
            total,
        })
    }

    /// Termination conditions for one step.
    pub fn termination(&self, inputs: &RewardInputs<'_>) -> Termination {
        Termination {
            collision: inputs.collision,
            out_of_bounds: inputs.out_of_bounds,
            timed_out: inputs.time > self.max_episode_time,
        }
    }

    /// Reward and termination together.
    pub fn evaluate(
        &self,
        inputs: &RewardInputs<'_>,
    ) -> Result<(RewardBreakdown, Termination), EnvError> {
        Ok((self.reward(inputs)?, self.termination(inputs)))
    }
}
