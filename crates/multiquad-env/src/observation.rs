//! Fixed-layout observation vector.
//!
//! | Range | Field |
//! |---|---|
//! | 0..3 | target - payload position |
//! | 3..6 | payload linear velocity |
//! | 6..30 | agent 1 block (see [`layout`]) |
//! | 30..54 | agent 2 block |
//! | 54..62 | previous action |

use std::ops::Range;

use multiquad_math::{flatten_row_major, rotation_matrix, Vec3};
use multiquad_physics::BodyState;

use crate::action::{Action, ACTION_DIM};
use crate::error::{ensure_finite, EnvError};

/// Observation length.
pub const OBS_DIM: usize = 62;

/// Offsets into the observation vector.
pub mod layout {
    use std::ops::Range;

    /// Target minus payload position.
    pub const PAYLOAD_ERROR: Range<usize> = 0..3;
    /// Payload linear velocity.
    pub const PAYLOAD_LINVEL: Range<usize> = 3..6;
    /// Start of the first agent's block.
    pub const AGENT1: usize = 6;
    /// Start of the second agent's block.
    pub const AGENT2: usize = 30;
    /// Width of one agent block.
    pub const AGENT_BLOCK: usize = 24;
    /// Previous action.
    pub const PREV_ACTION: Range<usize> = 54..62;

    /// Agent position relative to the payload, within an agent block.
    pub const REL_POSITION: Range<usize> = 0..3;
    /// Row-major rotation matrix, within an agent block.
    pub const ROTATION: Range<usize> = 3..12;
    /// Linear velocity, within an agent block.
    pub const LINVEL: Range<usize> = 12..15;
    /// Angular velocity, within an agent block.
    pub const ANGVEL: Range<usize> = 15..18;
    /// Linear acceleration, within an agent block.
    pub const LINACC: Range<usize> = 18..21;
    /// Angular acceleration, within an agent block.
    pub const ANGACC: Range<usize> = 21..24;
}

/// Which vehicle an agent block belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Agent {
    /// First vehicle.
    One,
    /// Second vehicle.
    Two,
}

impl Agent {
    fn block_start(self) -> usize {
        match self {
            Agent::One => layout::AGENT1,
            Agent::Two => layout::AGENT2,
        }
    }
}

/// Immutable observation vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation([f64; OBS_DIM]);

impl Observation {
    /// All components.
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Always [`OBS_DIM`].
    pub fn len(&self) -> usize {
        OBS_DIM
    }

    /// Never empty.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Target minus payload position.
    pub fn payload_error(&self) -> Vec3 {
        self.vec3(layout::PAYLOAD_ERROR)
    }

    /// Payload linear velocity.
    pub fn payload_linvel(&self) -> Vec3 {
        self.vec3(layout::PAYLOAD_LINVEL)
    }

    /// Agent position relative to the payload.
    pub fn agent_rel_position(&self, agent: Agent) -> Vec3 {
        self.agent_vec3(agent, layout::REL_POSITION)
    }

    /// Agent linear velocity.
    pub fn agent_linvel(&self, agent: Agent) -> Vec3 {
        self.agent_vec3(agent, layout::LINVEL)
    }

    /// Agent angular velocity.
    pub fn agent_angvel(&self, agent: Agent) -> Vec3 {
        self.agent_vec3(agent, layout::ANGVEL)
    }

    /// Agent rotation matrix, row-major.
    pub fn agent_rotation(&self, agent: Agent) -> &[f64] {
        let start = agent.block_start();
        &self.0[start + layout::ROTATION.start..start + layout::ROTATION.end]
    }

    /// Action recorded in the observation tail.
    pub fn prev_action(&self) -> &[f64] {
        &self.0[layout::PREV_ACTION]
    }

    fn vec3(&self, range: Range<usize>) -> Vec3 {
        Vec3::from_column_slice(&self.0[range])
    }

    fn agent_vec3(&self, agent: Agent, field: Range<usize>) -> Vec3 {
        let start = agent.block_start();
        self.vec3(start + field.start..start + field.end)
    }
}

impl AsRef<[f64]> for Observation {
    fn as_ref(&self) -> &[f64] {
        &self.0
    }
}

/// Builds observations from body states.
#[derive(Debug, Clone, Copy)]
pub struct ObservationBuilder {
    check_finite: bool,
}

impl ObservationBuilder {
    /// Builder; with `check_finite` set, NaN or infinite components are errors.
    pub fn new(check_finite: bool) -> Self {
        Self { check_finite }
    }

    /// Assemble the observation for one step.
    ///
    /// `prev_action` is written verbatim into the tail.
    pub fn build(
        &self,
        payload: &BodyState,
        agent1: &BodyState,
        agent2: &BodyState,
        target: &Vec3,
        prev_action: &Action,
    ) -> Result<Observation, EnvError> {
        let mut obs = [0.0; OBS_DIM];
        let payload_pos = payload.position();

        put(&mut obs, layout::PAYLOAD_ERROR.start, &(target - payload_pos));
        put(&mut obs, layout::PAYLOAD_LINVEL.start, &payload.linvel);
        write_agent(&mut obs, layout::AGENT1, agent1, &payload_pos)?;
        write_agent(&mut obs, layout::AGENT2, agent2, &payload_pos)?;
        obs[layout::PREV_ACTION].copy_from_slice(&prev_action.0);

        if self.check_finite {
            ensure_finite("observation", &obs)?;
        }
        Ok(Observation(obs))
    }
}

fn write_agent(
    obs: &mut [f64; OBS_DIM],
    start: usize,
    agent: &BodyState,
    payload_pos: &Vec3,
) -> Result<(), EnvError> {
    let rotation = flatten_row_major(&rotation_matrix(&agent.pose.orientation)?);

    put(obs, start + layout::REL_POSITION.start, &(agent.position() - payload_pos));
    obs[start + layout::ROTATION.start..start + layout::ROTATION.end].copy_from_slice(&rotation);
    put(obs, start + layout::LINVEL.start, &agent.linvel);
    put(obs, start + layout::ANGVEL.start, &agent.angvel);
    put(obs, start + layout::LINACC.start, &agent.linacc);
    put(obs, start + layout::ANGACC.start, &agent.angacc);
    Ok(())
}

fn put(obs: &mut [f64; OBS_DIM], at: usize, v: &Vec3) {
    obs[at..at + 3].copy_from_slice(v.as_slice());
}

const _: () = assert!(layout::PREV_ACTION.end == OBS_DIM);
const _: () = assert!(layout::PREV_ACTION.start + ACTION_DIM == OBS_DIM);
const _: () = assert!(layout::AGENT2 + layout::AGENT_BLOCK == layout::PREV_ACTION.start);
