//! Episode controller: reset and step around an external physics engine.

use std::collections::BTreeMap;

use multiquad_math::Vec3;
use multiquad_physics::{BodyId, BodyState, PhysicsEngine, SimSnapshot};
use rand::Rng;
use tracing::{debug, trace};

use crate::action::{Action, ActionScaler, ACTION_DIM};
use crate::config::EnvConfig;
use crate::error::EnvError;
use crate::observation::{Observation, ObservationBuilder};
use crate::reward::{RewardBreakdown, RewardInputs, RewardShaper, Termination};
use crate::rng::RngKey;
use crate::safety::assess;

/// Where an episode is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodePhase {
    /// Accepts further steps.
    Running,
    /// A termination condition fired; only `reset` continues.
    Terminated,
}

/// Complete state of one episode.
///
/// States are values: `step` returns a new state and leaves its input
/// untouched.
#[derive(Debug, Clone)]
pub struct EpisodeState<S> {
    /// Engine snapshot.
    pub snapshot: S,
    /// Observation after the last transition.
    pub obs: Observation,
    /// Action recorded in the tail of `obs` (zeros after reset). `step`
    /// carries it into the next observation and the smoothness penalty.
    pub last_action: Action,
    /// Payload target for this episode.
    pub target: Vec3,
    /// Simulated time in seconds.
    pub time: f64,
    /// Reward of the last transition.
    pub reward: f64,
    /// A termination condition holds.
    pub done: bool,
    /// Which termination conditions hold.
    pub termination: Termination,
    /// Reward terms of the last transition.
    pub breakdown: RewardBreakdown,
    /// Scalar diagnostics (`time`, `reward`).
    pub metrics: BTreeMap<&'static str, f64>,
    /// Transitions since reset.
    pub steps: u64,
}

impl<S> EpisodeState<S> {
    /// Lifecycle phase.
    pub fn phase(&self) -> EpisodePhase {
        if self.done {
            EpisodePhase::Terminated
        } else {
            EpisodePhase::Running
        }
    }

    /// Termination flag as `0.0` / `1.0`.
    pub fn done_flag(&self) -> f64 {
        if self.done {
            1.0
        } else {
            0.0
        }
    }
}

fn metrics(time: f64, reward: f64) -> BTreeMap<&'static str, f64> {
    BTreeMap::from([("time", time), ("reward", reward)])
}

/// Two vehicles carrying a cable-suspended payload to a target.
pub struct MultiQuadEnv<E: PhysicsEngine> {
    engine: E,
    config: EnvConfig,
    payload: BodyId,
    agent1: BodyId,
    agent2: BodyId,
    scaler: ActionScaler,
    observer: ObservationBuilder,
    shaper: RewardShaper,
}

impl<E: PhysicsEngine> MultiQuadEnv<E> {
    /// Bind `engine` to an environment configured by `config`.
    ///
    /// Body names are resolved here, once. Unknown names, an actuator count
    /// other than [`ACTION_DIM`], actuators `0..4` not driving `agent1` (or
    /// `4..8` not driving `agent2`), or engine timing that disagrees with the
    /// configured policy frequency are configuration errors.
    pub fn new(config: EnvConfig, engine: E) -> Result<Self, EnvError> {
        config.validate()?;

        let resolve = |name: &str| {
            engine
                .resolve(name)
                .map_err(|e| EnvError::Configuration(e.to_string()))
        };
        let payload = resolve(&config.bodies.payload)?;
        let agent1 = resolve(&config.bodies.agent1)?;
        let agent2 = resolve(&config.bodies.agent2)?;

        if engine.num_actuators() != ACTION_DIM {
            return Err(EnvError::Configuration(format!(
                "engine has {} actuators, environment drives {ACTION_DIM}",
                engine.num_actuators()
            )));
        }
        for actuator in 0..ACTION_DIM {
            let (expected, name) = if actuator < ACTION_DIM / 2 {
                (agent1, &config.bodies.agent1)
            } else {
                (agent2, &config.bodies.agent2)
            };
            if engine.actuated_body(actuator) != Some(expected) {
                return Err(EnvError::Configuration(format!(
                    "actuator {actuator} does not drive body {name}"
                )));
            }
        }

        let timing = engine.timing();
        let expected_dt = config.control_interval() / config.sim_steps_per_action as f64;
        if timing.substeps != config.sim_steps_per_action
            || (timing.dt - expected_dt).abs() > 1e-9 * expected_dt
        {
            return Err(EnvError::Configuration(format!(
                "engine steps {} x {}s per action, configuration asks for {} x {}s",
                timing.substeps, timing.dt, config.sim_steps_per_action, expected_dt
            )));
        }

        Ok(Self {
            scaler: ActionScaler::new(config.max_thrust),
            observer: ObservationBuilder::new(config.check_finite),
            shaper: RewardShaper::new(
                config.max_thrust,
                config.max_episode_time,
                config.check_finite,
            ),
            engine,
            config,
            payload,
            agent1,
            agent2,
        })
    }

    /// Configuration the environment was built with.
    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    /// The physics engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Observation length.
    pub fn observation_dim(&self) -> usize {
        crate::observation::OBS_DIM
    }

    /// Action length.
    pub fn action_dim(&self) -> usize {
        ACTION_DIM
    }

    /// Start a new episode.
    ///
    /// The key is split into independent streams for the target, the initial
    /// positions and the initial velocities. Positions are the engine's
    /// nominal pose plus uniform noise in `[-s, s]`; velocities are uniform in
    /// `[-s, s]`, with `s` the configured reset noise scale.
    pub fn reset(&self, key: &RngKey) -> Result<EpisodeState<E::Snapshot>, EnvError> {
        let [target_key, qpos_key, qvel_key] = key.split_n();
        let s = self.config.reset_noise_scale;

        let mut rng = qpos_key.stream();
        let qpos: Vec<f64> = self
            .engine
            .nominal_qpos()
            .into_iter()
            .map(|q| q + rng.gen_range(-s..=s))
            .collect();
        let mut rng = qvel_key.stream();
        let qvel: Vec<f64> = (0..self.engine.nv())
            .map(|_| rng.gen_range(-s..=s))
            .collect();

        let snapshot = self.engine.init(&qpos, &qvel)?;
        let target = self.config.target.sample(&target_key);
        let last_action = Action::zeros();
        let [payload, agent1, agent2] = self.bodies(&snapshot)?;
        let obs = self
            .observer
            .build(&payload, &agent1, &agent2, &target, &last_action)?;

        debug!(target = ?target, noise = s, "episode reset");

        Ok(EpisodeState {
            snapshot,
            obs,
            last_action,
            target,
            time: 0.0,
            reward: 0.0,
            done: false,
            termination: Termination::default(),
            breakdown: RewardBreakdown::default(),
            metrics: metrics(0.0, 0.0),
            steps: 0,
        })
    }

    /// Apply `action` for one control interval.
    ///
    /// `action` drives the engine and the effort penalties only. The returned
    /// observation's tail, the smoothness penalty and the new state's
    /// `last_action` all take the action recorded in `state`'s tail.
    pub fn step(
        &self,
        state: &EpisodeState<E::Snapshot>,
        action: &Action,
    ) -> Result<EpisodeState<E::Snapshot>, EnvError> {
        if state.done {
            return Err(EnvError::EpisodeTerminated);
        }

        let prev_action = state.last_action;
        let thrust = self.scaler.scale(action);
        let snapshot = self.engine.step(&state.snapshot, thrust.as_slice())?;
        let time = snapshot.time();

        let [payload, agent1, agent2] = self.bodies(&snapshot)?;
        let safety = assess(&payload, &agent1, &agent2)?;
        let obs = self
            .observer
            .build(&payload, &agent1, &agent2, &state.target, &prev_action)?;

        let inputs = RewardInputs {
            obs: &obs,
            time,
            collision: safety.collision,
            out_of_bounds: safety.out_of_bounds,
            applied: &thrust,
            angle_q1: safety.angle_q1,
            angle_q2: safety.angle_q2,
            prev_action: &prev_action,
        };
        let (breakdown, termination) = self.shaper.evaluate(&inputs)?;
        let done = termination.is_terminal();
        let steps = state.steps + 1;

        trace!(steps, time, reward = breakdown.total, "step");
        if done {
            debug!(
                steps,
                time,
                collision = termination.collision,
                out_of_bounds = termination.out_of_bounds,
                timed_out = termination.timed_out,
                "episode terminated"
            );
        }

        Ok(EpisodeState {
            snapshot,
            obs,
            last_action: prev_action,
            target: state.target,
            time,
            reward: breakdown.total,
            done,
            termination,
            breakdown,
            metrics: metrics(time, breakdown.total),
            steps,
        })
    }

    fn bodies(&self, snapshot: &E::Snapshot) -> Result<[BodyState; 3], EnvError> {
        Ok([
            snapshot.body_state(self.payload)?,
            snapshot.body_state(self.agent1)?,
            snapshot.body_state(self.agent2)?,
        ])
    }
}
