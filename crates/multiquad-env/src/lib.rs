#![warn(missing_docs)]

//! Reinforcement-learning environment for two quadrotors carrying a
//! cable-suspended payload.
//!
//! A policy emits eight normalized rotor commands per control interval. The
//! environment scales them to thrust, advances a [`PhysicsEngine`], and
//! returns a 62-value [`Observation`], a shaped reward and a termination flag.
//!
//! Reset and step are pure: they take a state and return a new one, so many
//! episodes can run side by side on one engine (see [`BatchEnv`]).
//!
//! # Example
//!
//! ```ignore
//! use multiquad_env::{Action, EnvConfig, EnvRegistry, RngKey, DEFAULT_ENV};
//!
//! let env = EnvRegistry::with_defaults().make(DEFAULT_ENV, &EnvConfig::default())?;
//! let mut state = env.reset(&RngKey::new(0))?;
//! while !state.done {
//!     state = env.step(&state, &Action::zeros())?;
//! }
//! println!("episode ended at t = {}", state.time);
//! ```
//!
//! [`PhysicsEngine`]: multiquad_physics::PhysicsEngine

mod action;
mod batch;
mod config;
mod env;
mod error;
mod observation;
mod registry;
mod reward;
mod rng;
mod safety;

#[cfg(test)]
mod testing;

pub use action::{Action, ActionScaler, ThrustCommand, ACTION_DIM};
pub use batch::{write_dones, write_observations, write_rewards, BatchEnv};
pub use config::{BodyNames, EnvConfig, TargetPolicy, DEFAULT_MAX_THRUST};
pub use env::{EpisodePhase, EpisodeState, MultiQuadEnv};
pub use error::EnvError;
pub use observation::{layout, Agent, Observation, ObservationBuilder, OBS_DIM};
pub use registry::{rapier_env, EnvRegistry, DEFAULT_ENV};
pub use reward::{
    RewardBreakdown, RewardInputs, RewardShaper, Termination, COLLISION_DISTANCE,
    COLLISION_PENALTY, OUT_OF_BOUNDS_PENALTY, REWARD_SCALE, SAFE_DISTANCE,
};
pub use rng::RngKey;
pub use safety::{assess, SafetyAssessment, MAX_TILT_DEG, MIN_HEIGHT};

pub use multiquad_physics::{PhysicsEngine, PhysicsError, SimSnapshot};
