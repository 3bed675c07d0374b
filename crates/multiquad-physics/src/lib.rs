#![warn(missing_docs)]

//! Physics backend for the multiquad environment.
//!
//! This crate defines the contract the environment uses to talk to a
//! rigid-body engine ([`PhysicsEngine`], [`SimSnapshot`]) and ships a Rapier3d
//! implementation of it for cable-suspended payload scenes.
//!
//! # Example
//!
//! ```ignore
//! use multiquad_physics::{PhysicsEngine, RapierEngine, SceneDescription, SimSnapshot, StepTiming};
//!
//! let timing = StepTiming::from_policy(250.0, 1)?;
//! let engine = RapierEngine::from_scene(&SceneDescription::two_quad_payload(), timing)?;
//!
//! let payload = engine.resolve("payload")?;
//! let snap = engine.init(&engine.nominal_qpos(), &vec![0.0; engine.nv()])?;
//! let snap = engine.step(&snap, &[0.06; 8])?;
//! println!("{:?}", snap.body_state(payload)?.position());
//! ```

mod engine;
mod error;
mod rotors;
mod scene;
mod world;

pub use engine::{
    BodyId, BodyState, PhysicsEngine, Pose, SimSnapshot, StepTiming, QPOS_PER_BODY, QVEL_PER_BODY,
};
pub use error::PhysicsError;
pub use rotors::{x_layout, Rotor, RotorWrench};
pub use scene::{BodyDescription, BodyKind, CableDescription, SceneDescription, ROTORS_PER_QUAD};
pub use world::{RapierEngine, RapierSnapshot};
