//! Error types for physics simulation.

use thiserror::Error;

/// Errors that can occur while building or stepping a simulation.
#[derive(Error, Debug)]
pub enum PhysicsError {
    /// Named body is not part of the scene.
    #[error("Body not found in scene: {0}")]
    MissingBody(String),

    /// Two bodies share a name.
    #[error("Duplicate body name in scene: {0}")]
    DuplicateBody(String),

    /// Body identifier does not belong to this scene.
    #[error("Body id {0} is out of range")]
    UnknownBody(usize),

    /// Scene description is inconsistent.
    #[error("Invalid scene: {0}")]
    InvalidScene(String),

    /// Scene description could not be parsed.
    #[error("Failed to parse scene description: {0}")]
    Parse(#[from] toml::de::Error),

    /// Generalized coordinate vector has the wrong length.
    #[error("Expected {expected} {what} values, got {got}")]
    StateDimension {
        /// Which vector was malformed (`qpos`, `qvel`).
        what: &'static str,
        /// Required length.
        expected: usize,
        /// Provided length.
        got: usize,
    },

    /// Generalized coordinates describe an impossible state.
    #[error("Invalid state for body {body}: {reason}")]
    InvalidState {
        /// Body name.
        body: String,
        /// What was wrong.
        reason: String,
    },

    /// Actuator command has the wrong length.
    #[error("Expected {expected} actuator commands, got {got}")]
    ActuatorDimension {
        /// Number of actuators in the scene.
        expected: usize,
        /// Provided length.
        got: usize,
    },

    /// Timing parameters cannot produce a positive timestep.
    #[error("Invalid step timing: {0}")]
    InvalidTiming(String),
}
