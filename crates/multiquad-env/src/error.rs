//! Error types for the environment.

use multiquad_math::MathError;
use multiquad_physics::PhysicsError;
use thiserror::Error;

/// Errors raised while constructing or stepping an environment.
#[derive(Error, Debug)]
pub enum EnvError {
    /// Construction parameters are unusable (bad value, unknown body name,
    /// engine timing mismatch).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Configuration text could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Engine produced a state the environment cannot interpret.
    #[error("Invariant violation: {0}")]
    InvariantViolation(#[from] MathError),

    /// A computed quantity is NaN or infinite.
    #[error("Non-finite value in {what} at index {index}: {value}")]
    NonFinite {
        /// Which quantity (`observation`, `reward`).
        what: &'static str,
        /// Offending component.
        index: usize,
        /// The value itself.
        value: f64,
    },

    /// Action vector has the wrong length.
    #[error("Expected an action of length {expected}, got {got}")]
    ActionDimension {
        /// Required length.
        expected: usize,
        /// Provided length.
        got: usize,
    },

    /// `step` was called on a terminated episode.
    #[error("Episode has terminated; call reset before stepping again")]
    EpisodeTerminated,

    /// Batched call with mismatched input lengths.
    #[error("Batch size mismatch: {states} states, {actions} actions")]
    BatchSize {
        /// Number of states.
        states: usize,
        /// Number of actions.
        actions: usize,
    },

    /// Batched call with a different number of random keys than states.
    #[error("Batch size mismatch: {states} states, {keys} keys")]
    KeyCount {
        /// Number of states.
        states: usize,
        /// Number of keys.
        keys: usize,
    },

    /// Output buffer has the wrong length.
    #[error("Buffer for {what} needs {expected} slots, got {got}")]
    BufferSize {
        /// Which buffer.
        what: &'static str,
        /// Required length.
        expected: usize,
        /// Provided length.
        got: usize,
    },

    /// No factory registered under this name.
    #[error("Unknown environment: {0}")]
    UnknownEnvironment(String),

    /// Physics engine failure.
    #[error("Physics error: {0}")]
    Physics(#[from] PhysicsError),
}

/// Fail with [`EnvError::NonFinite`] on the first NaN or infinity in `values`.
pub(crate) fn ensure_finite(what: &'static str, values: &[f64]) -> Result<(), EnvError> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(EnvError::NonFinite {
            what,
            index,
            value: values[index],
        }),
        None => Ok(()),
    }
}
