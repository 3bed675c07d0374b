//! Policy actions and their conversion to rotor thrust.

use serde::{Deserialize, Serialize};

use crate::error::EnvError;

/// Number of action components (four rotors on each of two vehicles).
pub const ACTION_DIM: usize = 8;

/// Raw policy output, nominally in `[-1, 1]` per component.
///
/// Values outside the nominal range are accepted as-is; clamping is the
/// caller's responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Action(pub [f64; ACTION_DIM]);

impl Action {
    /// All-zero action (half thrust on every rotor once scaled).
    pub fn zeros() -> Self {
        Self([0.0; ACTION_DIM])
    }

    /// Action from a slice of exactly [`ACTION_DIM`] values.
    pub fn from_slice(values: &[f64]) -> Result<Self, EnvError> {
        let arr: [f64; ACTION_DIM] = values.try_into().map_err(|_| EnvError::ActionDimension {
            expected: ACTION_DIM,
            got: values.len(),
        })?;
        Ok(Self(arr))
    }

    /// Components as a slice.
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

impl Default for Action {
    fn default() -> Self {
        Self::zeros()
    }
}

/// Physical rotor thrust in newtons, one per actuator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThrustCommand(pub [f64; ACTION_DIM]);

impl ThrustCommand {
    /// Components as a slice.
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// Maps actions in `[-1, 1]` to thrust in `[0, max_thrust]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionScaler {
    max_thrust: f64,
}

impl ActionScaler {
    /// Scaler saturating at `max_thrust`.
    pub fn new(max_thrust: f64) -> Self {
        Self { max_thrust }
    }

    /// Thrust produced by a fully saturated action.
    pub fn max_thrust(&self) -> f64 {
        self.max_thrust
    }

    /// `0.5 * (action + 1) * max_thrust`, elementwise.
    pub fn scale(&self, action: &Action) -> ThrustCommand {
        ThrustCommand(action.0.map(|a| 0.5 * (a + 1.0) * self.max_thrust))
    }
}
