//! Scene description: the bodies, actuators and cables of a simulation.
//!
//! A scene is plain data (serde, TOML-loadable). [`crate::RapierEngine`]
//! turns it into a template world once; names are resolved against it a
//! single time when the environment is constructed.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::PhysicsError;

/// Rotors per quadrotor body.
pub const ROTORS_PER_QUAD: usize = 4;

/// Shape and actuation of a body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BodyKind {
    /// Passive sphere.
    Payload {
        /// Sphere radius in meters.
        radius: f64,
    },
    /// Box-shaped airframe with four rotors in X configuration.
    Quadrotor {
        /// Half extents of the collision box in meters.
        half_extents: [f64; 3],
        /// Distance from the center of mass to each rotor in meters.
        arm_length: f64,
        /// Reaction yaw torque per newton of rotor thrust.
        yaw_torque_coeff: f64,
    },
}

/// A free body in the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyDescription {
    /// Unique body name.
    pub name: String,
    /// Mass in kilograms.
    pub mass: f64,
    /// Nominal position in meters.
    pub position: [f64; 3],
    /// Nominal orientation as `[w, x, y, z]`.
    #[serde(default = "identity_wxyz")]
    pub orientation: [f64; 4],
    /// Shape and actuation.
    #[serde(flatten)]
    pub kind: BodyKind,
}

/// A cable limiting the distance between anchor points on two bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CableDescription {
    /// First body name.
    pub from: String,
    /// Second body name.
    pub to: String,
    /// Maximum anchor separation in meters.
    pub length: f64,
    /// Anchor in the first body's frame.
    #[serde(default)]
    pub from_anchor: [f64; 3],
    /// Anchor in the second body's frame.
    #[serde(default)]
    pub to_anchor: [f64; 3],
}

/// Complete scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDescription {
    /// Gravity vector in m/s².
    #[serde(default = "default_gravity")]
    pub gravity: [f64; 3],
    /// Whether a ground plane at `z = 0` is present.
    #[serde(default = "default_true")]
    pub ground: bool,
    /// Free bodies, in generalized-coordinate order.
    pub bodies: Vec<BodyDescription>,
    /// Cables between bodies.
    #[serde(default)]
    pub cables: Vec<CableDescription>,
}

fn identity_wxyz() -> [f64; 4] {
    [1.0, 0.0, 0.0, 0.0]
}

fn default_gravity() -> [f64; 3] {
    [0.0, 0.0, -9.81]
}

fn default_true() -> bool {
    true
}

impl SceneDescription {
    /// Two crazyflie-sized quadrotors (`q0_cf2`, `q1_cf2`) carrying a small
    /// ball `payload` on cables.
    pub fn two_quad_payload() -> Self {
        let quad = |name: &str, x: f64| BodyDescription {
            name: name.to_string(),
            mass: 0.034,
            position: [x, 0.0, 0.87],
            orientation: identity_wxyz(),
            kind: BodyKind::Quadrotor {
                half_extents: [0.046, 0.046, 0.015],
                arm_length: 0.046,
                yaw_torque_coeff: 0.006,
            },
        };
        let cable = |from: &str| CableDescription {
            from: from.to_string(),
            to: "payload".to_string(),
            length: 0.3,
            from_anchor: [0.0, 0.0, -0.015],
            to_anchor: [0.0, 0.0, 0.0],
        };

        Self {
            gravity: default_gravity(),
            ground: true,
            bodies: vec![
                BodyDescription {
                    name: "payload".to_string(),
                    mass: 0.01,
                    position: [0.0, 0.0, 0.6],
                    orientation: identity_wxyz(),
                    kind: BodyKind::Payload { radius: 0.01 },
                },
                quad("q0_cf2", -0.12),
                quad("q1_cf2", 0.12),
            ],
            cables: vec![cable("q0_cf2"), cable("q1_cf2")],
        }
    }

    /// Parse and validate a TOML scene description.
    pub fn from_toml_str(s: &str) -> Result<Self, PhysicsError> {
        let scene: Self = toml::from_str(s)?;
        scene.validate()?;
        Ok(scene)
    }

    /// Check names, masses, shapes and cable endpoints.
    pub fn validate(&self) -> Result<(), PhysicsError> {
        if self.bodies.is_empty() {
            return Err(PhysicsError::InvalidScene("scene has no bodies".to_string()));
        }

        let mut seen = HashSet::new();
        for body in &self.bodies {
            if !seen.insert(body.name.as_str()) {
                return Err(PhysicsError::DuplicateBody(body.name.clone()));
            }
            if !(body.mass.is_finite() && body.mass > 0.0) {
                return Err(PhysicsError::InvalidScene(format!(
                    "body {} has non-positive mass {}",
                    body.name, body.mass
                )));
            }
            if body.orientation.iter().all(|c| *c == 0.0) {
                return Err(PhysicsError::InvalidScene(format!(
                    "body {} has a zero orientation quaternion",
                    body.name
                )));
            }
            let positive = match &body.kind {
                BodyKind::Payload { radius } => *radius > 0.0,
                BodyKind::Quadrotor {
                    half_extents,
                    arm_length,
                    ..
                } => half_extents.iter().all(|h| *h > 0.0) && *arm_length > 0.0,
            };
            if !positive {
                return Err(PhysicsError::InvalidScene(format!(
                    "body {} has a non-positive dimension",
                    body.name
                )));
            }
        }

        for cable in &self.cables {
            self.index_of(&cable.from)?;
            self.index_of(&cable.to)?;
            if !(cable.length > 0.0) {
                return Err(PhysicsError::InvalidScene(format!(
                    "cable {} -> {} has non-positive length",
                    cable.from, cable.to
                )));
            }
        }

        Ok(())
    }

    /// Index of a named body in scene order.
    pub fn index_of(&self, name: &str) -> Result<usize, PhysicsError> {
        self.bodies
            .iter()
            .position(|b| b.name == name)
            .ok_or_else(|| PhysicsError::MissingBody(name.to_string()))
    }

    /// Number of actuators (four per quadrotor, in body order).
    pub fn num_actuators(&self) -> usize {
        self.bodies
            .iter()
            .filter(|b| matches!(b.kind, BodyKind::Quadrotor { .. }))
            .count()
            * ROTORS_PER_QUAD
    }

    /// Nominal generalized positions `[x, y, z, qw, qx, qy, qz]` per body.
    pub fn nominal_qpos(&self) -> Vec<f64> {
        self.bodies
            .iter()
            .flat_map(|b| b.position.into_iter().chain(b.orientation))
            .collect()
    }
}

impl Default for SceneDescription {
    fn default() -> Self {
        Self::two_quad_payload()
    }
}
