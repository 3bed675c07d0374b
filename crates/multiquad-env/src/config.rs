//! Construction-time parameters.

use multiquad_math::Vec3;
use rand_distr::{Distribution, UnitBall};
use serde::{Deserialize, Serialize};

use crate::error::EnvError;
use crate::rng::RngKey;

/// Default maximum thrust per rotor in newtons.
pub const DEFAULT_MAX_THRUST: f64 = 0.11772;

/// How the payload target is chosen at reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetPolicy {
    /// Same target every episode.
    Fixed {
        /// Target position in meters.
        position: [f64; 3],
    },
    /// Uniformly sampled inside a ball on every reset.
    Sphere {
        /// Ball center in meters.
        center: [f64; 3],
        /// Ball radius in meters.
        radius: f64,
    },
}

impl Default for TargetPolicy {
    fn default() -> Self {
        Self::Fixed {
            position: [0.0, 0.0, 1.0],
        }
    }
}

impl TargetPolicy {
    /// Target for an episode started with `key`.
    pub fn sample(&self, key: &RngKey) -> Vec3 {
        match self {
            Self::Fixed { position } => Vec3::from(*position),
            Self::Sphere { center, radius } => {
                let p: [f64; 3] = UnitBall.sample(&mut key.stream());
                Vec3::from(*center) + Vec3::from(p) * *radius
            }
        }
    }
}

/// Names of the bodies the environment reads from the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyNames {
    /// Suspended payload.
    pub payload: String,
    /// First vehicle; must be the body the engine drives with actuators 0..4.
    pub agent1: String,
    /// Second vehicle; must be the body the engine drives with actuators 4..8.
    pub agent2: String,
}

impl Default for BodyNames {
    fn default() -> Self {
        Self {
            payload: "payload".to_string(),
            agent1: "q0_cf2".to_string(),
            agent2: "q1_cf2".to_string(),
        }
    }
}

/// Environment configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// Policy (control) frequency in Hz.
    pub policy_freq: f64,
    /// Physics substeps per control interval.
    pub sim_steps_per_action: u32,
    /// Episodes terminate once simulated time exceeds this many seconds.
    pub max_episode_time: f64,
    /// Half-width of the uniform noise added to the initial state.
    pub reset_noise_scale: f64,
    /// Thrust produced by a fully saturated action.
    pub max_thrust: f64,
    /// Payload target selection.
    pub target: TargetPolicy,
    /// Scene body names.
    pub bodies: BodyNames,
    /// Reject observations and rewards that contain NaN or infinity.
    pub check_finite: bool,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            policy_freq: 250.0,
            sim_steps_per_action: 1,
            max_episode_time: 10.0,
            reset_noise_scale: 0.1,
            max_thrust: DEFAULT_MAX_THRUST,
            target: TargetPolicy::default(),
            bodies: BodyNames::default(),
            check_finite: true,
        }
    }
}

impl EnvConfig {
    /// Parse and validate a TOML configuration. Missing keys take defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, EnvError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every parameter.
    pub fn validate(&self) -> Result<(), EnvError> {
        let positive = |name: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(EnvError::Configuration(format!(
                    "{name} must be positive, got {v}"
                )))
            }
        };

        positive("policy_freq", self.policy_freq)?;
        positive("max_episode_time", self.max_episode_time)?;
        positive("max_thrust", self.max_thrust)?;
        if self.sim_steps_per_action == 0 {
            return Err(EnvError::Configuration(
                "sim_steps_per_action must be at least 1".to_string(),
            ));
        }
        if !(self.reset_noise_scale.is_finite() && self.reset_noise_scale >= 0.0) {
            return Err(EnvError::Configuration(format!(
                "reset_noise_scale must be non-negative, got {}",
                self.reset_noise_scale
            )));
        }
        if let TargetPolicy::Sphere { radius, .. } = self.target {
            if !(radius.is_finite() && radius >= 0.0) {
                return Err(EnvError::Configuration(format!(
                    "target radius must be non-negative, got {radius}"
                )));
            }
        }
        Ok(())
    }

    /// Length of one control interval in seconds.
    pub fn control_interval(&self) -> f64 {
        1.0 / self.policy_freq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EnvConfig::default();
        config.validate().unwrap();
        assert_eq!(config.max_thrust, 0.11772);
        assert_eq!(config.control_interval(), 0.004);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = EnvConfig::from_toml_str(
            r#"
            policy_freq = 100.0
            sim_steps_per_action = 4

            [target]
            kind = "sphere"
            center = [0.0, 0.0, 1.0]
            radius = 0.8
            "#,
        )
        .unwrap();

        assert_eq!(config.policy_freq, 100.0);
        assert_eq!(config.sim_steps_per_action, 4);
        assert_eq!(config.max_episode_time, 10.0);
        assert_eq!(config.bodies.agent2, "q1_cf2");
        assert!(matches!(config.target, TargetPolicy::Sphere { radius, .. } if radius == 0.8));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        for bad in [
            "policy_freq = 0.0",
            "sim_steps_per_action = 0",
            "max_episode_time = -1.0",
            "reset_noise_scale = -0.1",
            "max_thrust = 0.0",
        ] {
            assert!(
                matches!(EnvConfig::from_toml_str(bad), Err(EnvError::Configuration(_))),
                "{bad} should be rejected"
            );
        }
        assert!(matches!(
            EnvConfig::from_toml_str("policy_freq = \"fast\""),
            Err(EnvError::Parse(_))
        ));
    }

    #[test]
    fn test_sphere_targets_stay_inside_ball() {
        let policy = TargetPolicy::Sphere {
            center: [0.0, 0.0, 1.0],
            radius: 0.8,
        };
        for key in RngKey::new(11).split_many(64) {
            let t = policy.sample(&key);
            assert!((t - Vec3::new(0.0, 0.0, 1.0)).norm() <= 0.8);
            assert_eq!(t, policy.sample(&key));
        }
    }

    #[test]
    fn test_fixed_target_ignores_key() {
        let policy = TargetPolicy::default();
        assert_eq!(policy.sample(&RngKey::new(1)), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(policy.sample(&RngKey::new(2)), Vec3::new(0.0, 0.0, 1.0));
    }
}
