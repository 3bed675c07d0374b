//! Named environment factories.

use std::collections::BTreeMap;

use multiquad_physics::{RapierEngine, SceneDescription, StepTiming};
use tracing::info;

use crate::config::EnvConfig;
use crate::env::MultiQuadEnv;
use crate::error::EnvError;

/// Name the Rapier-backed two-vehicle environment is registered under.
pub const DEFAULT_ENV: &str = "multiquad";

type Factory =
    Box<dyn Fn(&EnvConfig) -> Result<MultiQuadEnv<RapierEngine>, EnvError> + Send + Sync>;

/// Maps environment names to constructors.
#[derive(Default)]
pub struct EnvRegistry {
    factories: BTreeMap<String, Factory>,
}

impl EnvRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding [`DEFAULT_ENV`], built from the default two-vehicle scene.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(DEFAULT_ENV, |config| {
            rapier_env(&SceneDescription::two_quad_payload(), config)
        });
        registry
    }

    /// Register `factory` under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&EnvConfig) -> Result<MultiQuadEnv<RapierEngine>, EnvError> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build the environment registered under `name`.
    pub fn make(&self, name: &str, config: &EnvConfig) -> Result<MultiQuadEnv<RapierEngine>, EnvError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| EnvError::UnknownEnvironment(name.to_string()))?;
        info!(name, policy_freq = config.policy_freq, "creating environment");
        factory(config)
    }
}

/// Build a Rapier-backed environment for `scene`, timed by `config`.
pub fn rapier_env(
    scene: &SceneDescription,
    config: &EnvConfig,
) -> Result<MultiQuadEnv<RapierEngine>, EnvError> {
    config.validate()?;
    let timing = StepTiming::from_policy(config.policy_freq, config.sim_steps_per_action)?;
    let engine = RapierEngine::from_scene(scene, timing)?;
    MultiQuadEnv::new(config.clone(), engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::rng::RngKey;

    #[test]
    fn test_unknown_name() {
        let registry = EnvRegistry::with_defaults();
        assert!(matches!(
            registry.make("hexacopter", &EnvConfig::default()),
            Err(EnvError::UnknownEnvironment(name)) if name == "hexacopter"
        ));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec![DEFAULT_ENV]);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = EnvConfig {
            policy_freq: -1.0,
            ..EnvConfig::default()
        };
        assert!(matches!(
            EnvRegistry::with_defaults().make(DEFAULT_ENV, &config),
            Err(EnvError::Configuration(_))
        ));
    }

    #[test]
    fn test_custom_factory() {
        let mut registry = EnvRegistry::new();
        registry.register("slow", |config| {
            let config = EnvConfig {
                policy_freq: 100.0,
                ..config.clone()
            };
            rapier_env(&SceneDescription::default(), &config)
        });
        let env = registry.make("slow", &EnvConfig::default()).unwrap();
        assert_eq!(env.config().policy_freq, 100.0);
    }

    #[test]
    fn test_rapier_episode_runs() {
        let config = EnvConfig {
            reset_noise_scale: 0.0,
            ..EnvConfig::default()
        };
        let env = EnvRegistry::with_defaults().make(DEFAULT_ENV, &config).unwrap();
        let mut state = env.reset(&RngKey::new(0)).unwrap();
        assert_eq!(state.obs.len(), env.observation_dim());

        // Hover-ish thrust for a handful of control intervals.
        let action = Action([-0.2; 8]);
        for _ in 0..10 {
            state = env.step(&state, &action).unwrap();
            assert!(state.obs.as_slice().iter().all(|v| v.is_finite()));
            assert!(state.reward.is_finite());
            if state.done {
                break;
            }
        }
        assert!(state.time > 0.0);
        assert_eq!(state.last_action.as_slice(), state.obs.prev_action());
    }
}
