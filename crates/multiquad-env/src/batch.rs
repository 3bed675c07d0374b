//! Data-parallel reset and step over many independent episodes.

use multiquad_physics::PhysicsEngine;
use rayon::prelude::*;

use crate::action::Action;
use crate::env::{EpisodeState, MultiQuadEnv};
use crate::error::EnvError;
use crate::observation::OBS_DIM;
use crate::rng::RngKey;

/// Runs one environment over a batch of episode states.
///
/// Episodes share the engine and configuration but nothing else, so each
/// element of a batch is processed independently on the rayon pool.
pub struct BatchEnv<E: PhysicsEngine> {
    env: MultiQuadEnv<E>,
}

impl<E> BatchEnv<E>
where
    E: PhysicsEngine,
{
    /// Wrap a single environment.
    pub fn new(env: MultiQuadEnv<E>) -> Self {
        Self { env }
    }

    /// The wrapped environment.
    pub fn env(&self) -> &MultiQuadEnv<E> {
        &self.env
    }

    /// Reset one episode per key. Fails if any reset fails.
    pub fn reset_all(&self, keys: &[RngKey]) -> Result<Vec<EpisodeState<E::Snapshot>>, EnvError> {
        keys.par_iter().map(|key| self.env.reset(key)).collect()
    }

    /// Step every state with the action at the same index.
    pub fn step_all(
        &self,
        states: &[EpisodeState<E::Snapshot>],
        actions: &[Action],
    ) -> Result<Vec<EpisodeState<E::Snapshot>>, EnvError> {
        if states.len() != actions.len() {
            return Err(EnvError::BatchSize {
                states: states.len(),
                actions: actions.len(),
            });
        }
        states
            .par_iter()
            .zip(actions.par_iter())
            .map(|(state, action)| self.env.step(state, action))
            .collect()
    }

    /// Step running episodes and reset terminated ones with the matching key.
    ///
    /// Terminated states are replaced by a fresh episode instead of being
    /// stepped, so a training loop never sees [`EnvError::EpisodeTerminated`].
    pub fn step_or_reset_all(
        &self,
        states: &[EpisodeState<E::Snapshot>],
        actions: &[Action],
        keys: &[RngKey],
    ) -> Result<Vec<EpisodeState<E::Snapshot>>, EnvError> {
        if states.len() != actions.len() {
            return Err(EnvError::BatchSize {
                states: states.len(),
                actions: actions.len(),
            });
        }
        if states.len() != keys.len() {
            return Err(EnvError::KeyCount {
                states: states.len(),
                keys: keys.len(),
            });
        }
        states
            .par_iter()
            .zip(actions.par_iter())
            .zip(keys.par_iter())
            .map(|((state, action), key)| {
                if state.done {
                    self.env.reset(key)
                } else {
                    self.env.step(state, action)
                }
            })
            .collect()
    }
}

/// Copy observations into a flat `states.len() * OBS_DIM` buffer.
pub fn write_observations<S>(states: &[EpisodeState<S>], out: &mut [f32]) -> Result<(), EnvError>
where
    S: Sync,
{
    check_len("observations", states.len() * OBS_DIM, out.len())?;
    out.par_chunks_mut(OBS_DIM)
        .zip(states.par_iter())
        .for_each(|(row, state)| {
            for (dst, src) in row.iter_mut().zip(state.obs.as_slice()) {
                *dst = *src as f32;
            }
        });
    Ok(())
}

/// Copy rewards into a buffer of length `states.len()`.
pub fn write_rewards<S>(states: &[EpisodeState<S>], out: &mut [f32]) -> Result<(), EnvError> {
    check_len("rewards", states.len(), out.len())?;
    for (dst, state) in out.iter_mut().zip(states) {
        *dst = state.reward as f32;
    }
    Ok(())
}

/// Copy termination flags (`0` / `1`) into a buffer of length `states.len()`.
pub fn write_dones<S>(states: &[EpisodeState<S>], out: &mut [u8]) -> Result<(), EnvError> {
    check_len("dones", states.len(), out.len())?;
    for (dst, state) in out.iter_mut().zip(states) {
        *dst = u8::from(state.done);
    }
    Ok(())
}

fn check_len(what: &'static str, expected: usize, got: usize) -> Result<(), EnvError> {
    if expected == got {
        Ok(())
    } else {
        Err(EnvError::BufferSize {
            what,
            expected,
            got,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvConfig;
    use crate::testing::KinematicEngine;

    fn batch(config: EnvConfig) -> BatchEnv<KinematicEngine> {
        BatchEnv::new(MultiQuadEnv::new(config, KinematicEngine::golden()).unwrap())
    }

    #[test]
    fn test_batch_matches_sequential() {
        let b = batch(EnvConfig::default());
        let keys = RngKey::new(3).split_many(8);
        let states = b.reset_all(&keys).unwrap();
        let actions: Vec<Action> = (0..8).map(|i| Action([i as f64 / 8.0; 8])).collect();
        let next = b.step_all(&states, &actions).unwrap();

        for ((key, action), batched) in keys.iter().zip(&actions).zip(&next) {
            let single = b.env().reset(key).unwrap();
            let single = b.env().step(&single, action).unwrap();
            assert_eq!(single.obs, batched.obs);
            assert_eq!(single.reward, batched.reward);
        }
    }

    #[test]
    fn test_mismatched_batch_is_rejected() {
        let b = batch(EnvConfig::default());
        let states = b.reset_all(&RngKey::new(0).split_many(3)).unwrap();
        let err = b.step_all(&states, &[Action::zeros(); 2]).err().unwrap();
        assert!(matches!(
            err,
            EnvError::BatchSize {
                states: 3,
                actions: 2
            }
        ));

        let keys = RngKey::new(1).split_many(4);
        let err = b
            .step_or_reset_all(&states, &[Action::zeros(); 3], &keys)
            .err()
            .unwrap();
        assert!(matches!(err, EnvError::KeyCount { states: 3, keys: 4 }));
    }

    #[test]
    fn test_terminated_episodes_are_reset() {
        let config = EnvConfig {
            max_episode_time: 0.005,
            reset_noise_scale: 0.0,
            ..EnvConfig::default()
        };
        let b = batch(config);
        let keys = RngKey::new(9).split_many(4);
        let actions = [Action::zeros(); 4];

        let mut states = b.reset_all(&keys).unwrap();
        states = b.step_or_reset_all(&states, &actions, &keys).unwrap();
        assert!(states.iter().all(|s| !s.done && s.steps == 1));
        states = b.step_or_reset_all(&states, &actions, &keys).unwrap();
        assert!(states.iter().all(|s| s.done));
        states = b.step_or_reset_all(&states, &actions, &keys).unwrap();
        assert!(states.iter().all(|s| !s.done && s.steps == 0));
    }

    #[test]
    fn test_write_buffers() {
        let b = batch(EnvConfig::default());
        let states = b.reset_all(&RngKey::new(0).split_many(2)).unwrap();

        let mut obs = vec![0.0f32; 2 * OBS_DIM];
        write_observations(&states, &mut obs).unwrap();
        assert_eq!(obs[OBS_DIM + 3], states[1].obs.as_slice()[3] as f32);

        let mut rewards = [1.0f32; 2];
        write_rewards(&states, &mut rewards).unwrap();
        assert_eq!(rewards, [0.0, 0.0]);

        let mut dones = [7u8; 2];
        write_dones(&states, &mut dones).unwrap();
        assert_eq!(dones, [0, 0]);

        let mut short = vec![0.0f32; OBS_DIM];
        assert!(matches!(
            write_observations(&states, &mut short),
            Err(EnvError::BufferSize {
                what: "observations",
                ..
            })
        ));
    }
}
