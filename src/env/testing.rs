//! Deterministic stand-in environments for tests, benchmarks and smoke runs.

use std::collections::HashMap;

use ndarray::{Array1, Array3};

use super::{Environment, Observation, ObservationSpec, Transition};
use crate::error::{A3cError, Result};

/// Pays a constant reward every step and terminates after a fixed number of steps.
///
/// Frames and depth histograms vary with the step index and the seed so the network sees
/// changing inputs, but two environments with the same seed produce identical episodes.
#[derive(Debug, Clone)]
pub struct ConstantRewardEnv {
    spec: ObservationSpec,
    reward: f32,
    episode_length: usize,
    steps: usize,
    seed: u64,
}

impl ConstantRewardEnv {
    pub fn new(spec: ObservationSpec, reward: f32, episode_length: usize) -> Self {
        ConstantRewardEnv {
            spec,
            reward,
            episode_length: episode_length.max(1),
            steps: 0,
            seed: 0,
        }
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    fn observe(&self, last_reward: f32, last_action: Option<usize>) -> Observation {
        let phase = self.steps as u64 + self.seed;
        let frame = Array3::from_shape_fn(self.spec.frame_shape(), |(c, y, x)| {
            ((phase as usize + c + y * 3 + x) % 11) as f32 / 10.0
        });

        let bins = self.spec.depth_bins;
        let mut depth = Array1::zeros(self.spec.depth_size());
        for cell in 0..self.spec.depth_cells {
            depth[cell * bins + (cell + phase as usize) % bins] = 1.0;
        }

        let velocity = Array1::from_shape_fn(self.spec.velocity_size, |i| {
            ((phase as usize + i) % 5) as f32 * 0.1
        });

        Observation {
            frame,
            depth,
            last_reward,
            last_action,
            velocity,
        }
    }
}

impl Environment for ConstantRewardEnv {
    fn observation_spec(&self) -> ObservationSpec {
        self.spec
    }

    fn reset(&mut self) -> Result<Observation> {
        self.steps = 0;
        Ok(self.observe(0.0, None))
    }

    fn step(&mut self, action: usize) -> Result<Transition> {
        if action >= self.spec.num_actions {
            return Err(A3cError::environment(format!(
                "action {} out of range for {} actions",
                action, self.spec.num_actions
            )));
        }
        self.steps += 1;
        let done = self.steps >= self.episode_length;
        let observation = if done {
            // Terminal steps carry no simulator state
            let mut terminal = Observation::zeros(&self.spec);
            terminal.last_reward = self.reward;
            terminal.last_action = Some(action);
            terminal
        } else {
            self.observe(self.reward, Some(action))
        };

        let mut info = HashMap::new();
        info.insert("episode_step".to_string(), self.steps as f64);
        Ok(Transition {
            observation,
            reward: self.reward,
            done,
            info,
        })
    }

    fn seed(&mut self, seed: u64) {
        self.seed = seed;
    }
}

/// Wraps a [`ConstantRewardEnv`] and fails every step after a fixed number of successful ones.
#[derive(Debug, Clone)]
pub struct FailingEnv {
    inner: ConstantRewardEnv,
    fail_after: usize,
    total_steps: usize,
}

impl FailingEnv {
    pub fn new(spec: ObservationSpec, fail_after: usize) -> Self {
        FailingEnv {
            inner: ConstantRewardEnv::new(spec, 0.0, usize::MAX),
            fail_after,
            total_steps: 0,
        }
    }
}

impl Environment for FailingEnv {
    fn observation_spec(&self) -> ObservationSpec {
        self.inner.observation_spec()
    }

    fn reset(&mut self) -> Result<Observation> {
        self.inner.reset()
    }

    fn step(&mut self, action: usize) -> Result<Transition> {
        if self.total_steps >= self.fail_after {
            return Err(A3cError::environment("simulator connection lost"));
        }
        self.total_steps += 1;
        self.inner.step(action)
    }

    fn seed(&mut self, seed: u64) {
        self.inner.seed(seed);
    }
}
