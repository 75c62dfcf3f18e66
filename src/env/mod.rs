//! Environment interface consumed by workers and the evaluator.
//!
//! The simulator itself lives outside this crate. Hosts wrap it in an [`Environment`] that
//! produces [`Observation`]s matching its declared [`ObservationSpec`]; the helpers in
//! [`observation`] cover the usual frame and depth preprocessing.

pub mod observation;
pub mod testing;

use std::collections::HashMap;

use crate::error::Result;

pub use observation::{
    encode_depth, frame_from_rgb, Observation, ObservationSpec, DEPTH_BINS, DEPTH_BIN_EDGES,
};

/// Result of a single environment step
#[derive(Debug, Clone)]
pub struct Transition {
    pub observation: Observation,
    pub reward: f32,
    pub done: bool,
    pub info: HashMap<String, f64>,
}

/// A discrete-action episodic environment.
///
/// Implementations are created inside the thread that drives them, so they need not be `Send`.
pub trait Environment {
    /// Layout of every observation this environment returns
    fn observation_spec(&self) -> ObservationSpec;

    /// Start a new episode and return its first observation
    fn reset(&mut self) -> Result<Observation>;

    /// Apply a discrete action
    fn step(&mut self, action: usize) -> Result<Transition>;

    /// Seed the simulator's randomness
    fn seed(&mut self, seed: u64);

    fn num_actions(&self) -> usize {
        self.observation_spec().num_actions
    }
}

impl<E: Environment + ?Sized> Environment for Box<E> {
    fn observation_spec(&self) -> ObservationSpec {
        (**self).observation_spec()
    }

    fn reset(&mut self) -> Result<Observation> {
        (**self).reset()
    }

    fn step(&mut self, action: usize) -> Result<Transition> {
        (**self).step(action)
    }

    fn seed(&mut self, seed: u64) {
        (**self).seed(seed)
    }

    fn num_actions(&self) -> usize {
        (**self).num_actions()
    }
}
