//! Asynchronous advantage actor-critic.
//!
//! Workers each own an environment and a local copy of the model. They sync from
//! [`SharedParameters`](crate::shared::SharedParameters), collect a short rollout, backpropagate
//! through time and push the clipped gradient through the shared optimizer. An evaluator thread
//! plays greedy episodes with the latest parameters.

pub mod evaluator;
pub mod rollout;
pub mod trainer;
pub mod worker;

pub use evaluator::{EvaluationReport, Evaluator};
pub use rollout::{
    compute_advantages, rollout_gradients, Advantages, LossBreakdown, LossCoefficients, RolloutStep,
};
pub use trainer::{EnvRole, ThreadOutcome, Trainer, TrainingSession};
pub use worker::{RolloutReport, Worker};
