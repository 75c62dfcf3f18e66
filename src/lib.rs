//! # a3c_nav - Asynchronous Recurrent Actor-Critic for Visual Navigation
//!
//! An A3C agent that learns to navigate a first-person 3D environment from raw frames,
//! a coarse depth histogram, the last reward and action, and its own velocity.
//!
//! ## Key Features
//!
//! - **Recurrent policy**: convolutional encoder, a fast local LSTM and a slow context LSTM
//! - **Auxiliary depth prediction** from the embedding and from the context state
//! - **Value memory** (experimental): per-episode recall and propagation of value estimates
//! - **Hogwild training**: worker threads update one shared parameter vector through a shared
//!   optimizer, lock-free or behind a coarse lock
//! - **Analytic gradients**: every layer has a hand-written backward pass; the recurrent core
//!   is trained with backpropagation through time
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use a3c_nav::algorithms::{EnvRole, Trainer};
//! use a3c_nav::config::A3cConfig;
//! use a3c_nav::env::testing::ConstantRewardEnv;
//! use a3c_nav::telemetry::LogTelemetry;
//!
//! let mut config = A3cConfig::default();
//! config.max_rollouts = Some(100);
//! config.max_eval_episodes = Some(3);
//!
//! let trainer = Trainer::new(config, Arc::new(LogTelemetry)).unwrap();
//! let session = trainer
//!     .launch(|_role: EnvRole, config: &A3cConfig| Ok(ConstantRewardEnv::new(config.observation, 1.0, 50)));
//! for outcome in session.join() {
//!     println!("{}: {:?}", outcome.name, outcome.result);
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`activations`] - SELU, sigmoid and tanh with derivatives
//! - [`algorithms`] - Workers, evaluator and the thread launcher
//! - [`config`] - Run configuration
//! - [`env`] - Environment trait, observation layout and preprocessing
//! - [`error`] - Error types and result handling
//! - [`layers`] - Linear, convolution and LSTM layers
//! - [`loss`] - Auxiliary depth losses
//! - [`metrics`] - Episode statistics
//! - [`model`] - The actor-critic network and its recurrent state
//! - [`optimizer`] - Shared optimizers and gradient clipping
//! - [`shared`] - Shared parameter store and global step counter
//! - [`telemetry`] - Scalar metric sinks

pub use ndarray;

#[macro_use]
pub mod macros;

pub mod activations;
pub mod algorithms;
pub mod config;
pub mod env;
pub mod error;
pub mod layers;
pub mod loss;
pub mod metrics;
pub mod model;
pub mod optimizer;
pub mod shared;
pub mod telemetry;

pub use error::{A3cError, Result};

#[cfg(test)]
mod tests;
