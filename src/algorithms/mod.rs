//! Training algorithms.

pub mod a3c;

pub use a3c::{EnvRole, Evaluator, Trainer, TrainingSession, Worker};
