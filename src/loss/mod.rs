//! Supervised losses for the auxiliary depth heads.

pub mod functions;

pub use functions::{BinnedCrossEntropy, Loss, MeanSquaredError};
