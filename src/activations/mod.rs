//! # Activation Functions Module
//!
//! Element-wise nonlinearities used by the encoder and the recurrent cells.
//!
//! - **Linear**: identity, used by every head
//! - **SELU** (scaled exponential linear unit): encoder convolutions and projection
//! - **Sigmoid** / **Tanh**: LSTM gates and cell nonlinearity
//!
//! Derivatives are always taken with respect to the stored pre-activation value, which is
//! what each layer cache keeps for the backward pass.
//!
//! ```rust,no_run
//! use a3c_nav::activations::Activation;
//! use ndarray::array;
//!
//! let mut data = array![1.0, -0.5, 0.0, 2.0];
//! Activation::Selu.apply(&mut data);
//! ```

pub mod functions;

pub use functions::{Activation, SELU_ALPHA, SELU_SCALE};
