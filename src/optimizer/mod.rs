//! Optimizers whose state lives in shared memory next to the parameters they update.
//!
//! Every worker applies its gradient through the same optimizer instance. Moment estimates
//! are [`AtomicBuffer`]s, so concurrent updates race the same way the parameters do.

pub mod gradient_clipper;

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{A3cError, Result};
use crate::shared::AtomicBuffer;

pub use gradient_clipper::GradientClipper;

pub trait Optimizer: Send + Sync {
    /// Apply one update of `gradients` onto `params` (same length, same layout).
    fn step(&self, params: &AtomicBuffer, gradients: &[f32], learning_rate: f32);
}

pub enum OptimizerWrapper {
    SGD(SGD),
    Adam(Adam),
    RMSProp(RMSProp),
}

impl Optimizer for OptimizerWrapper {
    fn step(&self, params: &AtomicBuffer, gradients: &[f32], learning_rate: f32) {
        match self {
            OptimizerWrapper::SGD(optimizer) => optimizer.step(params, gradients, learning_rate),
            OptimizerWrapper::Adam(optimizer) => optimizer.step(params, gradients, learning_rate),
            OptimizerWrapper::RMSProp(optimizer) => optimizer.step(params, gradients, learning_rate),
        }
    }
}

/// Serializable optimizer choice, built into an [`OptimizerWrapper`] once the parameter count
/// is known.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptimizerConfig {
    Sgd,
    Adam { beta1: f32, beta2: f32, epsilon: f32 },
    RmsProp { alpha: f32, epsilon: f32 },
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig::Adam {
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }
}

impl OptimizerConfig {
    pub fn validate(&self) -> Result<()> {
        let in_unit = |name: &str, v: f32| {
            if (0.0..1.0).contains(&v) {
                Ok(())
            } else {
                Err(A3cError::invalid_parameter(name, format!("must be in [0, 1), got {}", v)))
            }
        };
        match *self {
            OptimizerConfig::Sgd => Ok(()),
            OptimizerConfig::Adam { beta1, beta2, epsilon } => {
                in_unit("beta1", beta1)?;
                in_unit("beta2", beta2)?;
                positive("epsilon", epsilon)
            }
            OptimizerConfig::RmsProp { alpha, epsilon } => {
                in_unit("alpha", alpha)?;
                positive("epsilon", epsilon)
            }
        }
    }

    pub fn build(&self, num_parameters: usize) -> OptimizerWrapper {
        match *self {
            OptimizerConfig::Sgd => OptimizerWrapper::SGD(SGD::new()),
            OptimizerConfig::Adam { beta1, beta2, epsilon } => {
                OptimizerWrapper::Adam(Adam::new(num_parameters, beta1, beta2, epsilon))
            }
            OptimizerConfig::RmsProp { alpha, epsilon } => {
                OptimizerWrapper::RMSProp(RMSProp::new(num_parameters, alpha, epsilon))
            }
        }
    }
}

fn positive(name: &str, value: f32) -> Result<()> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(A3cError::invalid_parameter(name, format!("must be positive, got {}", value)))
    }
}

#[derive(Debug, Clone, Default)]
pub struct SGD;

impl SGD {
    pub fn new() -> SGD {
        SGD
    }
}

impl Optimizer for SGD {
    fn step(&self, params: &AtomicBuffer, gradients: &[f32], learning_rate: f32) {
        for (i, &g) in gradients.iter().enumerate().take(params.len()) {
            params.store(i, params.load(i) - learning_rate * g);
        }
    }
}

/// Adam with shared first and second moments and a shared step count.
#[derive(Debug)]
pub struct Adam {
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    m: AtomicBuffer,
    v: AtomicBuffer,
    t: AtomicU64,
}

impl Adam {
    pub fn new(num_parameters: usize, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Adam {
            beta1,
            beta2,
            epsilon,
            m: AtomicBuffer::zeros(num_parameters),
            v: AtomicBuffer::zeros(num_parameters),
            t: AtomicU64::new(0),
        }
    }

    pub fn default(num_parameters: usize) -> Self {
        Self::new(num_parameters, 0.9, 0.999, 1e-8)
    }

    /// Number of updates applied so far
    pub fn steps(&self) -> u64 {
        self.t.load(Ordering::Relaxed)
    }
}

impl Optimizer for Adam {
    fn step(&self, params: &AtomicBuffer, gradients: &[f32], learning_rate: f32) {
        let t = self.t.fetch_add(1, Ordering::Relaxed) + 1;
        let bias_correction1 = 1.0 - self.beta1.powi(t.min(i32::MAX as u64) as i32);
        let bias_correction2 = 1.0 - self.beta2.powi(t.min(i32::MAX as u64) as i32);

        for (i, &g) in gradients.iter().enumerate().take(params.len()) {
            let m = self.beta1 * self.m.load(i) + (1.0 - self.beta1) * g;
            let v = self.beta2 * self.v.load(i) + (1.0 - self.beta2) * g * g;
            self.m.store(i, m);
            self.v.store(i, v);

            let m_hat = m / bias_correction1;
            let v_hat = v / bias_correction2;
            params.store(i, params.load(i) - learning_rate * m_hat / (v_hat.sqrt() + self.epsilon));
        }
    }
}

/// RMSProp with a shared running average of squared gradients
#[derive(Debug)]
pub struct RMSProp {
    pub alpha: f32,
    pub epsilon: f32,
    square_avg: AtomicBuffer,
}

impl RMSProp {
    pub fn new(num_parameters: usize, alpha: f32, epsilon: f32) -> Self {
        RMSProp {
            alpha,
            epsilon,
            square_avg: AtomicBuffer::zeros(num_parameters),
        }
    }
}

impl Optimizer for RMSProp {
    fn step(&self, params: &AtomicBuffer, gradients: &[f32], learning_rate: f32) {
        for (i, &g) in gradients.iter().enumerate().take(params.len()) {
            let avg = self.alpha * self.square_avg.load(i) + (1.0 - self.alpha) * g * g;
            self.square_avg.store(i, avg);
            params.store(i, params.load(i) - learning_rate * g / (avg.sqrt() + self.epsilon));
        }
    }
}
