use ndarray::Array1;

use crate::config::{A3cConfig, DepthLossKind};
use crate::error::{A3cError, Result};
use crate::loss::{BinnedCrossEntropy, Loss, MeanSquaredError};
use crate::model::{Categorical, StepGradient, StepOutput};

/// n-step returns and generalized advantage estimates of one rollout
#[derive(Debug, Clone, PartialEq)]
pub struct Advantages {
    pub returns: Vec<f32>,
    pub advantages: Vec<f32>,
}

/// Discounted returns `R_i = r_i + γ R_{i+1}` and GAE `A_i = δ_i + γτ A_{i+1}`.
///
/// `values` holds one estimate per reward followed by the bootstrap value.
pub fn compute_advantages(rewards: &[f32], values: &[f32], gamma: f32, tau: f32) -> Result<Advantages> {
    let n = rewards.len();
    if values.len() != n + 1 {
        return Err(A3cError::dimension_mismatch(
            format!("{} values (rewards plus bootstrap)", n + 1),
            format!("{} values", values.len()),
        ));
    }

    let mut returns = vec![0.0; n];
    let mut advantages = vec![0.0; n];
    let mut running_return = values[n];
    let mut running_gae = 0.0;
    for i in (0..n).rev() {
        running_return = rewards[i] + gamma * running_return;
        returns[i] = running_return;

        let delta = rewards[i] + gamma * values[i + 1] - values[i];
        running_gae = delta + gamma * tau * running_gae;
        advantages[i] = running_gae;
    }
    Ok(Advantages { returns, advantages })
}

/// One recorded environment step
#[derive(Debug, Clone)]
pub struct RolloutStep {
    pub action: usize,
    pub reward: f32,
    pub output: StepOutput,
    pub policy: Categorical,
    /// Depth histogram of the observation the network was fed
    pub depth_target: Array1<f32>,
}

impl RolloutStep {
    pub fn log_prob(&self) -> f32 {
        self.policy.log_prob(self.action)
    }

    pub fn entropy(&self) -> f32 {
        self.policy.entropy()
    }
}

/// Loss weights and return parameters taken from the run configuration
#[derive(Debug, Clone, Copy)]
pub struct LossCoefficients {
    pub gamma: f32,
    pub tau: f32,
    pub entropy_coef: f32,
    pub value_loss_coef: f32,
    pub depth_loss_coef: f32,
}

impl From<&A3cConfig> for LossCoefficients {
    fn from(config: &A3cConfig) -> Self {
        LossCoefficients {
            gamma: config.gamma,
            tau: config.tau,
            entropy_coef: config.entropy_coef,
            value_loss_coef: config.value_loss_coef,
            depth_loss_coef: config.depth_loss_coef,
        }
    }
}

/// The loss terms of one rollout, each summed over its steps
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LossBreakdown {
    pub policy: f32,
    pub value: f32,
    pub entropy: f32,
    pub depth: f32,
    pub total: f32,
}

impl LossBreakdown {
    pub fn is_finite(&self) -> bool {
        self.policy.is_finite() && self.value.is_finite() && self.depth.is_finite() && self.total.is_finite()
    }
}

/// Build the supervised loss used by the depth heads.
pub fn depth_loss(kind: DepthLossKind, bins: usize) -> Box<dyn Loss> {
    match kind {
        DepthLossKind::CrossEntropy => Box::new(BinnedCrossEntropy::new(bins)),
        DepthLossKind::MeanSquaredError => Box::new(MeanSquaredError),
    }
}

/// Loss of a finished rollout and its gradient with respect to every step's outputs.
///
/// `Σ_i [ -log π(a_i)·A_i - β·H_i + c_v·½(R_i - V_i)² + c_d·(depth losses) ]`, with the
/// advantages and returns treated as constants.
pub fn rollout_gradients(
    steps: &[RolloutStep],
    bootstrap: f32,
    coefficients: &LossCoefficients,
    depth_loss: &dyn Loss,
) -> Result<(Vec<StepGradient>, LossBreakdown)> {
    let rewards: Vec<f32> = steps.iter().map(|s| s.reward).collect();
    let mut values: Vec<f32> = steps.iter().map(|s| s.output.value).collect();
    values.push(bootstrap);
    let Advantages { returns, advantages } =
        compute_advantages(&rewards, &values, coefficients.gamma, coefficients.tau)?;

    let mut breakdown = LossBreakdown::default();
    let mut gradients = Vec::with_capacity(steps.len());
    for (i, step) in steps.iter().enumerate() {
        let error = returns[i] - step.output.value;
        breakdown.policy -= step.log_prob() * advantages[i];
        breakdown.value += 0.5 * error * error;
        breakdown.entropy += step.entropy();

        let mut depth_from_embedding = Array1::zeros(step.output.depth_from_embedding.len());
        let mut depth_from_context = Array1::zeros(step.output.depth_from_context.len());
        if coefficients.depth_loss_coef > 0.0 {
            let target = step.depth_target.view();
            breakdown.depth += depth_loss.compute(step.output.depth_from_embedding.view(), target)?
                + depth_loss.compute(step.output.depth_from_context.view(), target)?;
            depth_from_embedding = depth_loss.gradient(step.output.depth_from_embedding.view(), target)?
                * coefficients.depth_loss_coef;
            depth_from_context = depth_loss.gradient(step.output.depth_from_context.view(), target)?
                * coefficients.depth_loss_coef;
        }

        gradients.push(StepGradient {
            value: -coefficients.value_loss_coef * error,
            logits: step.policy.policy_gradient(step.action, advantages[i], coefficients.entropy_coef),
            depth_from_embedding,
            depth_from_context,
        });
    }

    breakdown.total = breakdown.policy - coefficients.entropy_coef * breakdown.entropy
        + coefficients.value_loss_coef * breakdown.value
        + coefficients.depth_loss_coef * breakdown.depth;
    Ok((gradients, breakdown))
}
