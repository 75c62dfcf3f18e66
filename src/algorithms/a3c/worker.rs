use std::sync::Arc;

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::rollout::{depth_loss, rollout_gradients, LossBreakdown, LossCoefficients, RolloutStep};
use crate::config::{A3cConfig, SyncPolicy};
use crate::env::{Environment, Observation};
use crate::error::{A3cError, Result};
use crate::layers::Parameterized;
use crate::loss::Loss;
use crate::metrics::EpisodeTracker;
use crate::model::{ActorCritic, Categorical, RecurrentState};
use crate::optimizer::GradientClipper;
use crate::shared::{GlobalCounter, SharedParameters};
use crate::telemetry::TelemetrySink;

/// What one call to [`Worker::run_rollout`] did
#[derive(Debug, Clone, PartialEq)]
pub struct RolloutReport {
    pub steps: usize,
    pub episode_done: bool,
    pub bootstrap_value: f32,
    pub loss: LossBreakdown,
    /// Gradient norm before clipping
    pub grad_norm: f32,
    /// Shared parameter version after the update, `None` when the update was skipped
    pub version: Option<u64>,
}

/// A training thread's state: private environment, local model copy and rollout context.
pub struct Worker<E: Environment> {
    rank: usize,
    config: A3cConfig,
    coefficients: LossCoefficients,
    env: E,
    model: ActorCritic,
    shared: Arc<SharedParameters>,
    counter: Arc<GlobalCounter>,
    telemetry: Arc<dyn TelemetrySink>,
    rng: StdRng,
    clipper: GradientClipper,
    depth_loss: Box<dyn Loss>,

    state: RecurrentState,
    observation: Observation,
    episode_start: bool,
    tracker: EpisodeTracker,
    rollouts: usize,
}

impl<E: Environment> Worker<E> {
    pub fn new(
        rank: usize,
        config: A3cConfig,
        mut env: E,
        shared: Arc<SharedParameters>,
        counter: Arc<GlobalCounter>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Result<Self> {
        config.validate()?;
        let spec = env.observation_spec();
        if spec != config.observation {
            return Err(A3cError::dimension_mismatch(
                format!("{:?}", config.observation),
                format!("{:?}", spec),
            ));
        }

        let model = ActorCritic::with_shape(config.observation, &config.model)?;
        if model.num_parameters() != shared.len() {
            return Err(A3cError::dimension_mismatch(
                format!("{} shared parameters", model.num_parameters()),
                format!("{} shared parameters", shared.len()),
            ));
        }

        let seed = config.seed.wrapping_add(rank as u64);
        env.seed(seed);
        let observation = env.reset()?;
        let state = model.initial_state();

        Ok(Worker {
            rank,
            coefficients: LossCoefficients::from(&config),
            clipper: GradientClipper::ClipByGlobalNorm { max_norm: config.max_grad_norm },
            depth_loss: depth_loss(config.depth_loss, config.observation.depth_bins),
            config,
            env,
            model,
            shared,
            counter,
            telemetry,
            rng: StdRng::seed_from_u64(seed),
            state,
            observation,
            episode_start: true,
            tracker: EpisodeTracker::new(100),
            rollouts: 0,
        })
    }

    pub fn model(&self) -> &ActorCritic {
        &self.model
    }

    pub fn tracker(&self) -> &EpisodeTracker {
        &self.tracker
    }

    /// Collect up to `num_steps` transitions, compute the rollout gradient and apply it to
    /// the shared parameters.
    pub fn run_rollout(&mut self) -> Result<RolloutReport> {
        if self.episode_start || self.config.sync_policy == SyncPolicy::EveryRollout {
            self.shared.load_into(&mut self.model)?;
        }
        if self.episode_start {
            self.state = self.model.initial_state();
            self.episode_start = false;
        }

        let mut steps = Vec::with_capacity(self.config.num_steps);
        let mut caches = Vec::with_capacity(self.config.num_steps);
        let mut episode_done = false;

        for _ in 0..self.config.num_steps {
            let (output, cache) = self.model.forward(&self.observation, &mut self.state)?;
            let policy = Categorical::from_logits(output.logits.view());
            let action = policy.sample(&mut self.rng);

            let transition = self.env.step(action)?;
            self.tracker.record_step(transition.reward);
            let done = transition.done || self.tracker.current_length() >= self.config.max_episode_length;

            steps.push(RolloutStep {
                action,
                reward: transition.reward,
                output,
                policy,
                depth_target: self.observation.depth.clone(),
            });
            caches.push(cache);

            if done {
                let summary = self.tracker.end_episode();
                info!(
                    "worker {} finished episode: reward {}, length {}",
                    self.rank, summary.reward, summary.length
                );
                self.observation = self.env.reset()?;
                episode_done = true;
                break;
            }
            self.observation = transition.observation;
        }

        let bootstrap_value = if episode_done {
            0.0
        } else {
            self.model.evaluate_value(&self.observation, &self.state)?
        };

        let (step_grads, loss) =
            rollout_gradients(&steps, bootstrap_value, &self.coefficients, self.depth_loss.as_ref())?;

        let mut grad_norm = f32::NAN;
        let mut version = None;
        if loss.is_finite() {
            let mut grads = self.model.zeros_like();
            self.model.backward(&caches, &step_grads, &mut grads)?;
            let mut flat = grads.flatten();
            grad_norm = self.clipper.clip(&mut flat);

            if grad_norm.is_finite() {
                version = Some(self.shared.apply_gradient(&flat, self.config.lr)?);
            } else {
                warn!("worker {} skipped update with non-finite gradient norm", self.rank);
            }
        } else {
            warn!("worker {} skipped update with non-finite loss {:?}", self.rank, loss);
        }

        let total_steps = self.counter.add(steps.len() as u64);
        if version.is_some() {
            self.telemetry.record_scalar("grad_norm", grad_norm as f64, total_steps);
        }
        if episode_done {
            self.episode_start = true;
        }
        self.rollouts += 1;

        debug!(
            "worker {} rollout {}: {} steps, loss {:.4}, grad norm {:.4}",
            self.rank,
            self.rollouts,
            steps.len(),
            loss.total,
            grad_norm
        );

        Ok(RolloutReport {
            steps: steps.len(),
            episode_done,
            bootstrap_value,
            loss,
            grad_norm,
            version,
        })
    }

    /// Run rollouts until the configured budget is spent, or forever without one.
    pub fn run(&mut self) -> Result<usize> {
        while self.config.max_rollouts.map_or(true, |max| self.rollouts < max) {
            self.run_rollout()?;
        }
        Ok(self.rollouts)
    }
}
