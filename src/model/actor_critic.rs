use ndarray::Array1;
use rand::Rng;

use super::recurrent::{CoreCache, CoreGradient, CoreInput, RecurrentCore};
use super::encoder::{Encoder, EncoderCache};
use super::heads::{DepthHead, DepthHeadCache};
use super::memory::{EpisodeMemory, MemoryCache, ValueMemory};
use crate::config::ModelConfig;
use crate::env::{Observation, ObservationSpec};
use crate::error::{A3cError, Result};
use crate::layers::{CellState, Initializable, Linear, LinearCache, Parameterized};
use crate::activations::Activation;

/// Recurrent state of one rollout: both LSTM cells and the optional episode memory.
#[derive(Clone, Debug, PartialEq)]
pub struct RecurrentState {
    pub local: CellState,
    pub context: CellState,
    pub memory: Option<EpisodeMemory>,
}

/// Everything the network predicts for one observation
#[derive(Clone, Debug)]
pub struct StepOutput {
    /// Critic estimate used for training; the memory blend when memory is enabled
    pub value: f32,
    /// Critic head output before any memory blending
    pub fresh_value: f32,
    pub logits: Array1<f32>,
    pub depth_from_embedding: Array1<f32>,
    pub depth_from_context: Array1<f32>,
}

#[derive(Clone, Debug)]
pub struct StepCache {
    encoder: EncoderCache,
    core: CoreCache,
    actor: LinearCache,
    critic: LinearCache,
    depth_from_embedding: DepthHeadCache,
    depth_from_context: DepthHeadCache,
    memory: Option<MemoryCache>,
}

/// Loss gradients with respect to one step's outputs
#[derive(Clone, Debug)]
pub struct StepGradient {
    pub value: f32,
    pub logits: Array1<f32>,
    pub depth_from_embedding: Array1<f32>,
    pub depth_from_context: Array1<f32>,
}

/// The full actor-critic network.
///
/// Field order below is the flat parameter order shared with [`SharedParameters`] and
/// snapshots.
///
/// [`SharedParameters`]: crate::shared::SharedParameters
#[derive(Clone, Debug)]
pub struct ActorCritic {
    pub encoder: Encoder,
    pub core: RecurrentCore,
    pub actor: Linear,
    pub critic: Linear,
    pub depth_from_embedding: DepthHead,
    pub depth_from_context: DepthHead,
    pub memory: Option<ValueMemory>,
    spec: ObservationSpec,
}

crate::impl_parameterized!(ActorCritic {
    encoder,
    core,
    actor,
    critic,
    depth_from_embedding,
    depth_from_context,
    memory,
});

impl ActorCritic {
    /// Build a zero-filled network for `spec`; see [`ActorCritic::new`] for an initialized one.
    pub fn with_shape(spec: ObservationSpec, config: &ModelConfig) -> Result<Self> {
        spec.check()?;
        config.validate()?;

        let encoder = Encoder::new(spec.frame_shape(), config.embedding_size)?;
        let core = RecurrentCore::new(
            config.embedding_size,
            config.local_hidden_size,
            config.context_hidden_size,
            spec.velocity_size,
            spec.num_actions,
        );
        let depth_size = spec.depth_size();
        let memory = if config.use_memory {
            Some(ValueMemory::new(
                config.embedding_size,
                config.memory_channels,
                config.memory_kernel_size,
                config.similarity,
            )?)
        } else {
            None
        };

        Ok(ActorCritic {
            encoder,
            core,
            actor: Linear::new(config.context_hidden_size, spec.num_actions, Activation::Linear),
            critic: Linear::new(config.context_hidden_size, 1, Activation::Linear),
            depth_from_embedding: DepthHead::new(config.embedding_size, config.depth_hidden_size, depth_size),
            depth_from_context: DepthHead::new(config.context_hidden_size, config.depth_hidden_size, depth_size),
            memory,
            spec,
        })
    }

    /// Build and initialize a network from a seeded generator.
    pub fn new<R: Rng + ?Sized>(spec: ObservationSpec, config: &ModelConfig, rng: &mut R) -> Result<Self> {
        let mut model = Self::with_shape(spec, config)?;
        model.initialize(rng);
        Ok(model)
    }

    pub fn num_actions(&self) -> usize {
        self.spec.num_actions
    }

    /// A same-shaped network with every parameter zero, used as a gradient accumulator.
    pub fn zeros_like(&self) -> Self {
        let mut zeros = self.clone();
        zeros.fill_zero();
        zeros
    }

    /// Zero state for the start of an episode
    pub fn initial_state(&self) -> RecurrentState {
        RecurrentState {
            local: self.core.local.initial_state(),
            context: self.core.context.initial_state(),
            memory: self.memory.as_ref().map(|_| EpisodeMemory::new()),
        }
    }

    /// Run one step, advancing `state` in place.
    pub fn forward(&self, observation: &Observation, state: &mut RecurrentState) -> Result<(StepOutput, StepCache)> {
        self.spec.validate(observation)?;

        let (embedding, encoder_cache) = self.encoder.forward(observation.frame.view())?;
        let action_one_hot = observation.action_one_hot(self.spec.num_actions);
        let input = CoreInput {
            embedding: embedding.view(),
            last_reward: observation.last_reward,
            velocity: observation.velocity.view(),
            action_one_hot: action_one_hot.view(),
        };
        let (local, context, core_cache) = self.core.forward(&input, &state.local, &state.context)?;
        let hidden = context.hidden.view();

        let (logits, actor_cache) = self.actor.forward(hidden);
        let (critic_out, critic_cache) = self.critic.forward(hidden);
        let fresh_value = critic_out[0];
        let (depth_from_embedding, depth_e_cache) = self.depth_from_embedding.forward(embedding.view());
        let (depth_from_context, depth_c_cache) = self.depth_from_context.forward(hidden);

        let (value, memory_cache) = match &self.memory {
            Some(memory) => {
                let episode = state.memory.get_or_insert_with(EpisodeMemory::new);
                let (value, cache) = memory.forward(episode, embedding.view(), observation.last_reward, fresh_value)?;
                (value, Some(cache))
            }
            None => (fresh_value, None),
        };

        state.local = local;
        state.context = context;

        let output = StepOutput {
            value,
            fresh_value,
            logits,
            depth_from_embedding,
            depth_from_context,
        };
        let cache = StepCache {
            encoder: encoder_cache,
            core: core_cache,
            actor: actor_cache,
            critic: critic_cache,
            depth_from_embedding: depth_e_cache,
            depth_from_context: depth_c_cache,
            memory: memory_cache,
        };
        Ok((output, cache))
    }

    /// Value estimate for `observation` without touching `state`.
    pub fn evaluate_value(&self, observation: &Observation, state: &RecurrentState) -> Result<f32> {
        let mut scratch = state.clone();
        let (output, _) = self.forward(observation, &mut scratch)?;
        Ok(output.value)
    }

    /// Backpropagation through time over one rollout.
    ///
    /// `caches[t]` and `step_grads[t]` belong to step `t`. The state entering the rollout is a
    /// constant, so the carried recurrent gradient is dropped once step 0 is processed.
    pub fn backward(&self, caches: &[StepCache], step_grads: &[StepGradient], grads: &mut ActorCritic) -> Result<()> {
        if caches.len() != step_grads.len() {
            return Err(A3cError::dimension_mismatch(
                format!("{} step gradients", caches.len()),
                format!("{} step gradients", step_grads.len()),
            ));
        }

        let mut carry = CoreGradient::zeros(self.core.local_size(), self.core.context_size());
        for (cache, grad) in caches.iter().zip(step_grads).rev() {
            let fresh_grad = match (&self.memory, &cache.memory, grads.memory.as_mut()) {
                (Some(memory), Some(memory_cache), Some(memory_grads)) => {
                    memory.backward(memory_cache, grad.value, memory_grads)
                }
                _ => grad.value,
            };

            let mut hidden_grad = self.actor.backward(&cache.actor, grad.logits.view(), &mut grads.actor);
            let critic_grad = Array1::from_elem(1, fresh_grad);
            hidden_grad += &self.critic.backward(&cache.critic, critic_grad.view(), &mut grads.critic);
            hidden_grad += &self.depth_from_context.backward(
                &cache.depth_from_context,
                grad.depth_from_context.view(),
                &mut grads.depth_from_context,
            );

            let mut embedding_grad = self.core.backward(&cache.core, hidden_grad.view(), &mut carry, &mut grads.core);
            embedding_grad += &self.depth_from_embedding.backward(
                &cache.depth_from_embedding,
                grad.depth_from_embedding.view(),
                &mut grads.depth_from_embedding,
            );

            self.encoder.backward(&cache.encoder, embedding_grad.view(), &mut grads.encoder)?;
        }
        Ok(())
    }
}

impl Initializable for ActorCritic {
    fn initialize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.encoder.initialize(rng);
        self.core.initialize(rng);
        self.actor.initialize_normalized(0.01, rng);
        self.critic.initialize_normalized(1.0, rng);
        self.depth_from_embedding.initialize(rng);
        self.depth_from_context.initialize(rng);
        if let Some(memory) = self.memory.as_mut() {
            memory.initialize(rng);
        }
    }
}
