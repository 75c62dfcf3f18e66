use ndarray::{concatenate, s, Array1, ArrayView1, Axis};
use rand::Rng;

use crate::error::Result;
use crate::layers::{CellState, Initializable, LstmCache, LstmCell};

/// The two stacked recurrent cells.
///
/// The local cell sees the embedding and the last reward. The context cell sees the
/// embedding, the local cell's fresh hidden state, the velocity and the last action.
#[derive(Clone, Debug)]
pub struct RecurrentCore {
    pub local: LstmCell,
    pub context: LstmCell,
    embedding_size: usize,
}

/// Inputs of the core besides the embedding
pub struct CoreInput<'a> {
    pub embedding: ArrayView1<'a, f32>,
    pub last_reward: f32,
    pub velocity: ArrayView1<'a, f32>,
    pub action_one_hot: ArrayView1<'a, f32>,
}

#[derive(Clone, Debug)]
pub struct CoreCache {
    local: LstmCache,
    context: LstmCache,
}

/// Gradients carried backwards from step `t + 1` into step `t`
#[derive(Clone, Debug)]
pub struct CoreGradient {
    pub local_hidden: Array1<f32>,
    pub local_cell: Array1<f32>,
    pub context_hidden: Array1<f32>,
    pub context_cell: Array1<f32>,
}

impl CoreGradient {
    pub fn zeros(local_size: usize, context_size: usize) -> Self {
        CoreGradient {
            local_hidden: Array1::zeros(local_size),
            local_cell: Array1::zeros(local_size),
            context_hidden: Array1::zeros(context_size),
            context_cell: Array1::zeros(context_size),
        }
    }
}

impl RecurrentCore {
    pub fn new(
        embedding_size: usize,
        local_size: usize,
        context_size: usize,
        velocity_size: usize,
        num_actions: usize,
    ) -> Self {
        RecurrentCore {
            local: LstmCell::new(embedding_size + 1, local_size),
            context: LstmCell::new(embedding_size + local_size + velocity_size + num_actions, context_size),
            embedding_size,
        }
    }

    pub fn local_size(&self) -> usize {
        self.local.hidden_size
    }

    pub fn context_size(&self) -> usize {
        self.context.hidden_size
    }

    /// Advance both cells one step, returning the new `(local, context)` states.
    pub fn forward(
        &self,
        input: &CoreInput<'_>,
        local: &CellState,
        context: &CellState,
    ) -> Result<(CellState, CellState, CoreCache)> {
        let reward = Array1::from_elem(1, input.last_reward);
        let local_input = concatenate(Axis(0), &[input.embedding.view(), reward.view()])?;
        let (local, local_cache) = self.local.forward(local_input.view(), local);

        let context_input = concatenate(
            Axis(0),
            &[
                input.embedding.view(),
                local.hidden.view(),
                input.velocity.view(),
                input.action_one_hot.view(),
            ],
        )?;
        let (context, context_cache) = self.context.forward(context_input.view(), context);

        Ok((
            local,
            context,
            CoreCache {
                local: local_cache,
                context: context_cache,
            },
        ))
    }

    /// Backpropagate one step.
    ///
    /// `context_hidden_grad` is the gradient from this step's heads; the gradients carried
    /// from the following step are taken from `carry`, which is replaced by the gradients for
    /// the previous step. Returns the gradient with respect to the embedding.
    pub fn backward(
        &self,
        cache: &CoreCache,
        context_hidden_grad: ArrayView1<f32>,
        carry: &mut CoreGradient,
        grads: &mut RecurrentCore,
    ) -> Array1<f32> {
        let e = self.embedding_size;
        let l = self.local_size();

        let context_total = &context_hidden_grad + &carry.context_hidden;
        let (context_input_grad, context_hidden, context_cell) = self.context.backward(
            &cache.context,
            context_total.view(),
            carry.context_cell.view(),
            &mut grads.context,
        );

        let local_total = &carry.local_hidden + &context_input_grad.slice(s![e..e + l]);
        let (local_input_grad, local_hidden, local_cell) = self.local.backward(
            &cache.local,
            local_total.view(),
            carry.local_cell.view(),
            &mut grads.local,
        );

        *carry = CoreGradient {
            local_hidden,
            local_cell,
            context_hidden,
            context_cell,
        };

        &context_input_grad.slice(s![..e]) + &local_input_grad.slice(s![..e])
    }
}

impl Initializable for RecurrentCore {
    fn initialize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.local.initialize(rng);
        self.context.initialize(rng);
    }
}

crate::impl_parameterized!(RecurrentCore { local, context });
