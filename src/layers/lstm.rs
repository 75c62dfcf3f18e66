use ndarray::{Array1, Array2, ArrayView1};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;

use crate::activations::Activation;
use super::traits::{add_outer, Initializable};

/// Hidden and cell vectors of one LSTM cell
#[derive(Clone, Debug, PartialEq)]
pub struct CellState {
    pub hidden: Array1<f32>,
    pub cell: Array1<f32>,
}

impl CellState {
    pub fn zeros(hidden_size: usize) -> Self {
        CellState {
            hidden: Array1::zeros(hidden_size),
            cell: Array1::zeros(hidden_size),
        }
    }
}

/// A single-step LSTM cell.
///
/// Gates follow the usual input/forget/cell/output split, each with an input-to-hidden matrix
/// laid out `(input, hidden)`, a hidden-to-hidden matrix `(hidden, hidden)` and a bias.
#[derive(Clone, Debug)]
pub struct LstmCell {
    pub input_size: usize,
    pub hidden_size: usize,

    // Input gate
    pub w_ii: Array2<f32>,
    pub w_hi: Array2<f32>,
    pub b_i: Array1<f32>,

    // Forget gate
    pub w_if: Array2<f32>,
    pub w_hf: Array2<f32>,
    pub b_f: Array1<f32>,

    // Cell gate (candidate values)
    pub w_ig: Array2<f32>,
    pub w_hg: Array2<f32>,
    pub b_g: Array1<f32>,

    // Output gate
    pub w_io: Array2<f32>,
    pub w_ho: Array2<f32>,
    pub b_o: Array1<f32>,
}

/// Gate activations of one step, kept for backpropagation through time
#[derive(Clone, Debug)]
pub struct LstmCache {
    input: Array1<f32>,
    prev: CellState,
    input_gate: Array1<f32>,
    forget_gate: Array1<f32>,
    cell_gate: Array1<f32>,
    output_gate: Array1<f32>,
    cell_tanh: Array1<f32>,
}

impl LstmCell {
    pub fn new(input_size: usize, hidden_size: usize) -> Self {
        let ih = || Array2::zeros((input_size, hidden_size));
        let hh = || Array2::zeros((hidden_size, hidden_size));
        let b = || Array1::zeros(hidden_size);
        LstmCell {
            input_size,
            hidden_size,
            w_ii: ih(),
            w_hi: hh(),
            b_i: b(),
            w_if: ih(),
            w_hf: hh(),
            b_f: b(),
            w_ig: ih(),
            w_hg: hh(),
            b_g: b(),
            w_io: ih(),
            w_ho: hh(),
            b_o: b(),
        }
    }

    pub fn initial_state(&self) -> CellState {
        CellState::zeros(self.hidden_size)
    }

    fn gate(
        input: ArrayView1<f32>,
        hidden: ArrayView1<f32>,
        w_x: &Array2<f32>,
        w_h: &Array2<f32>,
        bias: &Array1<f32>,
        activation: Activation,
    ) -> Array1<f32> {
        let mut gate = input.dot(w_x) + hidden.dot(w_h) + bias;
        activation.apply(&mut gate);
        gate
    }

    pub fn forward(&self, input: ArrayView1<f32>, prev: &CellState) -> (CellState, LstmCache) {
        let h = prev.hidden.view();
        let i = Self::gate(input, h, &self.w_ii, &self.w_hi, &self.b_i, Activation::Sigmoid);
        let f = Self::gate(input, h, &self.w_if, &self.w_hf, &self.b_f, Activation::Sigmoid);
        let g = Self::gate(input, h, &self.w_ig, &self.w_hg, &self.b_g, Activation::Tanh);
        let o = Self::gate(input, h, &self.w_io, &self.w_ho, &self.b_o, Activation::Sigmoid);

        let cell = &f * &prev.cell + &i * &g;
        let cell_tanh = cell.mapv(f32::tanh);
        let hidden = &o * &cell_tanh;

        let cache = LstmCache {
            input: input.to_owned(),
            prev: prev.clone(),
            input_gate: i,
            forget_gate: f,
            cell_gate: g,
            output_gate: o,
            cell_tanh,
        };
        (CellState { hidden, cell }, cache)
    }

    /// One step of backpropagation through time.
    ///
    /// `hidden_grad` is the total gradient reaching this step's hidden output (from heads and
    /// from the next step), `cell_grad` the gradient flowing back from the next step's cell.
    /// Returns `(input_grad, prev_hidden_grad, prev_cell_grad)`.
    pub fn backward(
        &self,
        cache: &LstmCache,
        hidden_grad: ArrayView1<f32>,
        cell_grad: ArrayView1<f32>,
        grads: &mut LstmCell,
    ) -> (Array1<f32>, Array1<f32>, Array1<f32>) {
        let LstmCache { input_gate: i, forget_gate: f, cell_gate: g, output_gate: o, cell_tanh, .. } = cache;

        let d_output = &hidden_grad * cell_tanh;
        let d_cell = &cell_grad + &(&hidden_grad * o * &cell_tanh.mapv(|t| 1.0 - t * t));

        let d_input = &d_cell * g;
        let d_forget = &d_cell * &cache.prev.cell;
        let d_candidate = &d_cell * i;
        let prev_cell_grad = &d_cell * f;

        // Gradients w.r.t. the gate pre-activations
        let da_i = d_input * &i.mapv(|s| s * (1.0 - s));
        let da_f = d_forget * &f.mapv(|s| s * (1.0 - s));
        let da_g = d_candidate * &g.mapv(|t| 1.0 - t * t);
        let da_o = d_output * &o.mapv(|s| s * (1.0 - s));

        let x = cache.input.view();
        let h = cache.prev.hidden.view();
        let mut input_grad = Array1::zeros(self.input_size);
        let mut prev_hidden_grad = Array1::zeros(self.hidden_size);

        let gates = [
            (&da_i, &self.w_ii, &self.w_hi, &mut grads.w_ii, &mut grads.w_hi, &mut grads.b_i),
            (&da_f, &self.w_if, &self.w_hf, &mut grads.w_if, &mut grads.w_hf, &mut grads.b_f),
            (&da_g, &self.w_ig, &self.w_hg, &mut grads.w_ig, &mut grads.w_hg, &mut grads.b_g),
            (&da_o, &self.w_io, &self.w_ho, &mut grads.w_io, &mut grads.w_ho, &mut grads.b_o),
        ];
        for (delta, w_x, w_h, g_wx, g_wh, g_b) in gates {
            add_outer(g_wx, x, delta.view());
            add_outer(g_wh, h, delta.view());
            *g_b += delta;
            input_grad += &w_x.dot(delta);
            prev_hidden_grad += &w_h.dot(delta);
        }

        (input_grad, prev_hidden_grad, prev_cell_grad)
    }
}

impl Initializable for LstmCell {
    fn initialize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let bound = 1.0 / (self.hidden_size as f32).sqrt();
        let dist = Uniform::new(-bound, bound);
        for weights in [
            &mut self.w_ii, &mut self.w_hi,
            &mut self.w_if, &mut self.w_hf,
            &mut self.w_ig, &mut self.w_hg,
            &mut self.w_io, &mut self.w_ho,
        ] {
            *weights = Array2::random_using(weights.dim(), dist, rng);
        }
        for bias in [&mut self.b_i, &mut self.b_f, &mut self.b_g, &mut self.b_o] {
            bias.fill(0.0);
        }
    }
}

crate::impl_parameterized!(LstmCell {
    w_ii, w_hi, b_i,
    w_if, w_hf, b_f,
    w_ig, w_hg, b_g,
    w_io, w_ho, b_o,
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::Parameterized;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_parameter_count() {
        let cell = LstmCell::new(5, 3);
        assert_eq!(cell.num_parameters(), 4 * (5 * 3 + 3 * 3 + 3));
    }

    #[test]
    fn test_zero_weights_give_half_gated_state() {
        let cell = LstmCell::new(2, 4);
        let (state, _) = cell.forward(Array1::ones(2).view(), &cell.initial_state());
        // All gates at sigmoid(0) = 0.5 and candidate tanh(0) = 0
        assert!(state.hidden.iter().all(|&v| v == 0.0));
        assert!(state.cell.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_initialize_bounds() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut cell = LstmCell::new(8, 16);
        cell.initialize(&mut rng);
        assert!(cell.w_hi.iter().all(|w| w.abs() <= 0.25));
        assert!(cell.w_ii.iter().any(|&w| w != 0.0));
        assert!(cell.b_f.iter().all(|&b| b == 0.0));
    }
}
