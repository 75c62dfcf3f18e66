use ndarray::{Array1, Array2, ArrayView1};
use rand::Rng;

use crate::activations::Activation;
use super::initialization::{normalized_columns, WeightInit};
use super::traits::{add_outer, Initializable};

/// A fully connected layer, `y = act(x · W + b)` with `W` laid out `(inputs, outputs)`.
#[derive(Clone, Debug)]
pub struct Linear {
    pub weights: Array2<f32>,
    pub biases: Array1<f32>,
    pub activation: Activation,
}

/// Values saved by [`Linear::forward`] for the backward pass
#[derive(Clone, Debug)]
pub struct LinearCache {
    input: Array1<f32>,
    pre_activation: Array1<f32>,
}

impl Linear {
    /// Create a zero-filled layer; call [`Initializable::initialize`] before use.
    pub fn new(input_size: usize, output_size: usize, activation: Activation) -> Self {
        Linear {
            weights: Array2::zeros((input_size, output_size)),
            biases: Array1::zeros(output_size),
            activation,
        }
    }

    pub fn output_size(&self) -> usize {
        self.weights.ncols()
    }

    /// Replace the weights with normalized Gaussian columns and zero the biases.
    pub fn initialize_normalized<R: Rng + ?Sized>(&mut self, std: f32, rng: &mut R) {
        self.weights = normalized_columns(self.weights.dim(), std, rng);
        self.biases.fill(0.0);
    }

    pub fn forward(&self, input: ArrayView1<f32>) -> (Array1<f32>, LinearCache) {
        let pre_activation = input.dot(&self.weights) + &self.biases;
        let mut output = pre_activation.clone();
        self.activation.apply(&mut output);
        let cache = LinearCache {
            input: input.to_owned(),
            pre_activation,
        };
        (output, cache)
    }

    /// Accumulate parameter gradients into `grads` and return the gradient w.r.t. the input.
    pub fn backward(&self, cache: &LinearCache, output_grad: ArrayView1<f32>, grads: &mut Linear) -> Array1<f32> {
        let delta = &output_grad * &self.activation.derivative(&cache.pre_activation);
        add_outer(&mut grads.weights, cache.input.view(), delta.view());
        grads.biases += &delta;
        self.weights.dot(&delta)
    }
}

impl Initializable for Linear {
    fn initialize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let (fan_in, fan_out) = self.weights.dim();
        self.weights = WeightInit::XavierUniform.initialize(self.weights.dim(), fan_in, fan_out, rng);
        self.biases = WeightInit::Zeros.initialize(self.biases.dim(), fan_in, fan_out, rng);
    }
}

crate::impl_parameterized!(Linear { weights, biases });

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::Parameterized;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_forward_known_values() {
        let layer = Linear {
            weights: array![[1.0, 2.0], [3.0, 4.0]],
            biases: array![0.5, -0.5],
            activation: Activation::Linear,
        };
        let (output, _) = layer.forward(array![1.0, 1.0].view());
        assert_eq!(output, array![4.5, 5.5]);
    }

    #[test]
    fn test_xavier_bounds_and_zero_bias() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut layer = Linear::new(30, 10, Activation::Selu);
        layer.initialize(&mut rng);

        let bound = (6.0f32 / 40.0).sqrt();
        assert!(layer.weights.iter().all(|w| w.abs() <= bound));
        assert!(layer.biases.iter().all(|&b| b == 0.0));
        assert_eq!(layer.num_parameters(), 30 * 10 + 10);
    }

    #[test]
    fn test_normalized_columns() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut layer = Linear::new(16, 4, Activation::Linear);
        layer.initialize_normalized(0.01, &mut rng);

        for column in layer.weights.columns() {
            let norm = column.iter().map(|w| w * w).sum::<f32>().sqrt();
            assert!((norm - 0.01).abs() < 1e-5);
        }
    }
}
