use ndarray::{Array1, ArrayView1};
use rand::Rng;

use crate::activations::Activation;
use crate::layers::{Initializable, Linear, LinearCache};

/// Two stacked linear layers predicting the depth histogram logits.
///
/// There is no nonlinearity between the layers; the head is trained only through the
/// auxiliary depth loss.
#[derive(Clone, Debug)]
pub struct DepthHead {
    pub hidden: Linear,
    pub output: Linear,
}

#[derive(Clone, Debug)]
pub struct DepthHeadCache {
    hidden: LinearCache,
    output: LinearCache,
}

impl DepthHead {
    pub fn new(input_size: usize, hidden_size: usize, output_size: usize) -> Self {
        DepthHead {
            hidden: Linear::new(input_size, hidden_size, Activation::Linear),
            output: Linear::new(hidden_size, output_size, Activation::Linear),
        }
    }

    pub fn forward(&self, input: ArrayView1<f32>) -> (Array1<f32>, DepthHeadCache) {
        let (h, hidden) = self.hidden.forward(input);
        let (logits, output) = self.output.forward(h.view());
        (logits, DepthHeadCache { hidden, output })
    }

    pub fn backward(&self, cache: &DepthHeadCache, grad: ArrayView1<f32>, grads: &mut DepthHead) -> Array1<f32> {
        let h_grad = self.output.backward(&cache.output, grad, &mut grads.output);
        self.hidden.backward(&cache.hidden, h_grad.view(), &mut grads.hidden)
    }
}

impl Initializable for DepthHead {
    fn initialize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.hidden.initialize(rng);
        self.output.initialize(rng);
    }
}

crate::impl_parameterized!(DepthHead { hidden, output });
