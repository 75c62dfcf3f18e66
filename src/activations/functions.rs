use ndarray::{Array, ArrayBase, Data, DataMut, Dimension};
use serde::{Serialize, Deserialize};

/// Scale constant of the scaled exponential linear unit.
pub const SELU_SCALE: f32 = 1.050_700_987_355_480_5;

/// Alpha constant of the scaled exponential linear unit.
pub const SELU_ALPHA: f32 = 1.673_263_242_354_377_3;

/// An enumeration of the activation functions used by the network layers.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Default)]
pub enum Activation {
    #[default]
    Linear,
    Selu,
    Sigmoid,
    Tanh,
}

impl Activation {
    /// Apply the activation to a single value.
    #[inline]
    pub fn scalar(&self, v: f32) -> f32 {
        match self {
            Activation::Linear => v,
            Activation::Selu => {
                if v > 0.0 {
                    SELU_SCALE * v
                } else {
                    SELU_SCALE * SELU_ALPHA * (v.exp() - 1.0)
                }
            }
            Activation::Sigmoid => 1.0 / (1.0 + (-v).exp()),
            Activation::Tanh => v.tanh(),
        }
    }

    /// Derivative with respect to the pre-activation value.
    #[inline]
    pub fn scalar_derivative(&self, v: f32) -> f32 {
        match self {
            Activation::Linear => 1.0,
            Activation::Selu => {
                if v > 0.0 {
                    SELU_SCALE
                } else {
                    SELU_SCALE * SELU_ALPHA * v.exp()
                }
            }
            Activation::Sigmoid => {
                let s = 1.0 / (1.0 + (-v).exp());
                s * (1.0 - s)
            }
            Activation::Tanh => {
                let t = v.tanh();
                1.0 - t * t
            }
        }
    }

    /// Apply the activation function to an array of any rank in-place.
    pub fn apply<S, D>(&self, input: &mut ArrayBase<S, D>)
    where
        S: DataMut<Elem = f32>,
        D: Dimension,
    {
        if let Activation::Linear = self {
            return;
        }
        input.mapv_inplace(|v| self.scalar(v));
    }

    /// Compute the element-wise derivative from stored pre-activation values.
    pub fn derivative<S, D>(&self, pre_activation: &ArrayBase<S, D>) -> Array<f32, D>
    where
        S: Data<Elem = f32>,
        D: Dimension,
    {
        pre_activation.mapv(|v| self.scalar_derivative(v))
    }
}
