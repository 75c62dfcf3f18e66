use ndarray::{Array, Array2, Axis, Dimension, ShapeBuilder};
use ndarray_rand::RandomExt;
use rand::Rng;
use rand_distr::{StandardNormal, Uniform};

/// Weight initialization strategies
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeightInit {
    /// Xavier/Glorot uniform initialization, bound `sqrt(6 / (fan_in + fan_out))`
    XavierUniform,

    /// All zeros
    Zeros,
}

impl WeightInit {
    /// Sample a tensor of any rank.
    ///
    /// `fan_in` and `fan_out` are supplied by the layer since their meaning depends on the
    /// layer type (receptive field size for convolutions).
    pub fn initialize<Sh, D, R>(&self, shape: Sh, fan_in: usize, fan_out: usize, rng: &mut R) -> Array<f32, D>
    where
        Sh: ShapeBuilder<Dim = D>,
        D: Dimension,
        R: Rng + ?Sized,
    {
        match *self {
            WeightInit::XavierUniform => {
                let bound = (6.0 / (fan_in + fan_out).max(1) as f32).sqrt();
                symmetric_uniform(shape, bound, rng)
            }
            WeightInit::Zeros => Array::zeros(shape),
        }
    }
}

fn symmetric_uniform<Sh, D, R>(shape: Sh, bound: f32, rng: &mut R) -> Array<f32, D>
where
    Sh: ShapeBuilder<Dim = D>,
    D: Dimension,
    R: Rng + ?Sized,
{
    if bound <= 0.0 {
        return Array::zeros(shape);
    }
    Array::random_using(shape, Uniform::new(-bound, bound), rng)
}

/// Gaussian weights rescaled so every output column has L2 norm `std`.
///
/// Weights are laid out `(inputs, outputs)`, so a column is the fan-in of one output unit.
/// A small `std` on the actor head gives a near-uniform initial policy.
pub fn normalized_columns<R: Rng + ?Sized>(shape: (usize, usize), std: f32, rng: &mut R) -> Array2<f32> {
    let mut weights: Array2<f32> = Array2::random_using(shape, StandardNormal, rng);
    for mut column in weights.axis_iter_mut(Axis(1)) {
        let norm = column.iter().map(|&w| w * w).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            let scale = std / norm;
            column.mapv_inplace(|w| w * scale);
        }
    }
    weights
}
