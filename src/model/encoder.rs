use ndarray::{Array1, ArrayView1, ArrayView3};
use rand::Rng;

use crate::activations::Activation;
use crate::error::Result;
use crate::layers::{Conv2d, Conv2dCache, Initializable, Linear, LinearCache};

/// Frame encoder: two strided SELU convolutions and a SELU projection.
#[derive(Clone, Debug)]
pub struct Encoder {
    pub conv1: Conv2d,
    pub conv2: Conv2d,
    pub projection: Linear,
    conv_output: (usize, usize, usize),
}

#[derive(Clone, Debug)]
pub struct EncoderCache {
    conv1: Conv2dCache,
    conv2: Conv2dCache,
    projection: LinearCache,
}

impl Encoder {
    pub fn new(frame_shape: (usize, usize, usize), embedding_size: usize) -> Result<Self> {
        let (channels, height, width) = frame_shape;
        let conv1 = Conv2d::new(channels, 16, (8, 8), (4, 4), (1, 1), Activation::Selu)?;
        let conv2 = Conv2d::new(16, 32, (4, 4), (2, 2), (1, 1), Activation::Selu)?;

        let (h1, w1) = conv1.output_size(height, width)?;
        let (h2, w2) = conv2.output_size(h1, w1)?;
        let conv_output = (conv2.out_channels, h2, w2);
        let projection = Linear::new(h2 * w2 * conv2.out_channels, embedding_size, Activation::Selu);

        Ok(Encoder {
            conv1,
            conv2,
            projection,
            conv_output,
        })
    }

    /// Number of features the convolution stack hands to the projection
    pub fn flat_size(&self) -> usize {
        let (c, h, w) = self.conv_output;
        c * h * w
    }

    pub fn forward(&self, frame: ArrayView3<f32>) -> Result<(Array1<f32>, EncoderCache)> {
        let (x, conv1) = self.conv1.forward(frame)?;
        let (x, conv2) = self.conv2.forward(x.view())?;
        let flat = x.into_shape(self.flat_size())?;
        let (embedding, projection) = self.projection.forward(flat.view());
        Ok((embedding, EncoderCache { conv1, conv2, projection }))
    }

    pub fn backward(&self, cache: &EncoderCache, embedding_grad: ArrayView1<f32>, grads: &mut Encoder) -> Result<()> {
        let flat_grad = self.projection.backward(&cache.projection, embedding_grad, &mut grads.projection);
        let conv_grad = flat_grad.into_shape(self.conv_output)?;
        let conv1_grad = self.conv2.backward(&cache.conv2, conv_grad.view(), &mut grads.conv2, true)?;
        if let Some(conv1_grad) = conv1_grad {
            self.conv1.backward(&cache.conv1, conv1_grad.view(), &mut grads.conv1, false)?;
        }
        Ok(())
    }
}

impl Initializable for Encoder {
    fn initialize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.conv1.initialize(rng);
        self.conv2.initialize(rng);
        self.projection.initialize(rng);
    }
}

crate::impl_parameterized!(Encoder { conv1, conv2, projection });

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_reference_geometry() {
        let encoder = Encoder::new((3, 82, 82), 256).unwrap();
        assert_eq!(encoder.flat_size(), 3200);
        let (embedding, _) = encoder.forward(Array3::zeros((3, 82, 82)).view()).unwrap();
        assert_eq!(embedding.len(), 256);
    }

    #[test]
    fn test_frame_too_small() {
        assert!(Encoder::new((3, 4, 4), 16).is_err());
    }
}
