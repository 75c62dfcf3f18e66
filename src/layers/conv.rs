use ndarray::linalg::general_mat_mul;
use ndarray::{Array1, Array2, Array3, ArrayView2, ArrayView3, Axis};
use rand::Rng;

use crate::activations::Activation;
use crate::error::{A3cError, Result};
use super::initialization::WeightInit;
use super::traits::Initializable;

/// 2D convolution over a single `(channels, height, width)` image.
///
/// Kernels are stored unrolled as `(out_channels, in_channels * kh * kw)` so the forward pass
/// is one matrix product against the im2col expansion of the input.
#[derive(Clone, Debug)]
pub struct Conv2d {
    pub kernels: Array2<f32>,
    pub biases: Array1<f32>,
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel_size: (usize, usize),
    pub stride: (usize, usize),
    pub padding: (usize, usize),
    pub activation: Activation,
}

#[derive(Clone, Debug)]
pub struct Conv2dCache {
    columns: Array2<f32>,
    pre_activation: Array2<f32>,
    input_dim: (usize, usize, usize),
    output_dim: (usize, usize),
}

impl Conv2d {
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: (usize, usize),
        stride: (usize, usize),
        padding: (usize, usize),
        activation: Activation,
    ) -> Result<Self> {
        if in_channels == 0 || out_channels == 0 {
            return Err(A3cError::invalid_parameter("channels", "must be positive"));
        }
        if kernel_size.0 == 0 || kernel_size.1 == 0 || stride.0 == 0 || stride.1 == 0 {
            return Err(A3cError::invalid_parameter("kernel_size/stride", "must be positive"));
        }
        Ok(Conv2d {
            kernels: Array2::zeros((out_channels, in_channels * kernel_size.0 * kernel_size.1)),
            biases: Array1::zeros(out_channels),
            in_channels,
            out_channels,
            kernel_size,
            stride,
            padding,
            activation,
        })
    }

    /// Spatial output size for an input of `(height, width)`.
    pub fn output_size(&self, height: usize, width: usize) -> Result<(usize, usize)> {
        let (kh, kw) = self.kernel_size;
        let padded_h = height + 2 * self.padding.0;
        let padded_w = width + 2 * self.padding.1;
        if padded_h < kh || padded_w < kw {
            return Err(A3cError::dimension_mismatch(
                format!("input of at least {}x{} after padding", kh, kw),
                format!("{}x{}", padded_h, padded_w),
            ));
        }
        Ok(((padded_h - kh) / self.stride.0 + 1, (padded_w - kw) / self.stride.1 + 1))
    }

    pub fn forward(&self, input: ArrayView3<f32>) -> Result<(Array3<f32>, Conv2dCache)> {
        let (channels, height, width) = input.dim();
        if channels != self.in_channels {
            return Err(A3cError::dimension_mismatch(
                format!("{} input channels", self.in_channels),
                format!("{} input channels", channels),
            ));
        }
        let (out_h, out_w) = self.output_size(height, width)?;

        let columns = self.im2col(input, out_h, out_w);
        let mut pre_activation = self.kernels.dot(&columns);
        pre_activation += &self.biases.view().insert_axis(Axis(1));

        let mut output = pre_activation.clone();
        self.activation.apply(&mut output);
        let output = output.into_shape((self.out_channels, out_h, out_w))?;

        let cache = Conv2dCache {
            columns,
            pre_activation,
            input_dim: (channels, height, width),
            output_dim: (out_h, out_w),
        };
        Ok((output, cache))
    }

    /// Accumulate kernel and bias gradients; returns the input gradient when `need_input_grad`.
    ///
    /// The first layer of a network has no use for its input gradient, so it can skip the col2im.
    pub fn backward(
        &self,
        cache: &Conv2dCache,
        output_grad: ArrayView3<f32>,
        grads: &mut Conv2d,
        need_input_grad: bool,
    ) -> Result<Option<Array3<f32>>> {
        let (out_h, out_w) = cache.output_dim;
        let output_grad = output_grad
            .as_standard_layout()
            .into_owned()
            .into_shape((self.out_channels, out_h * out_w))?;
        let delta = output_grad * self.activation.derivative(&cache.pre_activation);

        general_mat_mul(1.0, &delta, &cache.columns.t(), 1.0, &mut grads.kernels);
        grads.biases += &delta.sum_axis(Axis(1));

        if !need_input_grad {
            return Ok(None);
        }
        let column_grad = self.kernels.t().dot(&delta);
        Ok(Some(self.col2im(column_grad.view(), cache.input_dim, cache.output_dim)))
    }

    fn im2col(&self, input: ArrayView3<f32>, out_h: usize, out_w: usize) -> Array2<f32> {
        let (channels, height, width) = input.dim();
        let (kh, kw) = self.kernel_size;
        let mut columns = Array2::zeros((channels * kh * kw, out_h * out_w));

        for c in 0..channels {
            for ki in 0..kh {
                for kj in 0..kw {
                    let row = (c * kh + ki) * kw + kj;
                    for oy in 0..out_h {
                        let iy = (oy * self.stride.0 + ki) as isize - self.padding.0 as isize;
                        if iy < 0 || iy >= height as isize {
                            continue;
                        }
                        for ox in 0..out_w {
                            let ix = (ox * self.stride.1 + kj) as isize - self.padding.1 as isize;
                            if ix < 0 || ix >= width as isize {
                                continue;
                            }
                            columns[[row, oy * out_w + ox]] = input[[c, iy as usize, ix as usize]];
                        }
                    }
                }
            }
        }
        columns
    }

    fn col2im(
        &self,
        column_grad: ArrayView2<f32>,
        input_dim: (usize, usize, usize),
        output_dim: (usize, usize),
    ) -> Array3<f32> {
        let (channels, height, width) = input_dim;
        let (out_h, out_w) = output_dim;
        let (kh, kw) = self.kernel_size;
        let mut input_grad = Array3::zeros(input_dim);

        for c in 0..channels {
            for ki in 0..kh {
                for kj in 0..kw {
                    let row = (c * kh + ki) * kw + kj;
                    for oy in 0..out_h {
                        let iy = (oy * self.stride.0 + ki) as isize - self.padding.0 as isize;
                        if iy < 0 || iy >= height as isize {
                            continue;
                        }
                        for ox in 0..out_w {
                            let ix = (ox * self.stride.1 + kj) as isize - self.padding.1 as isize;
                            if ix < 0 || ix >= width as isize {
                                continue;
                            }
                            input_grad[[c, iy as usize, ix as usize]] += column_grad[[row, oy * out_w + ox]];
                        }
                    }
                }
            }
        }
        input_grad
    }
}

impl Initializable for Conv2d {
    fn initialize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let receptive_field = self.kernel_size.0 * self.kernel_size.1;
        let fan_in = self.in_channels * receptive_field;
        let fan_out = self.out_channels * receptive_field;
        self.kernels = WeightInit::XavierUniform.initialize(self.kernels.dim(), fan_in, fan_out, rng);
        self.biases.fill(0.0);
    }
}

crate::impl_parameterized!(Conv2d { kernels, biases });

/// Stride-1 1D convolution over a `(channels, length)` sequence, no activation.
#[derive(Clone, Debug)]
pub struct Conv1d {
    pub kernels: Array2<f32>,
    pub biases: Array1<f32>,
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel_size: usize,
    pub padding: usize,
}

#[derive(Clone, Debug)]
pub struct Conv1dCache {
    columns: Array2<f32>,
    input_len: usize,
    output_len: usize,
}

impl Conv1d {
    pub fn new(in_channels: usize, out_channels: usize, kernel_size: usize, padding: usize) -> Result<Self> {
        if in_channels == 0 || out_channels == 0 || kernel_size == 0 {
            return Err(A3cError::invalid_parameter("conv1d", "channels and kernel size must be positive"));
        }
        Ok(Conv1d {
            kernels: Array2::zeros((out_channels, in_channels * kernel_size)),
            biases: Array1::zeros(out_channels),
            in_channels,
            out_channels,
            kernel_size,
            padding,
        })
    }

    /// Odd-width convolution whose output has the same length as its input.
    pub fn same(in_channels: usize, out_channels: usize, kernel_size: usize) -> Result<Self> {
        if kernel_size % 2 == 0 {
            return Err(A3cError::invalid_parameter("kernel_size", "same padding needs an odd width"));
        }
        Self::new(in_channels, out_channels, kernel_size, kernel_size / 2)
    }

    pub fn forward(&self, input: ArrayView2<f32>) -> Result<(Array2<f32>, Conv1dCache)> {
        let (channels, length) = input.dim();
        if channels != self.in_channels {
            return Err(A3cError::dimension_mismatch(
                format!("{} input channels", self.in_channels),
                format!("{} input channels", channels),
            ));
        }
        let padded = length + 2 * self.padding;
        if padded < self.kernel_size {
            return Err(A3cError::dimension_mismatch(
                format!("sequence of at least {} after padding", self.kernel_size),
                format!("{}", padded),
            ));
        }
        let output_len = padded - self.kernel_size + 1;

        let k = self.kernel_size;
        let mut columns = Array2::zeros((channels * k, output_len));
        for c in 0..channels {
            for j in 0..k {
                for t in 0..output_len {
                    let i = (t + j) as isize - self.padding as isize;
                    if i >= 0 && (i as usize) < length {
                        columns[[c * k + j, t]] = input[[c, i as usize]];
                    }
                }
            }
        }

        let mut output = self.kernels.dot(&columns);
        output += &self.biases.view().insert_axis(Axis(1));
        Ok((output, Conv1dCache { columns, input_len: length, output_len }))
    }

    /// Accumulate parameter gradients and return the gradient w.r.t. the input sequence.
    pub fn backward(&self, cache: &Conv1dCache, output_grad: ArrayView2<f32>, grads: &mut Conv1d) -> Array2<f32> {
        general_mat_mul(1.0, &output_grad, &cache.columns.t(), 1.0, &mut grads.kernels);
        grads.biases += &output_grad.sum_axis(Axis(1));

        let column_grad = self.kernels.t().dot(&output_grad);
        let k = self.kernel_size;
        let mut input_grad = Array2::zeros((self.in_channels, cache.input_len));
        for c in 0..self.in_channels {
            for j in 0..k {
                for t in 0..cache.output_len {
                    let i = (t + j) as isize - self.padding as isize;
                    if i >= 0 && (i as usize) < cache.input_len {
                        input_grad[[c, i as usize]] += column_grad[[c * k + j, t]];
                    }
                }
            }
        }
        input_grad
    }
}

impl Initializable for Conv1d {
    fn initialize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let fan_in = self.in_channels * self.kernel_size;
        let fan_out = self.out_channels * self.kernel_size;
        self.kernels = WeightInit::XavierUniform.initialize(self.kernels.dim(), fan_in, fan_out, rng);
        self.biases.fill(0.0);
    }
}

crate::impl_parameterized!(Conv1d { kernels, biases });

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array};

    #[test]
    fn test_conv2d_output_geometry() {
        let conv1 = Conv2d::new(3, 16, (8, 8), (4, 4), (1, 1), Activation::Selu).unwrap();
        let conv2 = Conv2d::new(16, 32, (4, 4), (2, 2), (1, 1), Activation::Selu).unwrap();
        assert_eq!(conv1.output_size(82, 82).unwrap(), (20, 20));
        assert_eq!(conv2.output_size(20, 20).unwrap(), (10, 10));
    }

    #[test]
    fn test_conv2d_identity_kernel() {
        let mut conv = Conv2d::new(1, 1, (1, 1), (1, 1), (0, 0), Activation::Linear).unwrap();
        conv.kernels.fill(2.0);
        conv.biases.fill(1.0);
        let input = Array::from_shape_vec((1, 2, 2), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let (output, _) = conv.forward(input.view()).unwrap();
        assert_eq!(output.into_raw_vec(), vec![3.0, 5.0, 7.0, 9.0]);
    }

    #[test]
    fn test_conv2d_rejects_wrong_channels() {
        let conv = Conv2d::new(3, 4, (3, 3), (1, 1), (1, 1), Activation::Linear).unwrap();
        let input = Array3::<f32>::zeros((1, 5, 5));
        assert!(conv.forward(input.view()).is_err());
    }

    #[test]
    fn test_conv1d_same_padding() {
        let mut conv = Conv1d::same(1, 1, 3).unwrap();
        conv.kernels.fill(1.0);
        let input = array![[1.0, 2.0, 3.0]];
        let (output, _) = conv.forward(input.view()).unwrap();
        assert_eq!(output, array![[3.0, 6.0, 5.0]]);
    }

    #[test]
    fn test_conv1d_even_kernel_rejected() {
        assert!(Conv1d::same(1, 2, 4).is_err());
    }
}
