use ndarray::{Array1, ArrayView1, ArrayView2, Axis};

use crate::error::{A3cError, Result};

/// Trait defining the interface for the auxiliary depth losses
pub trait Loss: Send + Sync {
    /// Compute the loss for a single prediction and target
    fn compute(&self, prediction: ArrayView1<f32>, target: ArrayView1<f32>) -> Result<f32>;

    /// Compute the gradient of the loss with respect to the prediction
    fn gradient(&self, prediction: ArrayView1<f32>, target: ArrayView1<f32>) -> Result<Array1<f32>>;
}

fn check_lengths(prediction: &ArrayView1<f32>, target: &ArrayView1<f32>) -> Result<()> {
    if prediction.len() != target.len() {
        return Err(A3cError::dimension_mismatch(
            format!("target of length {}", prediction.len()),
            format!("length {}", target.len()),
        ));
    }
    Ok(())
}

/// Mean Squared Error loss, `Σ (p - t)² / 2n`
pub struct MeanSquaredError;

impl Loss for MeanSquaredError {
    fn compute(&self, prediction: ArrayView1<f32>, target: ArrayView1<f32>) -> Result<f32> {
        check_lengths(&prediction, &target)?;
        let diff = &prediction - &target;
        Ok((&diff * &diff).sum() / (2.0 * prediction.len().max(1) as f32))
    }

    fn gradient(&self, prediction: ArrayView1<f32>, target: ArrayView1<f32>) -> Result<Array1<f32>> {
        check_lengths(&prediction, &target)?;
        Ok((&prediction - &target) / prediction.len().max(1) as f32)
    }
}

/// Softmax cross-entropy applied independently to every cell of a binned histogram.
///
/// The prediction holds `cells * bins` logits, cell-major. Each cell is a separate categorical
/// distribution over `bins`. The loss is averaged over cells whose target carries any mass;
/// an all-zero target cell (the substitute histogram of a terminal step) contributes nothing.
pub struct BinnedCrossEntropy {
    pub bins: usize,
}

impl BinnedCrossEntropy {
    pub fn new(bins: usize) -> Self {
        BinnedCrossEntropy { bins: bins.max(1) }
    }

    /// Per-cell softmax probabilities and which cells are supervised
    fn softmax_cells(&self, prediction: ArrayView1<f32>, target: ArrayView1<f32>) -> Result<(Array1<f32>, Vec<bool>)> {
        check_lengths(&prediction, &target)?;
        if prediction.len() % self.bins != 0 {
            return Err(A3cError::dimension_mismatch(
                format!("a multiple of {} bins", self.bins),
                format!("length {}", prediction.len()),
            ));
        }
        let cells = prediction.len() / self.bins;
        let logits: ArrayView2<f32> = prediction.into_shape((cells, self.bins))?;
        let targets: ArrayView2<f32> = target.into_shape((cells, self.bins))?;
        let mut probs = Array1::zeros(prediction.len());
        let mut supervised = vec![false; cells];

        for (cell, (row, t)) in logits.axis_iter(Axis(0)).zip(targets.axis_iter(Axis(0))).enumerate() {
            let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
            let exp = row.mapv(|v| (v - max).exp());
            let sum = exp.sum();
            probs
                .slice_mut(ndarray::s![cell * self.bins..(cell + 1) * self.bins])
                .assign(&(exp / sum));
            supervised[cell] = t.iter().any(|&v| v != 0.0);
        }
        Ok((probs, supervised))
    }
}

impl Loss for BinnedCrossEntropy {
    fn compute(&self, prediction: ArrayView1<f32>, target: ArrayView1<f32>) -> Result<f32> {
        let (probs, supervised) = self.softmax_cells(prediction, target)?;
        let count = supervised.iter().filter(|&&s| s).count();
        if count == 0 {
            return Ok(0.0);
        }

        let epsilon = 1e-12;
        let mut total = 0.0;
        for cell in (0..supervised.len()).filter(|&c| supervised[c]) {
            let range = cell * self.bins..(cell + 1) * self.bins;
            for i in range {
                if target[i] != 0.0 {
                    total -= target[i] * (probs[i] + epsilon).ln();
                }
            }
        }
        Ok(total / count as f32)
    }

    fn gradient(&self, prediction: ArrayView1<f32>, target: ArrayView1<f32>) -> Result<Array1<f32>> {
        let (probs, supervised) = self.softmax_cells(prediction, target)?;
        let count = supervised.iter().filter(|&&s| s).count();
        let mut grad = Array1::zeros(prediction.len());
        if count == 0 {
            return Ok(grad);
        }

        for cell in (0..supervised.len()).filter(|&c| supervised[c]) {
            let mass: f32 = (cell * self.bins..(cell + 1) * self.bins).map(|i| target[i]).sum();
            for i in cell * self.bins..(cell + 1) * self.bins {
                grad[i] = (mass * probs[i] - target[i]) / count as f32;
            }
        }
        Ok(grad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_mse() {
        let loss = MeanSquaredError;
        let p = array![1.0, 2.0];
        let t = array![0.0, 2.0];
        assert!((loss.compute(p.view(), t.view()).unwrap() - 0.25).abs() < 1e-6);
        assert_eq!(loss.gradient(p.view(), t.view()).unwrap(), array![0.5, 0.0]);
    }

    #[test]
    fn test_uniform_logits_cross_entropy() {
        let loss = BinnedCrossEntropy::new(4);
        let p = Array1::zeros(8);
        let t = array![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let value = loss.compute(p.view(), t.view()).unwrap();
        assert!((value - 4.0f32.ln()).abs() < 1e-5);

        let grad = loss.gradient(p.view(), t.view()).unwrap();
        assert!((grad[0] - (0.25 - 1.0) / 2.0).abs() < 1e-6);
        assert!((grad[1] - 0.25 / 2.0).abs() < 1e-6);
        // Each cell's gradient sums to zero
        assert!(grad.slice(ndarray::s![0..4]).sum().abs() < 1e-6);
    }

    #[test]
    fn test_empty_target_cells_are_skipped() {
        let loss = BinnedCrossEntropy::new(2);
        let p = array![3.0, -1.0, 0.5, 0.5];
        let t = array![0.0, 0.0, 1.0, 0.0];
        assert!((loss.compute(p.view(), t.view()).unwrap() - 2.0f32.ln()).abs() < 1e-5);
        let grad = loss.gradient(p.view(), t.view()).unwrap();
        assert_eq!(grad[0], 0.0);
        assert_eq!(grad[1], 0.0);

        let zeros = Array1::zeros(4);
        assert_eq!(loss.compute(p.view(), zeros.view()).unwrap(), 0.0);
    }

    #[test]
    fn test_mismatched_lengths_are_rejected() {
        let loss = BinnedCrossEntropy::new(4);
        let p = Array1::zeros(8);
        let short = Array1::zeros(6);
        assert!(matches!(
            loss.compute(p.view(), short.view()),
            Err(A3cError::DimensionMismatch { .. })
        ));
        assert!(loss.gradient(p.view(), short.view()).is_err());

        // Same length, but not a whole number of cells
        let ragged = Array1::zeros(6);
        assert!(loss.compute(ragged.view(), ragged.view()).is_err());

        assert!(MeanSquaredError.gradient(p.view(), short.view()).is_err());
    }
}
