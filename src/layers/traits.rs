use ndarray::linalg::general_mat_mul;
use ndarray::{Array, Array2, ArrayView1, ArrayViewD, ArrayViewMutD, Axis, Dimension};
use rand::Rng;

use crate::error::{A3cError, Result};

/// Trait giving uniform access to the trainable tensors of a layer or model.
///
/// The visitation order of `parameters` and `parameters_mut` must be identical; it defines
/// the flat layout shared by the model, its gradients and the shared parameter store.
pub trait Parameterized {
    /// Views of every trainable tensor in a fixed order
    fn parameters(&self) -> Vec<ArrayViewD<'_, f32>>;

    /// Mutable views of every trainable tensor, same order as `parameters`
    fn parameters_mut(&mut self) -> Vec<ArrayViewMutD<'_, f32>>;

    /// Total number of scalar parameters
    fn num_parameters(&self) -> usize {
        self.parameters().iter().map(|p| p.len()).sum()
    }

    /// Copy all parameters into one flat vector
    fn flatten(&self) -> Vec<f32> {
        let mut flat = Vec::with_capacity(self.num_parameters());
        for param in self.parameters() {
            flat.extend(param.iter().copied());
        }
        flat
    }

    /// Overwrite all parameters from a flat vector produced by `flatten`
    fn load_flat(&mut self, values: &[f32]) -> Result<()> {
        let expected = self.num_parameters();
        if values.len() != expected {
            return Err(A3cError::dimension_mismatch(
                format!("{} parameters", expected),
                format!("{} parameters", values.len()),
            ));
        }

        let mut offset = 0;
        for mut param in self.parameters_mut() {
            let n = param.len();
            param
                .iter_mut()
                .zip(&values[offset..offset + n])
                .for_each(|(p, &v)| *p = v);
            offset += n;
        }
        Ok(())
    }

    /// Set every parameter to zero (used for gradient accumulators)
    fn fill_zero(&mut self) {
        for mut param in self.parameters_mut() {
            param.fill(0.0);
        }
    }
}

impl<D: Dimension> Parameterized for Array<f32, D> {
    fn parameters(&self) -> Vec<ArrayViewD<'_, f32>> {
        vec![self.view().into_dyn()]
    }

    fn parameters_mut(&mut self) -> Vec<ArrayViewMutD<'_, f32>> {
        vec![self.view_mut().into_dyn()]
    }
}

impl<T: Parameterized> Parameterized for Option<T> {
    fn parameters(&self) -> Vec<ArrayViewD<'_, f32>> {
        match self {
            Some(inner) => inner.parameters(),
            None => Vec::new(),
        }
    }

    fn parameters_mut(&mut self) -> Vec<ArrayViewMutD<'_, f32>> {
        match self {
            Some(inner) => inner.parameters_mut(),
            None => Vec::new(),
        }
    }
}

/// Layers that know how to initialize their own parameters.
pub trait Initializable {
    fn initialize<R: Rng + ?Sized>(&mut self, rng: &mut R);
}

/// `target += left ⊗ right`
pub(crate) fn add_outer(target: &mut Array2<f32>, left: ArrayView1<f32>, right: ArrayView1<f32>) {
    let column = left.insert_axis(Axis(1));
    let row = right.insert_axis(Axis(0));
    general_mat_mul(1.0, &column, &row, 1.0, target);
}
