// Crate-internal test suite
pub mod test_activations;

use crate::layers::Parameterized;

const FD_EPSILON: f32 = 1e-2;

/// Compare analytic gradients against central finite differences of `loss` for the flat
/// parameter indices in `indices`.
pub(crate) fn check_parameter_gradients<M, F, I>(model: &M, analytic: &[f32], loss: F, indices: I)
where
    M: Parameterized + Clone,
    F: Fn(&M) -> f32,
    I: IntoIterator<Item = usize>,
{
    check_parameter_gradients_with(FD_EPSILON, model, analytic, loss, indices)
}

/// Same as [`check_parameter_gradients`] with an explicit step, for piecewise-linear losses.
pub(crate) fn check_parameter_gradients_with<M, F, I>(
    epsilon: f32,
    model: &M,
    analytic: &[f32],
    loss: F,
    indices: I,
) where
    M: Parameterized + Clone,
    F: Fn(&M) -> f32,
    I: IntoIterator<Item = usize>,
{
    let base = model.flatten();
    assert_eq!(base.len(), analytic.len());
    for i in indices {
        let mut values = base.clone();
        values[i] = base[i] + epsilon;
        let mut plus = model.clone();
        plus.load_flat(&values).unwrap();
        values[i] = base[i] - epsilon;
        let mut minus = model.clone();
        minus.load_flat(&values).unwrap();

        let numeric = (loss(&plus) - loss(&minus)) / (2.0 * epsilon);
        assert_close(numeric, analytic[i], &format!("parameter {}", i));
    }
}

pub(crate) fn assert_close(numeric: f32, analytic: f32, what: &str) {
    let tolerance = 1e-2 * numeric.abs().max(analytic.abs()) + 2e-3;
    assert!(
        (numeric - analytic).abs() <= tolerance,
        "{}: numeric {} vs analytic {}",
        what,
        numeric,
        analytic
    );
}

/// Every index when small, otherwise an even spread of `count` indices
pub(crate) fn sample_indices(len: usize, count: usize) -> Vec<usize> {
    if len <= count {
        return (0..len).collect();
    }
    let stride = len / count;
    (0..count).map(|k| k * stride + (k % stride.max(1))).filter(|&i| i < len).collect()
}
