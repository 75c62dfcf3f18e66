use ndarray::array;
use crate::activations::{Activation, SELU_ALPHA, SELU_SCALE};

#[test]
fn test_selu_activation() {
    let mut input = array![1.0, 0.0, -1.0];
    Activation::Selu.apply(&mut input);
    assert!((input[0] - SELU_SCALE).abs() < 1e-6);
    assert_eq!(input[1], 0.0);
    let expected = SELU_SCALE * SELU_ALPHA * ((-1.0f32).exp() - 1.0);
    assert!((input[2] - expected).abs() < 1e-6);
}

#[test]
fn test_sigmoid_activation() {
    let mut input = array![0.0];
    Activation::Sigmoid.apply(&mut input);
    assert!((input[0] - 0.5).abs() < 1e-6);
}

#[test]
fn test_tanh_activation() {
    let mut input = array![0.0];
    Activation::Tanh.apply(&mut input);
    assert_eq!(input[0], 0.0);
}

#[test]
fn test_linear_is_identity() {
    let mut input = array![-3.0, 2.5];
    Activation::Linear.apply(&mut input);
    assert_eq!(input, array![-3.0, 2.5]);
    assert_eq!(Activation::Linear.derivative(&input), array![1.0, 1.0]);
}

#[test]
fn test_derivatives_match_finite_differences() {
    let eps = 1e-3;
    for activation in [Activation::Selu, Activation::Sigmoid, Activation::Tanh] {
        for &x in &[-2.0f32, -0.5, 0.3, 1.7] {
            let numeric = (activation.scalar(x + eps) - activation.scalar(x - eps)) / (2.0 * eps);
            let analytic = activation.scalar_derivative(x);
            assert!(
                (numeric - analytic).abs() < 1e-2,
                "{:?} at {}: {} vs {}",
                activation,
                x,
                numeric,
                analytic
            );
        }
    }
}
