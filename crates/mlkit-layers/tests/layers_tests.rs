use approx::assert_relative_eq;
use mlkit_core::serialization::{restore, save};
use mlkit_core::{Algorithm, Batch, ErrorKind, Tensor};
use mlkit_layers::{
    backward, forward, Abs, Activation, AuxSource, Backward, BackwardInput, Forward, ForwardInput, ForwardResult,
    LayerParameter, Logistic, LogisticForward, Relu, ReluBackward, ReluForward, SmoothRelu, Tanh, TanhBackward,
};
use proptest::prelude::*;
use std::sync::Arc;

const DIMS: [usize; 3] = [2, 3, 2];

fn sample() -> Tensor {
    let values = (0..12).map(|i| (i as f64 - 5.5) * 0.4).collect();
    Tensor::from_vec(&DIMS, values).unwrap()
}

fn run_forward<L: Activation>(data: Tensor, parameter: LayerParameter) -> ForwardResult {
    let mut layer = Batch::<Forward<L, f64>>::with_parameter(parameter);
    *layer.input_mut() = ForwardInput::with_data(data);
    layer.compute().unwrap()
}

fn read(tensor: Option<&Tensor>) -> Vec<f64> {
    tensor.unwrap().read::<f64>().into_owned()
}

fn check_forward<L: Activation>() {
    let data = sample();
    let x = data.read::<f64>().into_owned();
    let out = run_forward::<L>(data, LayerParameter::default());

    let value = read(out.tensor(forward::VALUE));
    assert_eq!(out.tensor(forward::VALUE).unwrap().dimensions(), &DIMS);
    for (y, &x) in value.iter().zip(&x) {
        assert_eq!(*y, L::value(x));
    }
    let expected_aux = match L::AUX {
        AuxSource::Input => x,
        AuxSource::Value => value,
    };
    assert_eq!(read(out.tensor(forward::AUX_DATA)), expected_aux);
}

#[test]
fn test_forward_values() {
    check_forward::<Abs>();
    check_forward::<Relu>();
    check_forward::<Logistic>();
    check_forward::<Tanh>();
    check_forward::<SmoothRelu>();
}

/// Backward of `sum(weights * f(x))` against central differences
fn check_backward<L: Activation>() {
    let data = sample();
    let x = data.read::<f64>().into_owned();
    let weights: Vec<f64> = (0..12).map(|i| 1.0 + i as f64 * 0.1).collect();

    let out = run_forward::<L>(data, LayerParameter::default());
    let mut layer = Batch::<Backward<L, f64>>::new();
    *layer.input_mut() = out.backward_input(Tensor::from_vec(&DIMS, weights.clone()).unwrap()).unwrap();
    let gradient = read(layer.compute().unwrap().tensor(backward::GRADIENT));

    let h = 1e-6;
    for i in 0..x.len() {
        let numeric = weights[i] * (L::value(x[i] + h) - L::value(x[i] - h)) / (2.0 * h);
        assert_relative_eq!(gradient[i], numeric, epsilon = 1e-6);
    }
}

#[test]
fn test_backward_gradients() {
    check_backward::<Abs>();
    check_backward::<Relu>();
    check_backward::<Logistic>();
    check_backward::<Tanh>();
    check_backward::<SmoothRelu>();
}

#[test]
fn test_prediction_stage_skips_aux() {
    let parameter = LayerParameter {
        prediction_stage: true,
        ..LayerParameter::default()
    };
    let out = run_forward::<Tanh>(sample(), parameter);
    assert!(out.tensor(forward::VALUE).is_some());
    assert!(out.tensor(forward::AUX_DATA).is_none());

    let errors = out.backward_input(sample()).unwrap_err();
    assert!(errors.contains(ErrorKind::NullTensor));
}

#[test]
fn test_gradient_propagation_disabled() {
    let mut layer = Batch::<TanhBackward<f64>>::with_parameter(LayerParameter {
        propagate_gradient: false,
        ..LayerParameter::default()
    });
    let out = layer.compute().unwrap();
    assert!(out.tensor(backward::GRADIENT).is_none());
}

#[test]
fn test_forward_input_checks() {
    let mut layer = Batch::<ReluForward<f64>>::new();
    let errors = layer.compute_no_throw().errors().clone();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.first().unwrap().kind, ErrorKind::NullTensor);
    assert_eq!(errors.first().unwrap().argument.as_deref(), Some("data"));

    *layer.input_mut() = ForwardInput::with_data(Tensor::allocate::<f64>(&[3, 0, 2]).unwrap());
    let errors = layer.compute_no_throw().errors().clone();
    let detail = errors.first().unwrap();
    assert_eq!(detail.kind, ErrorKind::IncorrectSizeOfDimensionInTensor);
    assert_eq!(detail.index, Some(1));

    *layer.input_mut() = ForwardInput::with_data(Tensor::allocate::<f64>(&[]).unwrap());
    let errors = layer.compute_no_throw().errors().clone();
    assert_eq!(errors.first().unwrap().kind, ErrorKind::IncorrectNumberOfDimensionsInTensor);
}

#[test]
fn test_backward_input_checks() {
    let gradient = Arc::new(sample());
    let mut layer = Batch::<ReluBackward<f64>>::new();

    *layer.input_mut() = BackwardInput::with_gradient(Arc::clone(&gradient), Tensor::allocate::<f64>(&[2, 6]).unwrap());
    let errors = layer.compute_no_throw().errors().clone();
    let detail = errors.first().unwrap();
    assert_eq!(detail.kind, ErrorKind::IncorrectNumberOfDimensionsInTensor);
    assert_eq!(detail.argument.as_deref(), Some("auxData"));
    assert_eq!((detail.expected, detail.actual), (Some(3), Some(2)));

    *layer.input_mut() = BackwardInput::with_gradient(Arc::clone(&gradient), Tensor::allocate::<f64>(&[2, 3, 3]).unwrap());
    let errors = layer.compute_no_throw().errors().clone();
    let detail = errors.first().unwrap();
    assert_eq!(detail.kind, ErrorKind::IncorrectSizeOfDimensionInTensor);
    assert_eq!((detail.expected, detail.actual, detail.index), (Some(2), Some(3), Some(2)));

    let mut logistic = Batch::<Backward<Logistic, f64>>::new();
    logistic.input_mut().set(backward::INPUT_GRADIENT, gradient);
    let errors = logistic.compute_no_throw().errors().clone();
    assert_eq!(errors.first().unwrap().kind, ErrorKind::NullTensor);
    assert_eq!(errors.first().unwrap().argument.as_deref(), Some("auxValue"));
}

#[test]
fn test_result_check_dimensions() {
    let input = ForwardInput::with_data(sample());
    let mut result = ForwardResult::new();
    result.set(forward::VALUE, Tensor::allocate::<f64>(&DIMS).unwrap());
    result.set(forward::AUX_DATA, Tensor::allocate::<f64>(&[2, 3, 1]).unwrap());

    let errors =
        <ReluForward<f64> as Algorithm>::check_result(&input, &LayerParameter::default(), &result).unwrap_err();
    assert_eq!(errors.first().unwrap().kind, ErrorKind::IncorrectSizeOfDimensionInTensor);
}

#[test]
fn test_single_precision_data() {
    let data = Tensor::from_vec(&[4], vec![-2.0f32, -0.5, 0.5, 2.0]).unwrap();
    let mut layer = Batch::<LogisticForward<f64>>::new();
    *layer.input_mut() = ForwardInput::with_data(data);
    let out = layer.compute().unwrap();
    let value = read(out.tensor(forward::VALUE));
    assert_relative_eq!(value[0] + value[3], 1.0, epsilon = 1e-12);
    assert_relative_eq!(value[1] + value[2], 1.0, epsilon = 1e-12);
}

#[test]
fn test_forward_result_round_trip() {
    let out = run_forward::<SmoothRelu>(sample(), LayerParameter::default());
    let restored: ForwardResult = restore(&save(&out).unwrap()).unwrap();
    assert_eq!(read(restored.tensor(forward::AUX_DATA)), read(out.tensor(forward::AUX_DATA)));
}

proptest! {
    #[test]
    fn logistic_gradient_is_bounded(values in prop::collection::vec(-30.0f64..30.0, 1..64)) {
        let n = values.len();
        let out = run_forward::<Logistic>(Tensor::from_vec(&[n], values).unwrap(), LayerParameter::default());
        let mut layer = Batch::<Backward<Logistic, f64>>::new();
        *layer.input_mut() = out.backward_input(Tensor::from_vec(&[n], vec![1.0f64; n]).unwrap()).unwrap();
        let gradient = read(layer.compute().unwrap().tensor(backward::GRADIENT));
        prop_assert!(gradient.iter().all(|&g| (0.0..=0.25).contains(&g)));
    }
}
