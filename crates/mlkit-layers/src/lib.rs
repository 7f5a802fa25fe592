//! Element-wise neural network layers
//!
//! Each activation in [`activation`] gets a [`Forward`] stage computing the
//! layer value and a [`Backward`] stage turning the gradient of the next
//! layer into the gradient with respect to this layer's input. The forward
//! stage stores an auxiliary tensor (its input or its output, depending on
//! the activation) that the backward stage consumes.
//!
//! # Example
//!
//! ```rust
//! use mlkit_core::{Batch, Tensor};
//! use mlkit_layers::{backward, forward, ReluBackward, ReluForward, ForwardInput};
//!
//! let data = Tensor::from_vec(&[2, 2], vec![-1.0f64, 2.0, 3.0, -4.0]).unwrap();
//!
//! let mut relu = Batch::<ReluForward<f64>>::new();
//! *relu.input_mut() = ForwardInput::with_data(data);
//! let out = relu.compute().unwrap();
//! assert_eq!(out.tensor(forward::VALUE).unwrap().read::<f64>().as_ref(), &[0.0, 2.0, 3.0, 0.0]);
//!
//! let mut grad = Batch::<ReluBackward<f64>>::new();
//! *grad.input_mut() = out.backward_input(Tensor::from_vec(&[2, 2], vec![1.0f64; 4]).unwrap()).unwrap();
//! let gradient = grad.compute().unwrap();
//! assert_eq!(gradient.tensor(backward::GRADIENT).unwrap().read::<f64>().as_ref(), &[0.0, 1.0, 1.0, 0.0]);
//! ```

pub mod activation;
mod algorithms;
mod kernel;
mod types;

pub use activation::{Abs, Activation, AuxSource, Logistic, Relu, SmoothRelu, Tanh};
pub use algorithms::{
    AbsBackward, AbsForward, Backward, Forward, LogisticBackward, LogisticForward, ReluBackward, ReluForward,
    SmoothReluBackward, SmoothReluForward, TanhBackward, TanhForward,
};
pub use kernel::{ActivationKernel, ScalarActivationKernel};
pub use types::{
    backward, forward, BackwardInput, BackwardResult, ForwardInput, ForwardResult, LayerMethod, LayerParameter,
};
