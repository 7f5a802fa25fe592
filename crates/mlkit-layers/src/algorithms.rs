//! Forward and backward stages of an element-wise layer

use crate::activation::{Abs, Activation, Logistic, Relu, SmoothRelu, Tanh};
use crate::kernel::ScalarActivationKernel;
use crate::types::{
    allocate_like, backward, forward, BackwardInput, BackwardResult, ForwardInput, ForwardResult, LayerMethod,
    LayerParameter,
};
use mlkit_core::{Algorithm, CpuLevel, ErrorList, FloatElement, Kernel, KernelRegistry, Status};
use std::marker::PhantomData;

/// `value = f(data)`, keeping what the backward stage needs
pub struct Forward<L, T>(PhantomData<fn() -> (L, T)>);

impl<L: Activation, T: FloatElement> Algorithm for Forward<L, T> {
    type Input = ForwardInput;
    type Parameter = LayerParameter;
    type Output = ForwardResult;
    type Method = LayerMethod;

    const NAME: &'static str = L::NAME;

    fn kernels() -> KernelRegistry<LayerMethod, dyn Kernel<Self>> {
        KernelRegistry::new(Self::NAME).register(LayerMethod::DefaultDense, CpuLevel::Baseline, || {
            Some(Box::new(ScalarActivationKernel::<L, T>::scalar()) as Box<dyn Kernel<Self>>)
        })
    }

    fn check_input(input: &ForwardInput, _parameter: &LayerParameter) -> Status {
        input.check()
    }

    fn allocate_result(input: &ForwardInput, parameter: &LayerParameter) -> Result<ForwardResult, ErrorList> {
        let data = input.require_tensor(forward::DATA)?;
        let mut out = ForwardResult::new();
        out.set(forward::VALUE, allocate_like::<T>(data)?);
        if !parameter.prediction_stage {
            out.set(forward::AUX_DATA, allocate_like::<T>(data)?);
        }
        Ok(out)
    }

    fn check_result(input: &ForwardInput, parameter: &LayerParameter, result: &ForwardResult) -> Status {
        result.check(input, parameter, L::aux_name())
    }
}

/// `gradient = inputGradient * f'(.)`, elementwise
pub struct Backward<L, T>(PhantomData<fn() -> (L, T)>);

impl<L: Activation, T: FloatElement> Algorithm for Backward<L, T> {
    type Input = BackwardInput;
    type Parameter = LayerParameter;
    type Output = BackwardResult;
    type Method = LayerMethod;

    const NAME: &'static str = L::NAME;

    fn kernels() -> KernelRegistry<LayerMethod, dyn Kernel<Self>> {
        KernelRegistry::new(Self::NAME).register(LayerMethod::DefaultDense, CpuLevel::Baseline, || {
            Some(Box::new(ScalarActivationKernel::<L, T>::scalar()) as Box<dyn Kernel<Self>>)
        })
    }

    fn check_input(input: &BackwardInput, parameter: &LayerParameter) -> Status {
        input.check(parameter, L::aux_name())
    }

    fn allocate_result(input: &BackwardInput, parameter: &LayerParameter) -> Result<BackwardResult, ErrorList> {
        let mut out = BackwardResult::new();
        if parameter.propagate_gradient {
            let gradient = input.require_tensor(backward::INPUT_GRADIENT)?;
            out.set(backward::GRADIENT, allocate_like::<T>(gradient)?);
        }
        Ok(out)
    }

    fn check_result(input: &BackwardInput, parameter: &LayerParameter, result: &BackwardResult) -> Status {
        result.check(input, parameter)
    }
}

pub type AbsForward<T> = Forward<Abs, T>;
pub type AbsBackward<T> = Backward<Abs, T>;
pub type ReluForward<T> = Forward<Relu, T>;
pub type ReluBackward<T> = Backward<Relu, T>;
pub type LogisticForward<T> = Forward<Logistic, T>;
pub type LogisticBackward<T> = Backward<Logistic, T>;
pub type TanhForward<T> = Forward<Tanh, T>;
pub type TanhBackward<T> = Backward<Tanh, T>;
pub type SmoothReluForward<T> = Forward<SmoothRelu, T>;
pub type SmoothReluBackward<T> = Backward<SmoothRelu, T>;
