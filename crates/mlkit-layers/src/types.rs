//! Arguments shared by every element-wise layer

use mlkit_core::{
    check_tensor, check_tensor_like, typed_arguments, ArgId, ErrorDetail, ErrorKind, ErrorList, FloatElement,
    Parameter, Status, Tensor,
};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LayerMethod {
    #[default]
    DefaultDense,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerParameter {
    /// Backward stages do nothing when unset
    pub propagate_gradient: bool,
    /// Forward stages skip the auxiliary tensor when set
    pub prediction_stage: bool,
}

impl Default for LayerParameter {
    fn default() -> Self {
        Self {
            propagate_gradient: true,
            prediction_stage: false,
        }
    }
}

impl Parameter for LayerParameter {}

pub mod forward {
    use super::*;

    pub const DATA: ArgId<Tensor> = ArgId::new(0, "data");

    pub const VALUE: ArgId<Tensor> = ArgId::new(0, "value");
    /// Input or output of the forward stage, kept for the backward stage
    pub const AUX_DATA: ArgId<Tensor> = ArgId::new(1, "auxData");
}

pub mod backward {
    use super::*;

    pub const INPUT_GRADIENT: ArgId<Tensor> = ArgId::new(0, "inputGradient");
    pub const AUX_DATA: ArgId<Tensor> = ArgId::new(1, "auxData");

    pub const GRADIENT: ArgId<Tensor> = ArgId::new(0, "gradient");
}

typed_arguments! {
    pub struct ForwardInput { tag: 0x0005_0001, slots: 1 }
}

typed_arguments! {
    /// Layer output plus the auxiliary tensor of the backward stage
    pub struct ForwardResult { tag: 0x0005_0002, slots: 2 }
}

typed_arguments! {
    pub struct BackwardInput { tag: 0x0005_0003, slots: 2 }
}

typed_arguments! {
    pub struct BackwardResult { tag: 0x0005_0004, slots: 1 }
}

/// Present, at least one dimension, no empty dimension
pub(crate) fn check_non_empty(tensor: Option<&Tensor>, name: &str) -> Status {
    let tensor = tensor.ok_or_else(|| ErrorList::from(ErrorDetail::new(ErrorKind::NullTensor).with_argument(name)))?;
    if tensor.n_dimensions() == 0 {
        return Err(ErrorDetail::mismatch(ErrorKind::IncorrectNumberOfDimensionsInTensor, name, 1, 0).into());
    }
    check_tensor(Some(tensor), name, &vec![None; tensor.n_dimensions()])
}

pub(crate) fn allocate_like<T: FloatElement>(reference: &Tensor) -> Result<Arc<Tensor>, ErrorList> {
    Ok(Arc::new(Tensor::allocate::<T>(reference.dimensions())?))
}

impl ForwardInput {
    pub fn with_data(data: impl Into<Arc<Tensor>>) -> Self {
        let mut out = Self::new();
        out.set(forward::DATA, data);
        out
    }

    pub(crate) fn check(&self) -> Status {
        check_non_empty(self.tensor(forward::DATA), forward::DATA.name())
    }
}

impl ForwardResult {
    pub(crate) fn check(&self, input: &ForwardInput, parameter: &LayerParameter, aux_name: &str) -> Status {
        let data = input.require_tensor(forward::DATA)?;
        check_tensor_like(self.tensor(forward::VALUE), forward::VALUE.name(), data)?;
        if !parameter.prediction_stage {
            check_tensor_like(self.tensor(forward::AUX_DATA), aux_name, data)?;
        }
        Ok(())
    }

    /// Input of the backward stage for `input_gradient`
    pub fn backward_input(&self, input_gradient: impl Into<Arc<Tensor>>) -> Result<BackwardInput, ErrorList> {
        let aux = self
            .get(forward::AUX_DATA)
            .ok_or_else(|| ErrorDetail::new(ErrorKind::NullTensor).with_argument(forward::AUX_DATA.name()))?;
        Ok(BackwardInput::with_gradient(input_gradient, Arc::clone(aux)))
    }
}

impl BackwardInput {
    pub fn with_gradient(input_gradient: impl Into<Arc<Tensor>>, aux: impl Into<Arc<Tensor>>) -> Self {
        let mut out = Self::new();
        out.set(backward::INPUT_GRADIENT, input_gradient);
        out.set(backward::AUX_DATA, aux);
        out
    }

    pub(crate) fn check(&self, parameter: &LayerParameter, aux_name: &str) -> Status {
        if !parameter.propagate_gradient {
            return Ok(());
        }
        check_non_empty(self.tensor(backward::INPUT_GRADIENT), backward::INPUT_GRADIENT.name())?;
        let gradient = self.require_tensor(backward::INPUT_GRADIENT)?;
        check_tensor_like(self.tensor(backward::AUX_DATA), aux_name, gradient)
    }
}

impl BackwardResult {
    pub(crate) fn check(&self, input: &BackwardInput, parameter: &LayerParameter) -> Status {
        if !parameter.propagate_gradient {
            return Ok(());
        }
        let aux = input.require_tensor(backward::AUX_DATA)?;
        check_tensor_like(self.tensor(backward::GRADIENT), backward::GRADIENT.name(), aux)
    }
}
