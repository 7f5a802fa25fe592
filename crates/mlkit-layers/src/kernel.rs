//! Element-wise layer kernels

use crate::activation::{Activation, AuxSource};
use crate::algorithms::{Backward, Forward};
use crate::types::{backward, forward, BackwardInput, BackwardResult, ForwardInput, ForwardResult, LayerParameter};
use mlkit_core::{
    default_engine, kernel_name, ArgId, ArgumentCollection, DefaultEngine, ErrorDetail, ErrorKind, ErrorList,
    ExecutionEngine, FloatElement, Kernel, ScalarBackend, Status, Tensor, DEFAULT_BLOCK_ROWS,
};
use std::marker::PhantomData;
use tracing::trace;

/// Elements handled per block on the execution engine
const BLOCK_ELEMENTS: usize = DEFAULT_BLOCK_ROWS * 16;

/// Kernel applying activation `L` on engine `E`
#[derive(Debug, Clone)]
pub struct ActivationKernel<L, T: FloatElement, E: ExecutionEngine<T>> {
    engine: E,
    _phantom: PhantomData<fn() -> (L, T)>,
}

pub type ScalarActivationKernel<L, T> = ActivationKernel<L, T, DefaultEngine<T, ScalarBackend>>;

impl<L: Activation, T: FloatElement, E: ExecutionEngine<T>> ActivationKernel<L, T, E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            _phantom: PhantomData,
        }
    }

    fn label(&self, stage: &str) -> String {
        kernel_name(&format!("{}_{stage}", L::NAME), &self.engine.describe())
    }
}

impl<L: Activation, T: FloatElement> ScalarActivationKernel<L, T> {
    pub fn scalar() -> Self {
        Self::new(default_engine(ScalarBackend))
    }
}

fn tensor_mut(arguments: &mut ArgumentCollection, id: ArgId<Tensor>) -> Result<&mut Tensor, ErrorList> {
    arguments
        .get_mut(id)
        .ok_or_else(|| ErrorDetail::new(ErrorKind::NullTensor).with_argument(id.name()).into())
}

impl<L: Activation, T: FloatElement, E: ExecutionEngine<T> + 'static> Kernel<Forward<L, T>> for ActivationKernel<L, T, E> {
    fn name(&self) -> String {
        self.label("forward")
    }

    fn compute(&mut self, input: &ForwardInput, parameter: &LayerParameter, out: &mut ForwardResult) -> Status {
        let data = input.require_tensor(forward::DATA)?.read::<T>();

        let value = tensor_mut(out, forward::VALUE)?.values_mut::<T>()?;
        self.engine.zip_chunks_mut(&data, value, BLOCK_ELEMENTS, |src, dst| {
            for (y, &x) in dst.iter_mut().zip(src) {
                *y = L::value(x);
            }
        });

        if parameter.prediction_stage {
            return Ok(());
        }
        let aux = match L::AUX {
            AuxSource::Input => data.into_owned(),
            AuxSource::Value => out.require_tensor(forward::VALUE)?.read::<T>().into_owned(),
        };
        trace!(elements = aux.len(), source = ?L::AUX, "storing auxiliary tensor");
        tensor_mut(out, forward::AUX_DATA)?.write(&aux)
    }
}

impl<L: Activation, T: FloatElement, E: ExecutionEngine<T> + 'static> Kernel<Backward<L, T>> for ActivationKernel<L, T, E> {
    fn name(&self) -> String {
        self.label("backward")
    }

    fn compute(&mut self, input: &BackwardInput, parameter: &LayerParameter, out: &mut BackwardResult) -> Status {
        if !parameter.propagate_gradient {
            trace!("gradient propagation disabled");
            return Ok(());
        }
        let input_gradient = input.require_tensor(backward::INPUT_GRADIENT)?.read::<T>();
        let aux = input.require_tensor(backward::AUX_DATA)?.read::<T>();

        let gradient = tensor_mut(out, backward::GRADIENT)?;
        gradient.write(&input_gradient)?;
        self.engine
            .zip_chunks_mut(&aux, gradient.values_mut::<T>()?, BLOCK_ELEMENTS, |aux, dst| {
                for (g, &a) in dst.iter_mut().zip(aux) {
                    *g = *g * L::derivative(a);
                }
            });
        Ok(())
    }
}
