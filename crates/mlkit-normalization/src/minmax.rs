//! Min-max normalization
//!
//! Every column is mapped linearly from its observed `[min, max]` onto
//! `[lower_bound, upper_bound]`. The column extremes come from a nested
//! low order moments computation.

use crate::scaling::{
    allocate_normalized, check_data, check_normalized, moments_of, rescale, row, shape, shared_data, ColumnScaling,
};
use mlkit_core::{
    check_bounds, default_engine, kernel_name, typed_arguments, Algorithm, ArgId, CpuLevel, DefaultEngine,
    ExecutionEngine, FloatElement, Kernel, KernelRegistry, NumericTable, Parameter, ScalarBackend, Status,
};
use mlkit_moments::{result as moments, MomentsMethod};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MinMaxMethod {
    #[default]
    DefaultDense,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MinMaxParameter {
    pub lower_bound: f64,
    pub upper_bound: f64,
    /// Method of the nested moments computation
    pub moments_method: MomentsMethod,
}

impl MinMaxParameter {
    pub fn new(lower_bound: f64, upper_bound: f64) -> Self {
        Self {
            lower_bound,
            upper_bound,
            ..Self::default()
        }
    }
}

impl Default for MinMaxParameter {
    fn default() -> Self {
        Self {
            lower_bound: 0.0,
            upper_bound: 1.0,
            moments_method: MomentsMethod::DefaultDense,
        }
    }
}

impl Parameter for MinMaxParameter {
    fn check(&self) -> Status {
        check_bounds(self.lower_bound, self.upper_bound)
    }
}

pub const DATA: ArgId<NumericTable> = ArgId::new(0, "data");
pub const NORMALIZED_DATA: ArgId<NumericTable> = ArgId::new(0, "normalizedData");

typed_arguments! {
    pub struct MinMaxInput { tag: 0x0004_0001, slots: 1 }
}

typed_arguments! {
    pub struct MinMaxResult { tag: 0x0004_0002, slots: 1 }
}

impl MinMaxInput {
    pub fn with_data(data: impl Into<Arc<NumericTable>>) -> Self {
        let mut out = Self::new();
        out.set(DATA, data);
        out
    }
}

pub struct MinMax<T>(PhantomData<fn() -> T>);

impl<T: FloatElement> Algorithm for MinMax<T> {
    type Input = MinMaxInput;
    type Parameter = MinMaxParameter;
    type Output = MinMaxResult;
    type Method = MinMaxMethod;

    const NAME: &'static str = "minmax";

    fn kernels() -> KernelRegistry<MinMaxMethod, dyn Kernel<Self>> {
        KernelRegistry::new(Self::NAME).register(MinMaxMethod::DefaultDense, CpuLevel::Baseline, || {
            Some(Box::new(ScalarMinMaxKernel::<T>::scalar()) as Box<dyn Kernel<Self>>)
        })
    }

    fn check_input(input: &MinMaxInput, _parameter: &MinMaxParameter) -> Status {
        check_data(input, DATA)
    }

    fn allocate_result(input: &MinMaxInput, _parameter: &MinMaxParameter) -> Result<MinMaxResult, mlkit_core::ErrorList> {
        let mut out = MinMaxResult::new();
        allocate_normalized::<T>(&mut out, NORMALIZED_DATA, shape(input, DATA)?)?;
        Ok(out)
    }

    fn check_result(input: &MinMaxInput, _parameter: &MinMaxParameter, result: &MinMaxResult) -> Status {
        check_normalized(result, NORMALIZED_DATA, shape(input, DATA)?)
    }
}

#[derive(Debug, Clone)]
pub struct MinMaxKernel<T: FloatElement, E: ExecutionEngine<T>> {
    engine: E,
    _phantom: PhantomData<fn() -> T>,
}

pub type ScalarMinMaxKernel<T> = MinMaxKernel<T, DefaultEngine<T, ScalarBackend>>;

impl<T: FloatElement, E: ExecutionEngine<T>> MinMaxKernel<T, E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            _phantom: PhantomData,
        }
    }
}

impl<T: FloatElement> ScalarMinMaxKernel<T> {
    pub fn scalar() -> Self {
        Self::new(default_engine(ScalarBackend))
    }
}

impl<T: FloatElement, E: ExecutionEngine<T> + 'static> Kernel<MinMax<T>> for MinMaxKernel<T, E> {
    fn name(&self) -> String {
        kernel_name("minmax", &self.engine.describe())
    }

    fn compute(&mut self, input: &MinMaxInput, parameter: &MinMaxParameter, out: &mut MinMaxResult) -> Status {
        let data = shared_data(input, DATA)?;
        let stats = moments_of::<T>(data, parameter.moments_method)?;
        let scaling = ColumnScaling::min_max(
            &row::<T>(&stats, moments::MINIMUM)?,
            &row::<T>(&stats, moments::MAXIMUM)?,
            T::from_f64(parameter.lower_bound),
            T::from_f64(parameter.upper_bound),
        );
        debug!(features = scaling.n_features(), "rescaling to bounds");
        rescale(&self.engine, &scaling, data, out, NORMALIZED_DATA)
    }
}
