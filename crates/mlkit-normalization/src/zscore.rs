//! Z-score normalization
//!
//! Columns are centered on their mean and divided by their sample standard
//! deviation. Columns with zero deviation become all zeros.

use crate::scaling::{
    allocate_normalized, check_data, check_normalized, moments_of, rescale, row, shape, shared_data, ColumnScaling,
};
use mlkit_core::{
    default_engine, kernel_name, typed_arguments, Algorithm, ArgId, CpuLevel, DefaultEngine, ErrorList,
    ExecutionEngine, FloatElement, Kernel, KernelRegistry, NumericTable, ScalarBackend, Status, DEFAULT_BLOCK_ROWS,
};
use mlkit_moments::{result as moments, MomentsMethod};
use num_traits::Float;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ZScoreMethod {
    /// Mean and deviation from a nested moments computation
    #[default]
    DefaultDense,
    /// Mean and deviation from running column sums and sums of squares
    SumDense,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZScoreParameter {
    /// Method of the nested moments computation, unused by `SumDense`
    pub moments_method: MomentsMethod,
}

impl mlkit_core::Parameter for ZScoreParameter {}

pub const DATA: ArgId<NumericTable> = ArgId::new(0, "data");
pub const NORMALIZED_DATA: ArgId<NumericTable> = ArgId::new(0, "normalizedData");

typed_arguments! {
    pub struct ZScoreInput { tag: 0x0004_0003, slots: 1 }
}

typed_arguments! {
    pub struct ZScoreResult { tag: 0x0004_0004, slots: 1 }
}

impl ZScoreInput {
    pub fn with_data(data: impl Into<Arc<NumericTable>>) -> Self {
        let mut out = Self::new();
        out.set(DATA, data);
        out
    }
}

pub struct ZScore<T>(PhantomData<fn() -> T>);

impl<T: FloatElement> Algorithm for ZScore<T> {
    type Input = ZScoreInput;
    type Parameter = ZScoreParameter;
    type Output = ZScoreResult;
    type Method = ZScoreMethod;

    const NAME: &'static str = "zscore";

    fn kernels() -> KernelRegistry<ZScoreMethod, dyn Kernel<Self>> {
        KernelRegistry::new(Self::NAME)
            .register(ZScoreMethod::DefaultDense, CpuLevel::Baseline, || {
                Some(Box::new(ScalarZScoreKernel::<T>::scalar(ZScoreMethod::DefaultDense)) as Box<dyn Kernel<Self>>)
            })
            .register(ZScoreMethod::SumDense, CpuLevel::Baseline, || {
                Some(Box::new(ScalarZScoreKernel::<T>::scalar(ZScoreMethod::SumDense)) as Box<dyn Kernel<Self>>)
            })
    }

    fn check_input(input: &ZScoreInput, _parameter: &ZScoreParameter) -> Status {
        check_data(input, DATA)
    }

    fn allocate_result(input: &ZScoreInput, _parameter: &ZScoreParameter) -> Result<ZScoreResult, ErrorList> {
        let mut out = ZScoreResult::new();
        allocate_normalized::<T>(&mut out, NORMALIZED_DATA, shape(input, DATA)?)?;
        Ok(out)
    }

    fn check_result(input: &ZScoreInput, _parameter: &ZScoreParameter, result: &ZScoreResult) -> Status {
        check_normalized(result, NORMALIZED_DATA, shape(input, DATA)?)
    }
}

#[derive(Debug, Clone)]
pub struct ZScoreKernel<T: FloatElement, E: ExecutionEngine<T>> {
    engine: E,
    method: ZScoreMethod,
    _phantom: PhantomData<fn() -> T>,
}

pub type ScalarZScoreKernel<T> = ZScoreKernel<T, DefaultEngine<T, ScalarBackend>>;

impl<T: FloatElement> ScalarZScoreKernel<T> {
    pub fn scalar(method: ZScoreMethod) -> Self {
        Self::new(default_engine(ScalarBackend), method)
    }
}

impl<T: FloatElement, E: ExecutionEngine<T>> ZScoreKernel<T, E> {
    pub fn new(engine: E, method: ZScoreMethod) -> Self {
        Self {
            engine,
            method,
            _phantom: PhantomData,
        }
    }

    /// Mean and sample standard deviation per column from column sums
    fn from_sums(&self, data: &NumericTable) -> Result<(Vec<T>, Vec<T>), ErrorList> {
        let p = data.n_columns();
        let values = data.read_all::<T>()?;
        let blocks = self.engine.map_chunks(&values[..], DEFAULT_BLOCK_ROWS * p.max(1), |block| {
            let mut sums = vec![T::zero(); p];
            let mut squares = vec![T::zero(); p];
            for observation in block.chunks_exact(p.max(1)) {
                for (j, &x) in observation.iter().enumerate() {
                    sums[j] += x;
                    squares[j] += x * x;
                }
            }
            (sums, squares)
        });

        let mut sums = vec![T::zero(); p];
        let mut squares = vec![T::zero(); p];
        for (block_sums, block_squares) in blocks {
            for j in 0..p {
                sums[j] += block_sums[j];
                squares[j] += block_squares[j];
            }
        }

        let n = T::from_f64(data.n_rows() as f64);
        let denominator = T::from_f64(data.n_rows().saturating_sub(1) as f64);
        let mean: Vec<T> = sums.iter().map(|&s| s / n).collect();
        let deviation = sums
            .iter()
            .zip(&squares)
            .map(|(&s, &q)| {
                if denominator > T::zero() {
                    Float::sqrt(Float::max((q - s * s / n) / denominator, T::zero()))
                } else {
                    T::zero()
                }
            })
            .collect();
        Ok((mean, deviation))
    }
}

impl<T: FloatElement, E: ExecutionEngine<T> + 'static> Kernel<ZScore<T>> for ZScoreKernel<T, E> {
    fn name(&self) -> String {
        kernel_name("zscore", &self.engine.describe())
    }

    fn compute(&mut self, input: &ZScoreInput, parameter: &ZScoreParameter, out: &mut ZScoreResult) -> Status {
        let data = shared_data(input, DATA)?;
        let (mean, deviation) = match self.method {
            ZScoreMethod::DefaultDense => {
                let stats = moments_of::<T>(data, parameter.moments_method)?;
                (row::<T>(&stats, moments::MEAN)?, row::<T>(&stats, moments::STANDARD_DEVIATION)?)
            }
            ZScoreMethod::SumDense => self.from_sums(data)?,
        };
        debug!(method = ?self.method, features = mean.len(), "standardizing");
        rescale(&self.engine, &ColumnScaling::standard(&mean, &deviation), data, out, NORMALIZED_DATA)
    }
}
