//! Moments kernels
//!
//! One kernel type serves every moments stage. It splits the data into
//! blocks of [`DEFAULT_BLOCK_ROWS`] rows, summarises each block on the
//! execution engine and merges the summaries in block order.

use crate::algorithms::{LowOrderMoments, LowOrderMomentsOnline, MomentsStep1Local, MomentsStep2Master};
use crate::stats::ColumnStats;
use crate::types::{input, MomentsInput, MomentsMasterInput, MomentsMethod, MomentsPartial, MomentsResult};
use mlkit_core::distributed::downcast_all;
use mlkit_core::{
    default_engine, kernel_name, ArgumentRole, DefaultEngine, ErrorList, ExecutionEngine, FloatElement, Kernel,
    OnlineKernel, ScalarBackend, Status, DEFAULT_BLOCK_ROWS,
};
use std::marker::PhantomData;
use tracing::trace;

/// Kernel computing moments with engine `E`
#[derive(Debug, Clone)]
pub struct MomentsKernel<T: FloatElement, E: ExecutionEngine<T>> {
    engine: E,
    method: MomentsMethod,
    _phantom: PhantomData<fn() -> T>,
}

pub type ScalarMomentsKernel<T> = MomentsKernel<T, DefaultEngine<T, ScalarBackend>>;

#[cfg(all(target_arch = "x86_64", feature = "avx2"))]
pub type Avx2MomentsKernel<T> = MomentsKernel<T, DefaultEngine<T, mlkit_core::Avx2Backend>>;

impl<T: FloatElement, E: ExecutionEngine<T>> MomentsKernel<T, E> {
    pub fn new(engine: E, method: MomentsMethod) -> Self {
        Self {
            engine,
            method,
            _phantom: PhantomData,
        }
    }

    pub fn method(&self) -> MomentsMethod {
        self.method
    }

    fn label(&self) -> String {
        kernel_name("low_order_moments", &self.engine.describe())
    }

    /// Summary of every row of `input`
    fn summarise(&self, input: &MomentsInput) -> Result<ColumnStats<T>, ErrorList> {
        let data = input.require_table(input::DATA, ArgumentRole::Input)?;
        let p = data.n_columns();
        let values = data.read_all::<T>()?;

        let primitives = self.engine.primitives();
        let method = self.method;
        let blocks = self
            .engine
            .map_chunks(&values[..], DEFAULT_BLOCK_ROWS * p, |block| {
                ColumnStats::from_block(block, p, method, primitives)
            });
        trace!(blocks = blocks.len(), rows = data.n_rows(), "summarised blocks");

        let mut stats = ColumnStats::empty(p);
        for block in &blocks {
            stats.merge(block);
        }
        Ok(stats)
    }

    /// Merge every partial of a master input into `stats`, in block order
    fn merge_partials(&self, input: &MomentsMasterInput, stats: &mut ColumnStats<T>) -> Status {
        let collection = input.require(input::PARTIAL_RESULTS, mlkit_core::ErrorKind::NullInputDataCollection)?;
        for (block, partial) in downcast_all::<MomentsPartial>(collection)? {
            let incoming = ColumnStats::<T>::read(&partial)?;
            trace!(block, n = incoming.n, "merging partial result");
            stats.merge(&incoming);
        }
        Ok(())
    }
}

impl<T: FloatElement> ScalarMomentsKernel<T> {
    pub fn scalar(method: MomentsMethod) -> Self {
        Self::new(default_engine(ScalarBackend), method)
    }
}

#[cfg(all(target_arch = "x86_64", feature = "avx2"))]
impl<T: FloatElement> Avx2MomentsKernel<T> {
    /// `None` unless the running CPU supports AVX2 and FMA
    pub fn avx2(method: MomentsMethod) -> Option<Self> {
        mlkit_core::Avx2Backend::try_new().map(|backend| Self::new(default_engine(backend), method))
    }
}

/// Registry with a scalar kernel for each method, plus AVX2 ones when compiled in
macro_rules! moments_registry {
    ($name:expr, $t:ty, $kernel:ty) => {{
        use mlkit_core::{CpuLevel, KernelRegistry};
        use $crate::kernel::ScalarMomentsKernel;
        use $crate::types::MomentsMethod;

        let registry = KernelRegistry::new($name)
            .register(MomentsMethod::DefaultDense, CpuLevel::Baseline, || {
                Some(Box::new(ScalarMomentsKernel::<$t>::scalar(MomentsMethod::DefaultDense)) as Box<$kernel>)
            })
            .register(MomentsMethod::SinglePassDense, CpuLevel::Baseline, || {
                Some(Box::new(ScalarMomentsKernel::<$t>::scalar(MomentsMethod::SinglePassDense)) as Box<$kernel>)
            });

        #[cfg(all(target_arch = "x86_64", feature = "avx2"))]
        let registry = registry
            .register(MomentsMethod::DefaultDense, CpuLevel::Avx2, || {
                $crate::kernel::Avx2MomentsKernel::<$t>::avx2(MomentsMethod::DefaultDense)
                    .map(|kernel| Box::new(kernel) as Box<$kernel>)
            })
            .register(MomentsMethod::SinglePassDense, CpuLevel::Avx2, || {
                $crate::kernel::Avx2MomentsKernel::<$t>::avx2(MomentsMethod::SinglePassDense)
                    .map(|kernel| Box::new(kernel) as Box<$kernel>)
            });

        registry
    }};
}

pub(crate) use moments_registry;

impl<T: FloatElement, E: ExecutionEngine<T> + 'static> Kernel<LowOrderMoments<T>> for MomentsKernel<T, E> {
    fn name(&self) -> String {
        self.label()
    }

    fn compute(&mut self, input: &MomentsInput, _parameter: &(), result: &mut MomentsResult) -> Status {
        self.summarise(input)?.finalize(result)
    }
}

impl<T: FloatElement, E: ExecutionEngine<T> + 'static> Kernel<MomentsStep1Local<T>> for MomentsKernel<T, E> {
    fn name(&self) -> String {
        self.label()
    }

    fn compute(&mut self, input: &MomentsInput, _parameter: &(), partial: &mut MomentsPartial) -> Status {
        self.summarise(input)?.write(partial)
    }
}

impl<T: FloatElement, E: ExecutionEngine<T> + 'static> OnlineKernel<LowOrderMomentsOnline<T>> for MomentsKernel<T, E> {
    fn name(&self) -> String {
        self.label()
    }

    fn compute(&mut self, input: &MomentsInput, _parameter: &(), partial: &mut MomentsPartial) -> Status {
        let mut stats = ColumnStats::<T>::read(partial)?;
        stats.merge(&self.summarise(input)?);
        stats.write(partial)
    }

    fn finalize(&mut self, partial: &MomentsPartial, _parameter: &(), result: &mut MomentsResult) -> Status {
        ColumnStats::<T>::read(partial)?.finalize(result)
    }
}

impl<T: FloatElement, E: ExecutionEngine<T> + 'static> OnlineKernel<MomentsStep2Master<T>> for MomentsKernel<T, E> {
    fn name(&self) -> String {
        self.label()
    }

    fn compute(&mut self, input: &MomentsMasterInput, _parameter: &(), partial: &mut MomentsPartial) -> Status {
        let mut stats = ColumnStats::<T>::read(partial)?;
        self.merge_partials(input, &mut stats)?;
        stats.write(partial)
    }

    fn finalize(&mut self, partial: &MomentsPartial, _parameter: &(), result: &mut MomentsResult) -> Status {
        ColumnStats::<T>::read(partial)?.finalize(result)
    }
}
