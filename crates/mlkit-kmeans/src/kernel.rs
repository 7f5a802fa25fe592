//! Lloyd kernels
//!
//! Rows are assigned in blocks of [`DEFAULT_BLOCK_ROWS`] on the execution
//! engine and the block statistics are merged in block order, so results do
//! not depend on the number of threads.

use crate::algorithms::{KMeansBatch, KMeansStep1Local, KMeansStep2Master};
use crate::assign::{self, AssignInput, AssignResult, KMeansAssign};
use crate::clusters::{write_table, ClusterStats};
use crate::types::{input, model, result, KMeansInput, KMeansMasterInput, KMeansParameter, KMeansPartial, KMeansResult};
use mlkit_core::distributed::downcast_all;
use mlkit_core::{
    default_engine, kernel_name, ArgumentRole, DefaultEngine, ErrorKind, ErrorList, ExecutionEngine, FloatElement,
    Kernel, NumericTable, OnlineKernel, ScalarBackend, Status, DEFAULT_BLOCK_ROWS,
};
use num_traits::Float;
use std::marker::PhantomData;
use tracing::{debug, trace};

/// Kernel running Lloyd steps on engine `E`
#[derive(Debug, Clone)]
pub struct LloydKernel<T: FloatElement, E: ExecutionEngine<T>> {
    engine: E,
    _phantom: PhantomData<fn() -> T>,
}

pub type ScalarLloydKernel<T> = LloydKernel<T, DefaultEngine<T, ScalarBackend>>;

#[cfg(all(target_arch = "x86_64", feature = "avx2"))]
pub type Avx2LloydKernel<T> = LloydKernel<T, DefaultEngine<T, mlkit_core::Avx2Backend>>;

impl<T: FloatElement> ScalarLloydKernel<T> {
    pub fn scalar() -> Self {
        Self::new(default_engine(ScalarBackend))
    }
}

#[cfg(all(target_arch = "x86_64", feature = "avx2"))]
impl<T: FloatElement> Avx2LloydKernel<T> {
    /// `None` unless the running CPU supports AVX2 and FMA
    pub fn avx2() -> Option<Self> {
        mlkit_core::Avx2Backend::try_new().map(|backend| Self::new(default_engine(backend)))
    }
}

/// Registry with the scalar kernel, plus the AVX2 one when compiled in
macro_rules! lloyd_registry {
    ($name:expr, $t:ty, $kernel:ty) => {{
        use mlkit_core::{CpuLevel, KernelRegistry};

        let registry = KernelRegistry::new($name).register($crate::KMeansMethod::LloydDense, CpuLevel::Baseline, || {
            Some(Box::new($crate::kernel::ScalarLloydKernel::<$t>::scalar()) as Box<$kernel>)
        });

        #[cfg(all(target_arch = "x86_64", feature = "avx2"))]
        let registry = registry.register($crate::KMeansMethod::LloydDense, CpuLevel::Avx2, || {
            $crate::kernel::Avx2LloydKernel::<$t>::avx2().map(|kernel| Box::new(kernel) as Box<$kernel>)
        });

        registry
    }};
}

pub(crate) use lloyd_registry;

fn read_table<T: FloatElement>(table: &NumericTable) -> Result<Vec<T>, ErrorList> {
    Ok(table.read_all::<T>()?.into_owned())
}

impl<T: FloatElement, E: ExecutionEngine<T>> LloydKernel<T, E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            _phantom: PhantomData,
        }
    }

    fn label(&self) -> String {
        kernel_name("kmeans", &self.engine.describe())
    }

    /// Assign every row of `data` to the nearest of `centroids`
    pub(crate) fn assign(
        &self,
        data: &NumericTable,
        centroids: &[T],
        keep_assignments: bool,
    ) -> Result<ClusterStats<T>, ErrorList> {
        let p = data.n_columns();
        let values = data.read_all::<T>()?;
        let primitives = self.engine.primitives();

        let blocks = self.engine.map_chunks(&values[..], DEFAULT_BLOCK_ROWS * p, |block| {
            ClusterStats::from_block(block, p, centroids, primitives, keep_assignments)
        });

        let mut stats = ClusterStats::empty(centroids.len() / p.max(1), p);
        for block in blocks {
            stats.merge(block);
        }
        Ok(stats)
    }

    /// Lloyd iterations from `centroids`, returning the final centroids and the iteration count
    fn iterate(
        &self,
        data: &NumericTable,
        mut centroids: Vec<T>,
        parameter: &KMeansParameter,
    ) -> Result<(Vec<T>, usize), ErrorList> {
        let threshold = T::from_f64(parameter.accuracy_threshold);
        let mut previous: Option<T> = None;
        let mut iterations = 0;

        while iterations < parameter.max_iterations {
            let stats = self.assign(data, &centroids, false)?;
            centroids = stats.centroids(Some(&centroids))?;
            iterations += 1;
            trace!(iteration = iterations, objective = stats.objective.as_f64(), "lloyd step");

            if previous.is_some_and(|prev| Float::abs(prev - stats.objective) < threshold) {
                break;
            }
            previous = Some(stats.objective);
        }
        Ok((centroids, iterations))
    }
}

impl<T: FloatElement, E: ExecutionEngine<T> + 'static> Kernel<KMeansBatch<T>> for LloydKernel<T, E> {
    fn name(&self) -> String {
        self.label()
    }

    fn compute(&mut self, input: &KMeansInput, parameter: &KMeansParameter, out: &mut KMeansResult) -> Status {
        let data = input.require_table(input::DATA, ArgumentRole::Input)?;
        let start = read_table::<T>(input.require_table(input::INPUT_CENTROIDS, ArgumentRole::Input)?)?;

        let (centroids, iterations) = self.iterate(data, start, parameter)?;
        let last = self.assign(data, &centroids, parameter.assign_flag)?;
        debug!(iterations, objective = last.objective.as_f64(), "kmeans finished");

        write_table(out, result::CENTROIDS, &centroids)?;
        write_table(out, result::OBJECTIVE_FUNCTION, &[last.objective])?;
        write_table(out, result::N_ITERATIONS, &[iterations as i32])?;
        if parameter.assign_flag {
            write_table(out, result::ASSIGNMENTS, &last.assignments)?;
        }
        Ok(())
    }
}

impl<T: FloatElement, E: ExecutionEngine<T> + 'static> Kernel<KMeansStep1Local<T>> for LloydKernel<T, E> {
    fn name(&self) -> String {
        self.label()
    }

    fn compute(&mut self, input: &KMeansInput, parameter: &KMeansParameter, partial: &mut KMeansPartial) -> Status {
        let data = input.require_table(input::DATA, ArgumentRole::Input)?;
        let centroids = read_table::<T>(input.require_table(input::INPUT_CENTROIDS, ArgumentRole::Input)?)?;
        self.assign(data, &centroids, parameter.assign_flag)?.write(partial)
    }
}

impl<T: FloatElement, E: ExecutionEngine<T> + 'static> OnlineKernel<KMeansStep2Master<T>> for LloydKernel<T, E> {
    fn name(&self) -> String {
        self.label()
    }

    fn compute(&mut self, input: &KMeansMasterInput, _parameter: &KMeansParameter, partial: &mut KMeansPartial) -> Status {
        let collection = input.require(input::PARTIAL_RESULTS, ErrorKind::NullInputDataCollection)?;
        let mut stats = ClusterStats::<T>::read(partial)?;
        for (block, local) in downcast_all::<KMeansPartial>(collection)? {
            trace!(block, "merging partial result");
            stats.merge(ClusterStats::read(&local)?);
        }
        stats.write(partial)
    }

    fn finalize(&mut self, partial: &KMeansPartial, _parameter: &KMeansParameter, out: &mut KMeansResult) -> Status {
        let stats = ClusterStats::<T>::read(partial)?;
        write_table(out, result::CENTROIDS, &stats.centroids(None)?)?;
        write_table(out, result::OBJECTIVE_FUNCTION, &[stats.objective])
    }
}

impl<T: FloatElement, E: ExecutionEngine<T> + 'static> Kernel<KMeansAssign<T>> for LloydKernel<T, E> {
    fn name(&self) -> String {
        kernel_name("kmeans_assign", &self.engine.describe())
    }

    fn compute(&mut self, input: &AssignInput, _parameter: &(), out: &mut AssignResult) -> Status {
        let data = input.require_table(assign::DATA, ArgumentRole::Input)?;
        let trained = input.require(assign::MODEL, ErrorKind::NullModel)?;
        let centroids = trained
            .table(model::CENTROIDS)
            .ok_or_else(|| ErrorList::from(ErrorKind::NullModel))
            .and_then(read_table::<T>)?;

        let stats = self.assign(data, &centroids, true)?;
        write_table(out, assign::ASSIGNMENTS, &stats.assignments)?;
        write_table(out, assign::OBJECTIVE_FUNCTION, &[stats.objective])
    }
}
