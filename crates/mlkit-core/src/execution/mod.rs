//! Execution engines for kernel-internal parallelism
//!
//! An engine pairs a primitives backend with an execution strategy. Kernels
//! split their rows into fixed-size blocks and combine per-block results in
//! block order, so the output of a kernel does not depend on which engine or
//! how many threads ran it.
//!
//! Parallelism stays inside a kernel: the compute pipeline itself never forks.

use crate::numeric::FloatElement;
use crate::primitives::ComputePrimitives;
use std::marker::PhantomData;

/// Rows per block used by kernels that split work over rows
pub const DEFAULT_BLOCK_ROWS: usize = 256;

/// Execution strategy for batch operations
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionStrategy {
    /// Process items sequentially
    Sequential,
    /// Process items in parallel
    Parallel,
}

/// Primitives plus a strategy for running independent blocks of work
pub trait ExecutionEngine<T: FloatElement>: Clone + Send + Sync + std::fmt::Debug {
    /// The type of primitives used by this engine
    type Primitives: ComputePrimitives<T>;

    /// Get the primitives for low-level operations
    fn primitives(&self) -> &Self::Primitives;

    /// Map a function over chunks of data, results in chunk order
    fn map_chunks<'a, U, F, R>(&self, data: &'a [U], chunk_size: usize, f: F) -> Vec<R>
    where
        U: Sync,
        F: Fn(&'a [U]) -> R + Sync + Send,
        R: Send;

    /// Run `f(0..count)`, results in index order
    fn execute_batch<F, R>(&self, count: usize, f: F) -> Vec<R>
    where
        F: Fn(usize) -> R + Sync + Send,
        R: Send;

    /// Apply `f` to matching chunks of `data` and `out`
    fn zip_chunks_mut<F>(&self, data: &[T], out: &mut [T], chunk_size: usize, f: F)
    where
        F: Fn(&[T], &mut [T]) + Sync + Send;

    fn strategy(&self) -> ExecutionStrategy;

    /// Get the number of threads available
    fn num_threads(&self) -> usize;

    /// Name for logs: backend plus strategy
    fn describe(&self) -> String {
        format!("{}/{:?}", self.primitives().backend_name(), self.strategy()).to_lowercase()
    }
}

/// Sequential execution engine
///
/// Executes all operations sequentially in the current thread.
#[derive(Clone, Debug)]
pub struct SequentialEngine<T: FloatElement, P: ComputePrimitives<T>> {
    primitives: P,
    _phantom: PhantomData<fn() -> T>,
}

impl<T: FloatElement, P: ComputePrimitives<T>> SequentialEngine<T, P> {
    pub fn new(primitives: P) -> Self {
        Self {
            primitives,
            _phantom: PhantomData,
        }
    }
}

impl<T: FloatElement, P: ComputePrimitives<T>> ExecutionEngine<T> for SequentialEngine<T, P> {
    type Primitives = P;

    fn primitives(&self) -> &Self::Primitives {
        &self.primitives
    }

    fn map_chunks<'a, U, F, R>(&self, data: &'a [U], chunk_size: usize, f: F) -> Vec<R>
    where
        U: Sync,
        F: Fn(&'a [U]) -> R + Sync + Send,
        R: Send,
    {
        data.chunks(chunk_size.max(1)).map(f).collect()
    }

    fn execute_batch<F, R>(&self, count: usize, f: F) -> Vec<R>
    where
        F: Fn(usize) -> R + Sync + Send,
        R: Send,
    {
        (0..count).map(f).collect()
    }

    fn zip_chunks_mut<F>(&self, data: &[T], out: &mut [T], chunk_size: usize, f: F)
    where
        F: Fn(&[T], &mut [T]) + Sync + Send,
    {
        let chunk_size = chunk_size.max(1);
        for (src, dst) in data.chunks(chunk_size).zip(out.chunks_mut(chunk_size)) {
            f(src, dst);
        }
    }

    fn strategy(&self) -> ExecutionStrategy {
        ExecutionStrategy::Sequential
    }

    fn num_threads(&self) -> usize {
        1
    }
}

/// Parallel execution engine using Rayon
#[cfg(feature = "parallel")]
#[derive(Clone, Debug)]
pub struct ParallelEngine<T: FloatElement, P: ComputePrimitives<T>> {
    primitives: P,
    thread_pool: Option<std::sync::Arc<rayon::ThreadPool>>,
    _phantom: PhantomData<fn() -> T>,
}

#[cfg(feature = "parallel")]
impl<T: FloatElement, P: ComputePrimitives<T>> ParallelEngine<T, P> {
    /// Create a new parallel engine on the global thread pool
    pub fn new(primitives: P) -> Self {
        Self {
            primitives,
            thread_pool: None,
            _phantom: PhantomData,
        }
    }

    /// Create a new parallel engine with a custom thread pool
    pub fn with_thread_pool(primitives: P, pool: std::sync::Arc<rayon::ThreadPool>) -> Self {
        Self {
            primitives,
            thread_pool: Some(pool),
            _phantom: PhantomData,
        }
    }

    /// Create with a specific number of threads
    pub fn with_num_threads(primitives: P, num_threads: usize) -> crate::Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| crate::Error::Other(anyhow::anyhow!("failed to create thread pool: {e}")))?;

        Ok(Self::with_thread_pool(primitives, std::sync::Arc::new(pool)))
    }

    fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match &self.thread_pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}

#[cfg(feature = "parallel")]
impl<T: FloatElement, P: ComputePrimitives<T>> ExecutionEngine<T> for ParallelEngine<T, P> {
    type Primitives = P;

    fn primitives(&self) -> &Self::Primitives {
        &self.primitives
    }

    fn map_chunks<'a, U, F, R>(&self, data: &'a [U], chunk_size: usize, f: F) -> Vec<R>
    where
        U: Sync,
        F: Fn(&'a [U]) -> R + Sync + Send,
        R: Send,
    {
        use rayon::prelude::*;
        self.install(|| data.par_chunks(chunk_size.max(1)).map(f).collect())
    }

    fn execute_batch<F, R>(&self, count: usize, f: F) -> Vec<R>
    where
        F: Fn(usize) -> R + Sync + Send,
        R: Send,
    {
        use rayon::prelude::*;
        self.install(|| (0..count).into_par_iter().map(f).collect())
    }

    fn zip_chunks_mut<F>(&self, data: &[T], out: &mut [T], chunk_size: usize, f: F)
    where
        F: Fn(&[T], &mut [T]) + Sync + Send,
    {
        use rayon::prelude::*;
        let chunk_size = chunk_size.max(1);
        self.install(|| {
            data.par_chunks(chunk_size)
                .zip(out.par_chunks_mut(chunk_size))
                .for_each(|(src, dst)| f(src, dst))
        })
    }

    fn strategy(&self) -> ExecutionStrategy {
        ExecutionStrategy::Parallel
    }

    fn num_threads(&self) -> usize {
        match &self.thread_pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }
}

/// Engine kernels are built with: parallel when the feature is on
#[cfg(feature = "parallel")]
pub type DefaultEngine<T, P> = ParallelEngine<T, P>;

/// Engine kernels are built with: parallel when the feature is on
#[cfg(not(feature = "parallel"))]
pub type DefaultEngine<T, P> = SequentialEngine<T, P>;

/// Default engine around `primitives`
pub fn default_engine<T: FloatElement, P: ComputePrimitives<T>>(primitives: P) -> DefaultEngine<T, P> {
    DefaultEngine::new(primitives)
}

/// Create a sequential scalar engine
pub fn scalar_sequential<T: FloatElement>() -> SequentialEngine<T, crate::primitives::ScalarBackend> {
    SequentialEngine::new(crate::primitives::ScalarBackend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::ScalarBackend;

    #[test]
    fn test_sequential_engine() {
        let engine = scalar_sequential::<f64>();

        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let sums = engine.map_chunks(&data, 2, |chunk| chunk.iter().sum::<f64>());
        assert_eq!(sums, vec![3.0, 7.0, 11.0]);

        let squares = engine.execute_batch(5, |i| i * i);
        assert_eq!(squares, vec![0, 1, 4, 9, 16]);

        let mut out = vec![0.0; 6];
        engine.zip_chunks_mut(&data, &mut out, 4, |src, dst| {
            for (d, s) in dst.iter_mut().zip(src) {
                *d = s * 10.0;
            }
        });
        assert_eq!(out, vec![10.0, 20.0, 30.0, 40.0, 50.0, 60.0]);

        assert_eq!(engine.strategy(), ExecutionStrategy::Sequential);
        assert_eq!(engine.num_threads(), 1);
        assert_eq!(engine.describe(), "scalar/sequential");
    }

    #[test]
    fn test_default_engine_is_deterministic() {
        let engine = default_engine::<f64, _>(ScalarBackend);
        let data: Vec<f64> = (0..1000).map(|i| i as f64 * 0.1).collect();
        let a = engine.map_chunks(&data, 64, |c| engine.primitives().sum(c));
        let b = engine.map_chunks(&data, 64, |c| engine.primitives().sum(c));
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_matches_sequential() {
        let parallel = ParallelEngine::<f64, _>::with_num_threads(ScalarBackend, 4).unwrap();
        let sequential = scalar_sequential::<f64>();
        let data: Vec<f64> = (0..10_000).map(|i| (i as f64).sqrt()).collect();

        let p = parallel.map_chunks(&data, DEFAULT_BLOCK_ROWS, |c| parallel.primitives().sum(c));
        let s = sequential.map_chunks(&data, DEFAULT_BLOCK_ROWS, |c| sequential.primitives().sum(c));
        assert_eq!(p, s);
        assert_eq!(parallel.strategy(), ExecutionStrategy::Parallel);
        assert_eq!(parallel.num_threads(), 4);
    }
}
