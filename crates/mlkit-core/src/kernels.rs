//! Kernel traits
//!
//! A kernel is the numerical strategy behind one algorithm method. The
//! pipeline validates and allocates; the kernel only fills the result.
//! Kernels are built once per algorithm container and reused across calls,
//! so they must not carry state between calls except explicit accumulation.

use crate::error::Status;
use crate::pipeline::{Algorithm, OnlineAlgorithm};

/// Kernel of a single-shot (batch-shaped) algorithm stage
pub trait Kernel<A: Algorithm>: Send {
    /// Name of this kernel for logs, including the backend
    fn name(&self) -> String;

    /// Fill `result` from validated input
    fn compute(&mut self, input: &A::Input, parameter: &A::Parameter, result: &mut A::Output) -> Status;

    /// Drop any state left by the last call
    fn reset(&mut self) {}
}

/// Kernel of an accumulating algorithm stage
pub trait OnlineKernel<A: OnlineAlgorithm>: Send {
    fn name(&self) -> String;

    /// Fold one block of input into `partial`
    fn compute(&mut self, input: &A::Input, parameter: &A::Parameter, partial: &mut A::PartialResult) -> Status;

    /// Produce the final result from everything accumulated
    fn finalize(&mut self, partial: &A::PartialResult, parameter: &A::Parameter, result: &mut A::Output) -> Status;

    fn reset(&mut self) {}
}

/// Kernel name in the `<algorithm>/<backend>` form used in logs
pub fn kernel_name(algorithm: &str, backend: &str) -> String {
    format!("{algorithm}/{backend}")
}
