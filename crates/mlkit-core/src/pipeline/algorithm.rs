//! Algorithm strategy traits plugged into the pipeline

use crate::dispatch::KernelRegistry;
use crate::distributed::DistributedStep;
use crate::error::{ErrorList, Status};
use crate::kernels::{Kernel, OnlineKernel};
use std::fmt::Debug;

/// Plain configuration struct of an algorithm
pub trait Parameter: Clone + Debug + Default + Send {
    /// Pure, idempotent domain check
    fn check(&self) -> Status {
        Ok(())
    }
}

impl Parameter for () {}

/// Method selector of an algorithm
pub trait Method: Copy + Eq + Debug + Default + Send + Sync + 'static {}

impl<T> Method for T where T: Copy + Eq + Debug + Default + Send + Sync + 'static {}

/// Single-shot algorithm stage: Input -> Output
///
/// Implementors are type-level strategies; all state lives in the
/// [`Batch`](super::Batch) container and its kernel. Hooks with a default
/// body are optional stages.
pub trait Algorithm: Sized + 'static {
    type Input: Default + Debug + Send;
    type Parameter: Parameter;
    type Output: Debug + Send;
    type Method: Method;

    /// Name used in spans and kernel selection logs
    const NAME: &'static str;

    /// Step of a distributed computation this stage implements
    const STEP: Option<DistributedStep> = None;

    fn kernels() -> KernelRegistry<Self::Method, dyn Kernel<Self>>;

    /// Validate input against the (already checked) parameter
    fn check_input(input: &Self::Input, parameter: &Self::Parameter) -> Status;

    /// Build input-side bookkeeping before the result is sized
    fn allocate_input(_input: &mut Self::Input, _parameter: &Self::Parameter) -> Status {
        Ok(())
    }

    /// Allocate a result sized from input and parameter
    fn allocate_result(input: &Self::Input, parameter: &Self::Parameter) -> Result<Self::Output, ErrorList>;

    /// Validate a freshly allocated result
    fn check_result(_input: &Self::Input, _parameter: &Self::Parameter, _result: &Self::Output) -> Status {
        Ok(())
    }

    /// Last hook before the kernel runs
    fn setup_compute(_input: &Self::Input, _parameter: &Self::Parameter, _result: &mut Self::Output) -> Status {
        Ok(())
    }
}

/// Accumulating algorithm stage: Input* -> PartialResult -> Output
pub trait OnlineAlgorithm: Sized + 'static {
    type Input: Default + Debug + Send;
    type Parameter: Parameter;
    type PartialResult: Clone + Debug + Send;
    type Output: Debug + Send;
    type Method: Method;

    const NAME: &'static str;

    const STEP: Option<DistributedStep> = None;

    fn kernels() -> KernelRegistry<Self::Method, dyn OnlineKernel<Self>>;

    fn check_input(input: &Self::Input, parameter: &Self::Parameter) -> Status;

    /// Empty accumulator, sized from the first input block
    fn initialize_partial(input: &Self::Input, parameter: &Self::Parameter) -> Result<Self::PartialResult, ErrorList>;

    /// Validate an existing accumulator against a new input block
    fn check_partial(_input: &Self::Input, _parameter: &Self::Parameter, _partial: &Self::PartialResult) -> Status {
        Ok(())
    }

    fn allocate_result(partial: &Self::PartialResult, parameter: &Self::Parameter) -> Result<Self::Output, ErrorList>;

    fn check_result(_partial: &Self::PartialResult, _parameter: &Self::Parameter, _result: &Self::Output) -> Status {
        Ok(())
    }
}
