//! Pipeline strategies of the moments algorithms
//!
//! | Stage | Mode | Input | Output |
//! |-------|------|-------|--------|
//! | [`LowOrderMoments`] | batch | data | moments |
//! | [`LowOrderMomentsOnline`] | online | data blocks | partial, then moments |
//! | [`MomentsStep1Local`] | distributed step 1 | data partition | partial |
//! | [`MomentsStep2Master`] | distributed step 2 | partials by block | partial, then moments |

use crate::kernel::moments_registry;
use crate::types::{input, MomentsInput, MomentsMasterInput, MomentsMethod, MomentsPartial, MomentsResult};
use mlkit_core::distributed::{check_consistent, downcast_all, require_partials};
use mlkit_core::{
    check_numeric_table, Algorithm, ArgumentRole, DistributedStep, ErrorDetail, ErrorKind, ErrorList, FloatElement,
    Kernel, KernelRegistry, OnlineAlgorithm, OnlineKernel, Status, TableSpec,
};
use std::marker::PhantomData;

fn check_data(input: &MomentsInput) -> Status {
    check_numeric_table(input.table(input::DATA), &TableSpec::new(input::DATA.name(), ArgumentRole::Input))
}

fn n_features(input: &MomentsInput) -> Result<usize, ErrorList> {
    Ok(input.require_table(input::DATA, ArgumentRole::Input)?.n_columns())
}

/// Moments of a whole data set in one call
pub struct LowOrderMoments<T>(PhantomData<fn() -> T>);

impl<T: FloatElement> Algorithm for LowOrderMoments<T> {
    type Input = MomentsInput;
    type Parameter = ();
    type Output = MomentsResult;
    type Method = MomentsMethod;

    const NAME: &'static str = "low_order_moments";

    fn kernels() -> KernelRegistry<MomentsMethod, dyn Kernel<Self>> {
        moments_registry!(Self::NAME, T, dyn Kernel<Self>)
    }

    fn check_input(input: &MomentsInput, _parameter: &()) -> Status {
        check_data(input)
    }

    fn allocate_result(input: &MomentsInput, _parameter: &()) -> Result<MomentsResult, ErrorList> {
        MomentsResult::allocate::<T>(n_features(input)?)
    }

    fn check_result(input: &MomentsInput, _parameter: &(), result: &MomentsResult) -> Status {
        result.check(n_features(input)?)
    }
}

/// Local step of a distributed computation: summarise one partition
pub struct MomentsStep1Local<T>(PhantomData<fn() -> T>);

impl<T: FloatElement> Algorithm for MomentsStep1Local<T> {
    type Input = MomentsInput;
    type Parameter = ();
    type Output = MomentsPartial;
    type Method = MomentsMethod;

    const NAME: &'static str = "low_order_moments";
    const STEP: Option<DistributedStep> = Some(DistributedStep::Step1Local);

    fn kernels() -> KernelRegistry<MomentsMethod, dyn Kernel<Self>> {
        moments_registry!(Self::NAME, T, dyn Kernel<Self>)
    }

    fn check_input(input: &MomentsInput, _parameter: &()) -> Status {
        check_data(input)
    }

    fn allocate_result(input: &MomentsInput, _parameter: &()) -> Result<MomentsPartial, ErrorList> {
        MomentsPartial::allocate::<T>(n_features(input)?)
    }

    fn check_result(input: &MomentsInput, _parameter: &(), result: &MomentsPartial) -> Status {
        result.check(Some(n_features(input)?))
    }
}

/// Moments accumulated over blocks of rows fed one call at a time
pub struct LowOrderMomentsOnline<T>(PhantomData<fn() -> T>);

impl<T: FloatElement> OnlineAlgorithm for LowOrderMomentsOnline<T> {
    type Input = MomentsInput;
    type Parameter = ();
    type PartialResult = MomentsPartial;
    type Output = MomentsResult;
    type Method = MomentsMethod;

    const NAME: &'static str = "low_order_moments";

    fn kernels() -> KernelRegistry<MomentsMethod, dyn OnlineKernel<Self>> {
        moments_registry!(Self::NAME, T, dyn OnlineKernel<Self>)
    }

    fn check_input(input: &MomentsInput, _parameter: &()) -> Status {
        check_data(input)
    }

    fn initialize_partial(input: &MomentsInput, _parameter: &()) -> Result<MomentsPartial, ErrorList> {
        MomentsPartial::allocate::<T>(n_features(input)?)
    }

    /// Every block must have as many features as the first one
    fn check_partial(input: &MomentsInput, _parameter: &(), partial: &MomentsPartial) -> Status {
        partial.check(Some(n_features(input)?))
    }

    fn allocate_result(partial: &MomentsPartial, _parameter: &()) -> Result<MomentsResult, ErrorList> {
        let p = partial
            .n_features()
            .ok_or_else(|| ErrorList::from(ErrorDetail::new(ErrorKind::NullPartialResult).with_argument("partialSum")))?;
        MomentsResult::allocate::<T>(p)
    }

    fn check_result(partial: &MomentsPartial, _parameter: &(), result: &MomentsResult) -> Status {
        partial.check(None)?;
        result.check(partial.n_features().unwrap_or_default())
    }
}

/// Master step: merge the partials of every block
///
/// Partials are merged in block order, so the moments do not depend on the
/// order the local steps finished in. Repeated calls keep merging into the
/// same accumulator.
pub struct MomentsStep2Master<T>(PhantomData<fn() -> T>);

impl<T: FloatElement> OnlineAlgorithm for MomentsStep2Master<T> {
    type Input = MomentsMasterInput;
    type Parameter = ();
    type PartialResult = MomentsPartial;
    type Output = MomentsResult;
    type Method = MomentsMethod;

    const NAME: &'static str = "low_order_moments";
    const STEP: Option<DistributedStep> = Some(DistributedStep::Step2Master);

    fn kernels() -> KernelRegistry<MomentsMethod, dyn OnlineKernel<Self>> {
        moments_registry!(Self::NAME, T, dyn OnlineKernel<Self>)
    }

    fn check_input(input: &MomentsMasterInput, _parameter: &()) -> Status {
        let collection = require_partials(input, input::PARTIAL_RESULTS)?;
        let partials = downcast_all::<MomentsPartial>(collection)?;
        for (_, partial) in &partials {
            partial.check(None)?;
        }
        check_consistent(
            "partialSum",
            ErrorKind::IncorrectNumberOfFeatures,
            partials
                .iter()
                .enumerate()
                .map(|(index, (_, partial))| (index, partial.n_features().unwrap_or_default())),
        )?;
        Ok(())
    }

    fn initialize_partial(input: &MomentsMasterInput, _parameter: &()) -> Result<MomentsPartial, ErrorList> {
        let collection = require_partials(input, input::PARTIAL_RESULTS)?;
        let p = downcast_all::<MomentsPartial>(collection)?
            .first()
            .and_then(|(_, partial)| partial.n_features())
            .ok_or_else(|| ErrorList::from(ErrorKind::IncorrectNumberOfInputNumericTables))?;
        MomentsPartial::allocate::<T>(p)
    }

    fn check_partial(input: &MomentsMasterInput, _parameter: &(), partial: &MomentsPartial) -> Status {
        let collection = require_partials(input, input::PARTIAL_RESULTS)?;
        let incoming = downcast_all::<MomentsPartial>(collection)?;
        let expected = partial.n_features();
        for (index, (_, entry)) in incoming.iter().enumerate() {
            if entry.n_features() != expected {
                return Err(ErrorDetail::mismatch(
                    ErrorKind::IncorrectNumberOfFeatures,
                    "partialSum",
                    expected.unwrap_or_default(),
                    entry.n_features().unwrap_or_default(),
                )
                .with_index(index)
                .into());
            }
        }
        partial.check(expected)
    }

    fn allocate_result(partial: &MomentsPartial, parameter: &()) -> Result<MomentsResult, ErrorList> {
        <LowOrderMomentsOnline<T> as OnlineAlgorithm>::allocate_result(partial, parameter)
    }

    fn check_result(partial: &MomentsPartial, parameter: &(), result: &MomentsResult) -> Status {
        <LowOrderMomentsOnline<T> as OnlineAlgorithm>::check_result(partial, parameter, result)
    }
}
