//! Pipeline strategies of Lloyd's k-means
//!
//! The batch stage iterates to convergence. The distributed form splits one
//! iteration: [`KMeansStep1Local`] assigns a partition against the current
//! centroids and [`KMeansStep2Master`] merges the partitions into new
//! centroids. Callers loop over the two steps themselves.

use crate::kernel::lloyd_registry;
use crate::types::{
    input, partial, KMeansInput, KMeansMasterInput, KMeansMethod, KMeansParameter, KMeansPartial, KMeansResult,
};
use mlkit_core::distributed::{check_consistent, downcast_all, require_partials};
use mlkit_core::{
    check_numeric_table, Algorithm, ArgumentRole, DistributedStep, ErrorDetail, ErrorKind, ErrorList, FloatElement,
    Kernel, KernelRegistry, OnlineAlgorithm, OnlineKernel, Status, TableSpec,
};
use std::marker::PhantomData;

/// Clustering of a whole data set
pub struct KMeansBatch<T>(PhantomData<fn() -> T>);

impl<T: FloatElement> Algorithm for KMeansBatch<T> {
    type Input = KMeansInput;
    type Parameter = KMeansParameter;
    type Output = KMeansResult;
    type Method = KMeansMethod;

    const NAME: &'static str = "kmeans";

    fn kernels() -> KernelRegistry<KMeansMethod, dyn Kernel<Self>> {
        lloyd_registry!(Self::NAME, T, dyn Kernel<Self>)
    }

    fn check_input(input: &KMeansInput, parameter: &KMeansParameter) -> Status {
        input.check(parameter)
    }

    fn allocate_result(input: &KMeansInput, parameter: &KMeansParameter) -> Result<KMeansResult, ErrorList> {
        KMeansResult::allocate::<T>(parameter, input.n_features()?, Some(input.n_rows()?))
    }

    fn check_result(input: &KMeansInput, parameter: &KMeansParameter, result: &KMeansResult) -> Status {
        result.check(input, parameter)
    }
}

/// One assignment pass over a local partition
pub struct KMeansStep1Local<T>(PhantomData<fn() -> T>);

impl<T: FloatElement> Algorithm for KMeansStep1Local<T> {
    type Input = KMeansInput;
    type Parameter = KMeansParameter;
    type Output = KMeansPartial;
    type Method = KMeansMethod;

    const NAME: &'static str = "kmeans";
    const STEP: Option<DistributedStep> = Some(DistributedStep::Step1Local);

    fn kernels() -> KernelRegistry<KMeansMethod, dyn Kernel<Self>> {
        lloyd_registry!(Self::NAME, T, dyn Kernel<Self>)
    }

    fn check_input(input: &KMeansInput, parameter: &KMeansParameter) -> Status {
        input.check(parameter)
    }

    fn allocate_result(input: &KMeansInput, parameter: &KMeansParameter) -> Result<KMeansPartial, ErrorList> {
        let assignments = if parameter.assign_flag {
            Some(input.n_rows()?)
        } else {
            None
        };
        KMeansPartial::allocate::<T>(parameter.n_clusters, input.n_features()?, assignments)
    }

    fn check_result(input: &KMeansInput, parameter: &KMeansParameter, result: &KMeansPartial) -> Status {
        result.check(parameter.n_clusters, Some(input.n_features()?))?;
        if parameter.assign_flag {
            check_numeric_table(
                result.table(partial::PARTIAL_ASSIGNMENTS),
                &TableSpec::new(partial::PARTIAL_ASSIGNMENTS.name(), ArgumentRole::PartialResult)
                    .rows(input.n_rows()?)
                    .columns(1),
            )?;
        }
        Ok(())
    }
}

/// Merge of the local partitions into new centroids
///
/// Several calls may be made before finalizing, each adding more
/// partitions of the same iteration.
pub struct KMeansStep2Master<T>(PhantomData<fn() -> T>);

impl<T: FloatElement> KMeansStep2Master<T> {
    fn partials(input: &KMeansMasterInput) -> Result<Vec<KMeansPartial>, ErrorList> {
        let collection = require_partials(input, input::PARTIAL_RESULTS)?;
        Ok(downcast_all::<KMeansPartial>(collection)?.into_iter().map(|(_, p)| p).collect())
    }
}

impl<T: FloatElement> OnlineAlgorithm for KMeansStep2Master<T> {
    type Input = KMeansMasterInput;
    type Parameter = KMeansParameter;
    type PartialResult = KMeansPartial;
    type Output = KMeansResult;
    type Method = KMeansMethod;

    const NAME: &'static str = "kmeans";
    const STEP: Option<DistributedStep> = Some(DistributedStep::Step2Master);

    fn kernels() -> KernelRegistry<KMeansMethod, dyn OnlineKernel<Self>> {
        lloyd_registry!(Self::NAME, T, dyn OnlineKernel<Self>)
    }

    fn check_input(input: &KMeansMasterInput, parameter: &KMeansParameter) -> Status {
        let partials = Self::partials(input)?;
        for local in &partials {
            local.check(parameter.n_clusters, None)?;
        }
        check_consistent(
            partial::PARTIAL_SUMS.name(),
            ErrorKind::IncorrectNumberOfFeatures,
            partials
                .iter()
                .enumerate()
                .map(|(index, local)| (index, local.n_features().unwrap_or_default())),
        )?;
        Ok(())
    }

    fn initialize_partial(input: &KMeansMasterInput, parameter: &KMeansParameter) -> Result<KMeansPartial, ErrorList> {
        let p = Self::partials(input)?
            .first()
            .and_then(KMeansPartial::n_features)
            .ok_or_else(|| ErrorList::from(ErrorKind::IncorrectNumberOfInputNumericTables))?;
        KMeansPartial::allocate::<T>(parameter.n_clusters, p, None)
    }

    fn check_partial(input: &KMeansMasterInput, parameter: &KMeansParameter, accumulated: &KMeansPartial) -> Status {
        let expected = accumulated.n_features();
        for (index, local) in Self::partials(input)?.iter().enumerate() {
            if local.n_features() != expected {
                return Err(ErrorDetail::mismatch(
                    ErrorKind::IncorrectNumberOfFeatures,
                    partial::PARTIAL_SUMS.name(),
                    expected.unwrap_or_default(),
                    local.n_features().unwrap_or_default(),
                )
                .with_index(index)
                .into());
            }
        }
        accumulated.check(parameter.n_clusters, expected)
    }

    fn allocate_result(accumulated: &KMeansPartial, parameter: &KMeansParameter) -> Result<KMeansResult, ErrorList> {
        let p = accumulated
            .n_features()
            .ok_or_else(|| ErrorDetail::new(ErrorKind::NullPartialResult).with_argument(partial::PARTIAL_SUMS.name()))?;
        KMeansResult::allocate::<T>(parameter, p, None)
    }

    fn check_result(accumulated: &KMeansPartial, parameter: &KMeansParameter, result: &KMeansResult) -> Status {
        result.check_centroids(parameter, accumulated.n_features().unwrap_or_default())
    }
}
