//! Initial centroids for k-means
//!
//! Both methods pick `k` rows of the data set by global row index: the
//! first `k` rows, or a uniform sample drawn from a seeded ChaCha engine.
//! Selected rows are kept in row order. In the distributed form every local
//! step knows its `offset` in a data set of `n_rows_total` rows, draws the
//! same sample and keeps the rows that fall in its partition; the master
//! step concatenates the partial clusters in block order.

use crate::clusters::write_table;
use mlkit_core::distributed::{check_total, downcast_all, require_partials};
use mlkit_core::{
    allocate_table, check_at_least, check_numeric_table, kernel_name, typed_arguments, Algorithm, ArgId, ArgumentRole,
    CpuLevel, DistributedStep, ErrorDetail, ErrorKind, ErrorList, FloatElement, KeyedCollection, Kernel,
    KernelRegistry, LayoutMask, NumericTable, Parameter, Status, TableSpec,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::marker::PhantomData;
use std::ops::Range;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InitMethod {
    /// The first `k` rows
    #[default]
    DefaultDense,
    /// `k` distinct rows drawn uniformly at random
    RandomDense,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InitParameter {
    pub n_clusters: usize,
    /// Rows in the whole data set; 0 means the local data is everything
    pub n_rows_total: usize,
    /// Global index of the first local row
    pub offset: usize,
    pub seed: u64,
}

impl InitParameter {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            ..Self::default()
        }
    }

    /// Parameter of the local step for the partition starting at `offset`
    pub fn for_partition(n_clusters: usize, n_rows_total: usize, offset: usize) -> Self {
        Self {
            n_clusters,
            n_rows_total,
            offset,
            ..Self::default()
        }
    }

    fn total_rows(&self, local_rows: usize) -> usize {
        if self.n_rows_total == 0 {
            local_rows
        } else {
            self.n_rows_total
        }
    }

    /// Global indices of a partition of `local_rows` rows
    fn local_range(&self, local_rows: usize) -> Result<Range<usize>, ErrorList> {
        let total = self.total_rows(local_rows);
        match self.offset.checked_add(local_rows) {
            Some(end) if end <= total => Ok(self.offset..end),
            end => Err(ErrorDetail::new(ErrorKind::IncorrectParameter)
                .with_argument("offset")
                .with_message(match end {
                    Some(end) => format!("rows {}..{end} exceed nRowsTotal {total}", self.offset),
                    None => format!("offset {} overflows with {local_rows} local rows", self.offset),
                })
                .into()),
        }
    }
}

impl Default for InitParameter {
    fn default() -> Self {
        Self {
            n_clusters: 1,
            n_rows_total: 0,
            offset: 0,
            seed: 777,
        }
    }
}

impl Parameter for InitParameter {
    fn check(&self) -> Status {
        check_at_least("nClusters", self.n_clusters, 1)
    }
}

pub const DATA: ArgId<NumericTable> = ArgId::new(0, "data");
pub const PARTIAL_RESULTS: ArgId<KeyedCollection> = ArgId::new(0, "partialResults");
pub const CENTROIDS: ArgId<NumericTable> = ArgId::new(0, "centroids");
pub const PARTIAL_CLUSTERS_NUMBER: ArgId<NumericTable> = ArgId::new(0, "partialClustersNumber");
pub const PARTIAL_CLUSTERS: ArgId<NumericTable> = ArgId::new(1, "partialClusters");

typed_arguments! {
    pub struct InitInput { tag: 0x0003_0001, slots: 1 }
}

typed_arguments! {
    /// Initial `k x p` centroids
    pub struct InitResult { tag: 0x0003_0002, slots: 1 }
}

typed_arguments! {
    /// Rows a partition contributes: a count and the rows themselves
    ///
    /// `partialClusters` is absent when the count is zero and may have more
    /// rows than the count; only the leading rows are meaningful.
    pub struct InitPartial { tag: 0x0003_0003, slots: 2 }
}

typed_arguments! {
    pub struct InitMasterInput { tag: 0x0003_0004, slots: 1 }
}

impl InitInput {
    pub fn with_data(data: impl Into<Arc<NumericTable>>) -> Self {
        let mut out = Self::new();
        out.set(DATA, data);
        out
    }

    fn data(&self) -> Result<&NumericTable, ErrorList> {
        Ok(self.require_table(DATA, ArgumentRole::Input)?)
    }
}

impl InitMasterInput {
    pub fn with_partials(partials: impl Into<Arc<KeyedCollection>>) -> Self {
        let mut out = Self::new();
        out.set(PARTIAL_RESULTS, partials);
        out
    }
}

impl InitPartial {
    /// Number of rows this partition contributes
    pub fn n_clusters(&self) -> Result<usize, ErrorList> {
        let count = self
            .require_table(PARTIAL_CLUSTERS_NUMBER, ArgumentRole::PartialResult)?
            .value::<i32>(0, 0)?;
        usize::try_from(count).map_err(|_| partial_clusters_error(format!("negative count {count}")).into())
    }
}

fn partial_clusters_error(message: String) -> ErrorDetail {
    ErrorDetail::new(ErrorKind::IncorrectNumberOfPartialClusters)
        .with_argument(PARTIAL_CLUSTERS_NUMBER.name())
        .with_message(message)
}

/// Global indices of the selected rows, ascending
pub(crate) fn selected_rows(method: InitMethod, k: usize, n_total: usize, seed: u64) -> Vec<usize> {
    match method {
        InitMethod::DefaultDense => (0..k.min(n_total)).collect(),
        InitMethod::RandomDense => {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut rows = rand::seq::index::sample(&mut rng, n_total, k.min(n_total)).into_vec();
            rows.sort_unstable();
            rows
        }
    }
}

fn check_data(input: &InitInput) -> Status {
    check_numeric_table(
        input.table(DATA),
        &TableSpec::new(DATA.name(), ArgumentRole::Input).forbid(LayoutMask::PACKED),
    )
}

fn check_enough_rows(parameter: &InitParameter, n_total: usize) -> Status {
    if n_total < parameter.n_clusters {
        return Err(
            ErrorDetail::mismatch(ErrorKind::IncorrectNumberOfObservations, DATA.name(), parameter.n_clusters, n_total)
                .with_message("fewer rows than clusters")
                .into(),
        );
    }
    Ok(())
}

fn allocate_centroids<T: FloatElement>(k: usize, p: usize) -> Result<InitResult, ErrorList> {
    let mut out = InitResult::new();
    out.set(CENTROIDS, allocate_table::<T>(CENTROIDS.name(), k, p)?);
    Ok(out)
}

fn check_centroids(result: &InitResult, k: usize, p: usize) -> Status {
    check_numeric_table(
        result.table(CENTROIDS),
        &TableSpec::new(CENTROIDS.name(), ArgumentRole::Result).rows(k).columns(p),
    )
}

/// Initialization over a whole data set
pub struct InitBatch<T>(PhantomData<fn() -> T>);

impl<T: FloatElement> Algorithm for InitBatch<T> {
    type Input = InitInput;
    type Parameter = InitParameter;
    type Output = InitResult;
    type Method = InitMethod;

    const NAME: &'static str = "kmeans_init";

    fn kernels() -> KernelRegistry<InitMethod, dyn Kernel<Self>> {
        init_registry()
    }

    fn check_input(input: &InitInput, parameter: &InitParameter) -> Status {
        check_data(input)?;
        check_enough_rows(parameter, input.data()?.n_rows())
    }

    fn allocate_result(input: &InitInput, parameter: &InitParameter) -> Result<InitResult, ErrorList> {
        allocate_centroids::<T>(parameter.n_clusters, input.data()?.n_columns())
    }

    fn check_result(input: &InitInput, parameter: &InitParameter, result: &InitResult) -> Status {
        check_centroids(result, parameter.n_clusters, input.data()?.n_columns())
    }
}

/// Rows of one partition that belong to the initial centroids
pub struct InitStep1Local<T>(PhantomData<fn() -> T>);

impl<T: FloatElement> Algorithm for InitStep1Local<T> {
    type Input = InitInput;
    type Parameter = InitParameter;
    type Output = InitPartial;
    type Method = InitMethod;

    const NAME: &'static str = "kmeans_init";
    const STEP: Option<DistributedStep> = Some(DistributedStep::Step1Local);

    fn kernels() -> KernelRegistry<InitMethod, dyn Kernel<Self>> {
        init_registry()
    }

    fn check_input(input: &InitInput, parameter: &InitParameter) -> Status {
        check_data(input)?;
        let n = input.data()?.n_rows();
        parameter.local_range(n)?;
        check_enough_rows(parameter, parameter.total_rows(n))
    }

    /// Room for every row the partition could contribute
    fn allocate_result(input: &InitInput, parameter: &InitParameter) -> Result<InitPartial, ErrorList> {
        let data = input.data()?;
        let capacity = parameter.n_clusters.min(data.n_rows());
        let mut out = InitPartial::new();
        out.set(PARTIAL_CLUSTERS_NUMBER, allocate_table::<i32>(PARTIAL_CLUSTERS_NUMBER.name(), 1, 1)?);
        if capacity > 0 {
            out.set(PARTIAL_CLUSTERS, allocate_table::<T>(PARTIAL_CLUSTERS.name(), capacity, data.n_columns())?);
        }
        Ok(out)
    }
}

/// Concatenation of the partial clusters of every partition
pub struct InitStep2Master<T>(PhantomData<fn() -> T>);

impl<T: FloatElement> InitStep2Master<T> {
    /// Entry checks, then the total; returns the number of features
    fn check_partials(partials: &[InitPartial], parameter: &InitParameter) -> Result<usize, ErrorList> {
        let mut n_features: Option<usize> = None;
        let mut counts = Vec::with_capacity(partials.len());

        for (index, local) in partials.iter().enumerate() {
            check_numeric_table(
                local.table(PARTIAL_CLUSTERS_NUMBER),
                &TableSpec::new(PARTIAL_CLUSTERS_NUMBER.name(), ArgumentRole::PartialResult)
                    .rows(1)
                    .columns(1)
                    .forbid(LayoutMask::PACKED),
            )?;
            let count = local.n_clusters().map_err(|errors| with_index(errors, index))?;
            if count > parameter.n_clusters {
                return Err(ErrorDetail::mismatch(
                    ErrorKind::IncorrectNumberOfPartialClusters,
                    PARTIAL_CLUSTERS_NUMBER.name(),
                    parameter.n_clusters,
                    count,
                )
                .with_index(index)
                .into());
            }

            match local.table(PARTIAL_CLUSTERS) {
                Some(clusters) => {
                    if clusters.n_rows() < count {
                        return Err(ErrorDetail::mismatch(
                            ErrorKind::IncorrectNumberOfPartialClusters,
                            PARTIAL_CLUSTERS.name(),
                            count,
                            clusters.n_rows(),
                        )
                        .with_index(index)
                        .into());
                    }
                    let mut spec = TableSpec::new(PARTIAL_CLUSTERS.name(), ArgumentRole::PartialResult)
                        .forbid(LayoutMask::PACKED);
                    if let Some(p) = n_features {
                        spec = spec.columns(p);
                    }
                    check_numeric_table(Some(clusters), &spec).map_err(|errors| with_index(errors, index))?;
                    if n_features.is_none() {
                        n_features = Some(clusters.n_columns());
                    }
                }
                None if count > 0 => {
                    return Err(partial_clusters_error(format!("{count} clusters declared but none stored"))
                        .with_index(index)
                        .into());
                }
                None => {}
            }
            counts.push(count);
        }

        check_total(
            PARTIAL_CLUSTERS_NUMBER.name(),
            ErrorKind::IncorrectTotalNumberOfPartialClusters,
            parameter.n_clusters,
            counts,
        )?;
        n_features.ok_or_else(|| ErrorDetail::new(ErrorKind::IncorrectNumberOfPartialClusters).into())
    }

    fn n_features(input: &InitMasterInput) -> Result<usize, ErrorList> {
        Self::partials(input)?
            .iter()
            .find_map(|local| local.table(PARTIAL_CLUSTERS).map(NumericTable::n_columns))
            .ok_or_else(|| ErrorList::from(ErrorKind::IncorrectTotalNumberOfPartialClusters))
    }

    fn partials(input: &InitMasterInput) -> Result<Vec<InitPartial>, ErrorList> {
        let collection = require_partials(input, PARTIAL_RESULTS)?;
        Ok(downcast_all::<InitPartial>(collection)?.into_iter().map(|(_, p)| p).collect())
    }
}

fn with_index(errors: ErrorList, index: usize) -> ErrorList {
    errors.into_iter().map(|detail| detail.with_index(index)).collect()
}

impl<T: FloatElement> Algorithm for InitStep2Master<T> {
    type Input = InitMasterInput;
    type Parameter = InitParameter;
    type Output = InitResult;
    type Method = InitMethod;

    const NAME: &'static str = "kmeans_init";
    const STEP: Option<DistributedStep> = Some(DistributedStep::Step2Master);

    fn kernels() -> KernelRegistry<InitMethod, dyn Kernel<Self>> {
        init_registry()
    }

    fn check_input(input: &InitMasterInput, parameter: &InitParameter) -> Status {
        Self::check_partials(&Self::partials(input)?, parameter)?;
        Ok(())
    }

    fn allocate_result(input: &InitMasterInput, parameter: &InitParameter) -> Result<InitResult, ErrorList> {
        allocate_centroids::<T>(parameter.n_clusters, Self::n_features(input)?)
    }

    fn check_result(input: &InitMasterInput, parameter: &InitParameter, result: &InitResult) -> Status {
        check_centroids(result, parameter.n_clusters, Self::n_features(input)?)
    }
}

/// Copies the selected rows; there is nothing to vectorise
#[derive(Debug, Clone, Copy)]
pub struct InitKernel<T> {
    method: InitMethod,
    _phantom: PhantomData<fn() -> T>,
}

impl<T: FloatElement> InitKernel<T> {
    pub fn new(method: InitMethod) -> Self {
        Self {
            method,
            _phantom: PhantomData,
        }
    }

    /// Rows of `data`, whose first row has global index `offset`, that are selected
    fn local_rows(&self, data: &NumericTable, parameter: &InitParameter) -> Result<Vec<T>, ErrorList> {
        let n = data.n_rows();
        let total = parameter.total_rows(n);
        let local = parameter.local_range(n)?;
        let mut rows = Vec::new();
        for global in selected_rows(self.method, parameter.n_clusters, total, parameter.seed) {
            if local.contains(&global) {
                rows.extend_from_slice(&data.read_rows::<T>(global - parameter.offset, 1)?);
            }
        }
        Ok(rows)
    }
}

/// Initialization stage instantiated with element type `Element`
trait InitStage: Algorithm<Method = InitMethod> {
    type Element: FloatElement;
}

impl<T: FloatElement> InitStage for InitBatch<T> {
    type Element = T;
}

impl<T: FloatElement> InitStage for InitStep1Local<T> {
    type Element = T;
}

impl<T: FloatElement> InitStage for InitStep2Master<T> {
    type Element = T;
}

fn init_registry<A: InitStage>() -> KernelRegistry<InitMethod, dyn Kernel<A>>
where
    InitKernel<A::Element>: Kernel<A>,
{
    KernelRegistry::new(A::NAME)
        .register(InitMethod::DefaultDense, CpuLevel::Baseline, || {
            Some(Box::new(InitKernel::<A::Element>::new(InitMethod::DefaultDense)) as Box<dyn Kernel<A>>)
        })
        .register(InitMethod::RandomDense, CpuLevel::Baseline, || {
            Some(Box::new(InitKernel::<A::Element>::new(InitMethod::RandomDense)) as Box<dyn Kernel<A>>)
        })
}

impl<T: FloatElement> Kernel<InitBatch<T>> for InitKernel<T> {
    fn name(&self) -> String {
        kernel_name("kmeans_init", "scalar")
    }

    fn compute(&mut self, input: &InitInput, parameter: &InitParameter, out: &mut InitResult) -> Status {
        let data = input.data()?;
        let batch = InitParameter {
            n_rows_total: 0,
            offset: 0,
            ..parameter.clone()
        };
        let centroids = self.local_rows(data, &batch)?;
        debug!(method = ?self.method, k = parameter.n_clusters, "selected initial centroids");
        write_table(out, CENTROIDS, &centroids)
    }
}

impl<T: FloatElement> Kernel<InitStep1Local<T>> for InitKernel<T> {
    fn name(&self) -> String {
        kernel_name("kmeans_init", "scalar")
    }

    fn compute(&mut self, input: &InitInput, parameter: &InitParameter, out: &mut InitPartial) -> Status {
        let data = input.data()?;
        let rows = self.local_rows(data, parameter)?;
        let count = rows.len() / data.n_columns().max(1);
        write_table(out, PARTIAL_CLUSTERS_NUMBER, &[count as i32])?;
        if count > 0 {
            write_table(out, PARTIAL_CLUSTERS, &rows)?;
        }
        Ok(())
    }
}

impl<T: FloatElement> Kernel<InitStep2Master<T>> for InitKernel<T> {
    fn name(&self) -> String {
        kernel_name("kmeans_init", "scalar")
    }

    fn compute(&mut self, input: &InitMasterInput, _parameter: &InitParameter, out: &mut InitResult) -> Status {
        let collection = input.require(PARTIAL_RESULTS, ErrorKind::NullInputDataCollection)?;
        let mut centroids = Vec::new();
        for (_, local) in downcast_all::<InitPartial>(collection)? {
            let count = local.n_clusters()?;
            if let Some(clusters) = local.table(PARTIAL_CLUSTERS) {
                centroids.extend_from_slice(&clusters.read_rows::<T>(0, count)?);
            }
        }
        write_table(out, CENTROIDS, &centroids)
    }
}
