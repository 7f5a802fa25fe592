//! Parameters, identifiers and argument collections of Lloyd's k-means

use mlkit_core::{
    allocate_table, check_at_least, check_in_range, check_numeric_table, typed_arguments, ArgId, ArgumentRole,
    ArgumentTag, ErrorDetail, ErrorKind, ErrorList, FloatElement, KeyedCollection, LayoutMask, Model, NumericTable,
    Parameter, Status, TableSpec, TypedArguments,
};
use std::sync::Arc;

/// Computation method of the clustering stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KMeansMethod {
    /// Lloyd iterations over dense data
    #[default]
    LloydDense,
}

/// Parameter shared by the batch, local and master stages
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansParameter {
    pub n_clusters: usize,
    pub max_iterations: usize,
    /// Iterations stop once the objective improves by less than this
    pub accuracy_threshold: f64,
    /// Weight of categorical features in the distance
    ///
    /// Reserved for mixed categorical data. Dense Lloyd has no categorical
    /// features, so only the non-negative range is checked and the value
    /// never changes a dense result.
    pub gamma: f64,
    /// Whether to compute the assignment of every observation
    pub assign_flag: bool,
}

impl KMeansParameter {
    pub fn new(n_clusters: usize, max_iterations: usize) -> Self {
        Self {
            n_clusters,
            max_iterations,
            ..Self::default()
        }
    }
}

impl Default for KMeansParameter {
    fn default() -> Self {
        Self {
            n_clusters: 1,
            max_iterations: 1,
            accuracy_threshold: 0.0,
            gamma: 1.0,
            assign_flag: true,
        }
    }
}

impl Parameter for KMeansParameter {
    fn check(&self) -> Status {
        check_at_least("nClusters", self.n_clusters, 1)?;
        check_in_range("accuracyThreshold", self.accuracy_threshold, 0.0, f64::MAX)?;
        check_in_range("gamma", self.gamma, 0.0, f64::MAX)
    }
}

pub mod input {
    use super::*;

    pub const DATA: ArgId<NumericTable> = ArgId::new(0, "data");
    pub const INPUT_CENTROIDS: ArgId<NumericTable> = ArgId::new(1, "inputCentroids");

    /// Keyed collection of local partial results
    pub const PARTIAL_RESULTS: ArgId<KeyedCollection> = ArgId::new(0, "partialResults");
}

pub mod result {
    use super::*;

    pub const CENTROIDS: ArgId<NumericTable> = ArgId::new(0, "centroids");
    pub const ASSIGNMENTS: ArgId<NumericTable> = ArgId::new(1, "assignments");
    pub const OBJECTIVE_FUNCTION: ArgId<NumericTable> = ArgId::new(2, "objectiveFunction");
    pub const N_ITERATIONS: ArgId<NumericTable> = ArgId::new(3, "nIterations");
}

pub mod partial {
    use super::*;

    pub const N_OBSERVATIONS: ArgId<NumericTable> = ArgId::new(0, "nObservations");
    pub const PARTIAL_SUMS: ArgId<NumericTable> = ArgId::new(1, "partialSums");
    pub const PARTIAL_OBJECTIVE_FUNCTION: ArgId<NumericTable> = ArgId::new(2, "partialObjectiveFunction");
    pub const PARTIAL_ASSIGNMENTS: ArgId<NumericTable> = ArgId::new(3, "partialAssignments");
}

pub mod model {
    use super::*;

    pub const CENTROIDS: ArgId<NumericTable> = ArgId::new(0, "centroids");
}

typed_arguments! {
    /// Data and the centroids the iterations start from
    pub struct KMeansInput { tag: 0x0002_0001, slots: 2 }
}

typed_arguments! {
    pub struct KMeansResult { tag: 0x0002_0002, slots: 4 }
}

typed_arguments! {
    /// Per-cluster sums and counts of one partition, or of every partition merged so far
    pub struct KMeansPartial { tag: 0x0002_0003, slots: 4 }
}

typed_arguments! {
    pub struct KMeansMasterInput { tag: 0x0002_0004, slots: 1 }
}

typed_arguments! {
    /// Contents of a clustering model: the `k x p` centroids
    pub struct KMeansModelData { tag: 0x0002_0005, slots: 1 }
}

/// Tag of models built from clustering results
pub const MODEL_TAG: ArgumentTag = <KMeansModelData as TypedArguments>::TAG;

pub(crate) fn data_spec() -> TableSpec<'static> {
    TableSpec::new(input::DATA.name(), ArgumentRole::Input).forbid(LayoutMask::PACKED)
}

fn shaped(name: &str, role: ArgumentRole, rows: usize, columns: usize) -> TableSpec<'_> {
    TableSpec::new(name, role).rows(rows).columns(columns).forbid(LayoutMask::PACKED)
}

impl KMeansInput {
    pub fn with_data(data: impl Into<Arc<NumericTable>>, centroids: impl Into<Arc<NumericTable>>) -> Self {
        let mut out = Self::new();
        out.set(input::DATA, data);
        out.set(input::INPUT_CENTROIDS, centroids);
        out
    }

    pub(crate) fn check(&self, parameter: &KMeansParameter) -> Status {
        check_numeric_table(self.table(input::DATA), &data_spec())?;
        let p = self.n_features()?;
        check_numeric_table(
            self.table(input::INPUT_CENTROIDS),
            &shaped(input::INPUT_CENTROIDS.name(), ArgumentRole::Input, parameter.n_clusters, p),
        )
    }

    pub fn n_features(&self) -> Result<usize, ErrorList> {
        Ok(self.require_table(input::DATA, ArgumentRole::Input)?.n_columns())
    }

    pub(crate) fn n_rows(&self) -> Result<usize, ErrorList> {
        Ok(self.require_table(input::DATA, ArgumentRole::Input)?.n_rows())
    }
}

impl KMeansResult {
    pub(crate) fn allocate<T: FloatElement>(
        parameter: &KMeansParameter,
        n_features: usize,
        n_rows: Option<usize>,
    ) -> Result<Self, ErrorList> {
        let mut out = Self::new();
        out.set(result::CENTROIDS, allocate_table::<T>(result::CENTROIDS.name(), parameter.n_clusters, n_features)?);
        out.set(result::OBJECTIVE_FUNCTION, allocate_table::<T>(result::OBJECTIVE_FUNCTION.name(), 1, 1)?);
        if let Some(n) = n_rows {
            out.set(result::N_ITERATIONS, allocate_table::<i32>(result::N_ITERATIONS.name(), 1, 1)?);
            if parameter.assign_flag {
                out.set(result::ASSIGNMENTS, allocate_table::<i32>(result::ASSIGNMENTS.name(), n, 1)?);
            }
        }
        Ok(out)
    }

    /// Check against the input of a batch computation
    ///
    /// Tables are checked in the order centroids, objective function,
    /// iteration count and assignments; the first failure is reported.
    pub fn check(&self, input: &KMeansInput, parameter: &KMeansParameter) -> Status {
        self.check_centroids(parameter, input.n_features()?)?;
        check_numeric_table(
            self.table(result::N_ITERATIONS),
            &shaped(result::N_ITERATIONS.name(), ArgumentRole::Result, 1, 1),
        )?;
        if parameter.assign_flag {
            check_numeric_table(
                self.table(result::ASSIGNMENTS),
                &shaped(result::ASSIGNMENTS.name(), ArgumentRole::Result, input.n_rows()?, 1),
            )?;
        }
        Ok(())
    }

    /// Check the centroids and objective function a master step produces
    pub(crate) fn check_centroids(&self, parameter: &KMeansParameter, n_features: usize) -> Status {
        check_numeric_table(
            self.table(result::CENTROIDS),
            &shaped(result::CENTROIDS.name(), ArgumentRole::Result, parameter.n_clusters, n_features),
        )?;
        check_numeric_table(
            self.table(result::OBJECTIVE_FUNCTION),
            &shaped(result::OBJECTIVE_FUNCTION.name(), ArgumentRole::Result, 1, 1),
        )
    }

    /// Freeze the centroids into a model for [`KMeansAssign`](crate::KMeansAssign)
    pub fn model(&self) -> Result<Arc<Model>, ErrorList> {
        let centroids = self
            .get(result::CENTROIDS)
            .ok_or_else(|| ErrorDetail::new(ErrorKind::NullResultNumericTable).with_argument(result::CENTROIDS.name()))?;
        let mut data = KMeansModelData::new();
        data.set(model::CENTROIDS, Arc::clone(centroids));
        Ok(Model::freeze(data.into_arguments()))
    }
}

impl KMeansPartial {
    pub(crate) fn allocate<T: FloatElement>(
        n_clusters: usize,
        n_features: usize,
        assignments: Option<usize>,
    ) -> Result<Self, ErrorList> {
        let mut out = Self::new();
        out.set(partial::N_OBSERVATIONS, allocate_table::<i32>(partial::N_OBSERVATIONS.name(), n_clusters, 1)?);
        out.set(partial::PARTIAL_SUMS, allocate_table::<T>(partial::PARTIAL_SUMS.name(), n_clusters, n_features)?);
        out.set(
            partial::PARTIAL_OBJECTIVE_FUNCTION,
            allocate_table::<T>(partial::PARTIAL_OBJECTIVE_FUNCTION.name(), 1, 1)?,
        );
        if let Some(n) = assignments {
            out.set(partial::PARTIAL_ASSIGNMENTS, allocate_table::<i32>(partial::PARTIAL_ASSIGNMENTS.name(), n, 1)?);
        }
        Ok(out)
    }

    pub fn n_features(&self) -> Option<usize> {
        self.table(partial::PARTIAL_SUMS).map(NumericTable::n_columns)
    }

    /// Check the accumulated tables; `None` accepts any number of features
    pub(crate) fn check(&self, n_clusters: usize, n_features: Option<usize>) -> Status {
        let role = ArgumentRole::PartialResult;
        check_numeric_table(
            self.table(partial::N_OBSERVATIONS),
            &shaped(partial::N_OBSERVATIONS.name(), role, n_clusters, 1),
        )?;
        let mut sums = TableSpec::new(partial::PARTIAL_SUMS.name(), role)
            .rows(n_clusters)
            .forbid(LayoutMask::PACKED);
        if let Some(p) = n_features {
            sums = sums.columns(p);
        }
        check_numeric_table(self.table(partial::PARTIAL_SUMS), &sums)?;
        check_numeric_table(
            self.table(partial::PARTIAL_OBJECTIVE_FUNCTION),
            &shaped(partial::PARTIAL_OBJECTIVE_FUNCTION.name(), role, 1, 1),
        )
    }
}

impl KMeansMasterInput {
    pub fn with_partials(partials: impl Into<Arc<KeyedCollection>>) -> Self {
        let mut out = Self::new();
        out.set(input::PARTIAL_RESULTS, partials);
        out
    }
}
