//! Assignment of observations to their nearest centroid
//!
//! A block of rows is reduced to per-cluster counts and coordinate sums plus
//! its share of the objective function (sum of squared distances to the
//! nearest centroid). Blocks, partitions and partial results all merge with
//! plain addition.

use crate::types::{partial, KMeansPartial};
use mlkit_core::{
    ArgId, ArgumentCollection, ArgumentRole, ComputePrimitives, ErrorDetail, ErrorKind, ErrorList, FloatElement,
    Numeric, NumericTable, Status,
};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ClusterStats<T> {
    pub counts: Vec<usize>,
    /// Row-major `k x p` coordinate sums
    pub sums: Vec<T>,
    pub objective: T,
    pub assignments: Vec<i32>,
}

impl<T: FloatElement> ClusterStats<T> {
    pub fn empty(k: usize, p: usize) -> Self {
        Self {
            counts: vec![0; k],
            sums: vec![T::zero(); k * p],
            objective: T::zero(),
            assignments: Vec::new(),
        }
    }

    pub fn n_clusters(&self) -> usize {
        self.counts.len()
    }

    fn n_features(&self) -> usize {
        self.sums.len().checked_div(self.n_clusters()).unwrap_or(0)
    }

    /// Assign every row of `rows` to the nearest of `centroids`
    ///
    /// Ties go to the cluster with the lowest index.
    pub fn from_block<P: ComputePrimitives<T>>(
        rows: &[T],
        p: usize,
        centroids: &[T],
        primitives: &P,
        keep_assignments: bool,
    ) -> Self {
        let k = centroids.len() / p;
        let mut stats = Self::empty(k, p);
        let mut distances = vec![T::zero(); k];
        for row in rows.chunks_exact(p) {
            for (distance, centroid) in distances.iter_mut().zip(centroids.chunks_exact(p)) {
                *distance = primitives.squared_distance(row, centroid);
            }
            let nearest = primitives.argmin(&distances).unwrap_or(0);
            stats.counts[nearest] += 1;
            primitives.axpy(T::one(), row, &mut stats.sums[nearest * p..(nearest + 1) * p]);
            stats.objective += distances[nearest];
            if keep_assignments {
                stats.assignments.push(nearest as i32);
            }
        }
        stats
    }

    /// Append the statistics of the rows following those of `self`
    pub fn merge(&mut self, other: Self) {
        for (count, add) in self.counts.iter_mut().zip(&other.counts) {
            *count += add;
        }
        for (sum, add) in self.sums.iter_mut().zip(&other.sums) {
            *sum += *add;
        }
        self.objective += other.objective;
        self.assignments.extend(other.assignments);
    }

    /// Cluster means; an empty cluster keeps its row of `previous`
    pub fn centroids(&self, previous: Option<&[T]>) -> Result<Vec<T>, ErrorList> {
        let p = self.n_features();
        let mut centroids = Vec::with_capacity(self.sums.len());
        for (cluster, (&count, sums)) in self.counts.iter().zip(self.sums.chunks_exact(p.max(1))).enumerate() {
            if count == 0 {
                let kept = previous.ok_or_else(|| {
                    ErrorDetail::new(ErrorKind::EmptyCluster)
                        .with_argument("centroids")
                        .with_index(cluster)
                })?;
                centroids.extend_from_slice(&kept[cluster * p..(cluster + 1) * p]);
            } else {
                let n = T::from_f64(count as f64);
                centroids.extend(sums.iter().map(|&s| s / n));
            }
        }
        Ok(centroids)
    }

    /// Load the counts, sums and objective of a partial result
    pub fn read(partial: &KMeansPartial) -> Result<Self, ErrorList> {
        let role = ArgumentRole::PartialResult;
        let counts = partial
            .require_table(partial::N_OBSERVATIONS, role)?
            .read_all::<i32>()?
            .iter()
            .map(|&c| usize::try_from(c).map_err(|_| observations_error(c)))
            .collect::<Result<Vec<_>, _>>()?;
        let sums = partial.require_table(partial::PARTIAL_SUMS, role)?.read_all::<T>()?.into_owned();
        let objective = partial
            .require_table(partial::PARTIAL_OBJECTIVE_FUNCTION, role)?
            .value::<T>(0, 0)?;
        Ok(Self {
            counts,
            sums,
            objective,
            assignments: Vec::new(),
        })
    }

    /// Store into a partial result, with assignments when it has room for them
    pub fn write(&self, partial: &mut KMeansPartial) -> Status {
        let counts = self
            .counts
            .iter()
            .map(|&c| i32::try_from(c).map_err(|_| observations_error(c)))
            .collect::<Result<Vec<_>, _>>()?;
        write_table(partial, partial::N_OBSERVATIONS, &counts)?;
        write_table(partial, partial::PARTIAL_SUMS, &self.sums)?;
        write_table(partial, partial::PARTIAL_OBJECTIVE_FUNCTION, &[self.objective])?;
        if partial.table(partial::PARTIAL_ASSIGNMENTS).is_some() {
            write_table(partial, partial::PARTIAL_ASSIGNMENTS, &self.assignments)?;
        }
        Ok(())
    }
}

fn observations_error(count: impl std::fmt::Display) -> ErrorDetail {
    ErrorDetail::new(ErrorKind::IncorrectNumberOfObservations)
        .with_argument(partial::N_OBSERVATIONS.name())
        .with_message(format!("cluster count {count} is out of range"))
}

pub(crate) fn write_table<U: Numeric>(arguments: &mut ArgumentCollection, id: ArgId<NumericTable>, values: &[U]) -> Status {
    arguments
        .table_mut(id)
        .ok_or_else(|| ErrorList::from(ErrorDetail::new(ErrorKind::NullResultNumericTable).with_argument(id.name())))?
        .write_rows(0, values)
}
