//! Argument collections and identifiers of the moments algorithms

use mlkit_core::{
    allocate_table, check_numeric_table, typed_arguments, ArgId, ArgumentRole, ErrorList, FloatElement,
    KeyedCollection, NumericTable, Status, TableSpec,
};
use std::sync::Arc;

/// Computation method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MomentsMethod {
    /// Two passes per block: block mean first, then centered sums
    #[default]
    DefaultDense,
    /// One pass per block with running mean updates
    SinglePassDense,
}

pub mod input {
    use super::*;

    pub const DATA: ArgId<NumericTable> = ArgId::new(0, "data");

    /// Keyed collection of step-1 partial results
    pub const PARTIAL_RESULTS: ArgId<KeyedCollection> = ArgId::new(0, "partialResults");
}

pub mod result {
    use super::*;

    pub const MINIMUM: ArgId<NumericTable> = ArgId::new(0, "minimum");
    pub const MAXIMUM: ArgId<NumericTable> = ArgId::new(1, "maximum");
    pub const SUM: ArgId<NumericTable> = ArgId::new(2, "sum");
    pub const SUM_SQUARES: ArgId<NumericTable> = ArgId::new(3, "sumSquares");
    pub const SUM_SQUARES_CENTERED: ArgId<NumericTable> = ArgId::new(4, "sumSquaresCentered");
    pub const MEAN: ArgId<NumericTable> = ArgId::new(5, "mean");
    pub const SECOND_ORDER_RAW_MOMENT: ArgId<NumericTable> = ArgId::new(6, "secondOrderRawMoment");
    pub const VARIANCE: ArgId<NumericTable> = ArgId::new(7, "variance");
    pub const STANDARD_DEVIATION: ArgId<NumericTable> = ArgId::new(8, "standardDeviation");
    pub const VARIATION: ArgId<NumericTable> = ArgId::new(9, "variation");

    pub const ALL: [ArgId<NumericTable>; 10] = [
        MINIMUM,
        MAXIMUM,
        SUM,
        SUM_SQUARES,
        SUM_SQUARES_CENTERED,
        MEAN,
        SECOND_ORDER_RAW_MOMENT,
        VARIANCE,
        STANDARD_DEVIATION,
        VARIATION,
    ];
}

pub mod partial {
    use super::*;

    /// Row count as `f64` whatever the computation type, exact up to 2^53
    pub const N_OBSERVATIONS: ArgId<NumericTable> = ArgId::new(0, "nObservations");
    pub const PARTIAL_MINIMUM: ArgId<NumericTable> = ArgId::new(1, "partialMinimum");
    pub const PARTIAL_MAXIMUM: ArgId<NumericTable> = ArgId::new(2, "partialMaximum");
    pub const PARTIAL_SUM: ArgId<NumericTable> = ArgId::new(3, "partialSum");
    pub const PARTIAL_SUM_SQUARES: ArgId<NumericTable> = ArgId::new(4, "partialSumSquares");
    pub const PARTIAL_SUM_SQUARES_CENTERED: ArgId<NumericTable> = ArgId::new(5, "partialSumSquaresCentered");

    /// Per-feature partial tables, everything except the observation count
    pub const FEATURES: [ArgId<NumericTable>; 5] = [
        PARTIAL_MINIMUM,
        PARTIAL_MAXIMUM,
        PARTIAL_SUM,
        PARTIAL_SUM_SQUARES,
        PARTIAL_SUM_SQUARES_CENTERED,
    ];
}

typed_arguments! {
    /// Data to compute moments of
    pub struct MomentsInput { tag: 0x0001_0001, slots: 1 }
}

typed_arguments! {
    /// The ten per-feature moment tables, each `1 x p`
    pub struct MomentsResult { tag: 0x0001_0002, slots: 10 }
}

typed_arguments! {
    /// Accumulated state of online and distributed computations
    pub struct MomentsPartial { tag: 0x0001_0003, slots: 6 }
}

typed_arguments! {
    /// Input of the master step: partial results keyed by block
    pub struct MomentsMasterInput { tag: 0x0001_0004, slots: 1 }
}

impl MomentsInput {
    pub fn with_data(data: impl Into<Arc<NumericTable>>) -> Self {
        let mut input = Self::new();
        input.set(input::DATA, data);
        input
    }
}

impl MomentsMasterInput {
    pub fn with_partials(partials: impl Into<Arc<KeyedCollection>>) -> Self {
        let mut input = Self::new();
        input.set(input::PARTIAL_RESULTS, partials);
        input
    }
}

impl MomentsResult {
    pub(crate) fn allocate<T: FloatElement>(n_features: usize) -> Result<Self, ErrorList> {
        let mut out = Self::new();
        for id in result::ALL {
            out.set(id, allocate_table::<T>(id.name(), 1, n_features)?);
        }
        Ok(out)
    }

    pub(crate) fn check(&self, n_features: usize) -> Status {
        for id in result::ALL {
            check_numeric_table(
                self.table(id),
                &TableSpec::new(id.name(), ArgumentRole::Result).rows(1).columns(n_features),
            )?;
        }
        Ok(())
    }
}

impl MomentsPartial {
    pub(crate) fn allocate<T: FloatElement>(n_features: usize) -> Result<Self, ErrorList> {
        let mut out = Self::new();
        out.set(partial::N_OBSERVATIONS, allocate_table::<f64>("nObservations", 1, 1)?);
        for id in partial::FEATURES {
            out.set(id, allocate_table::<T>(id.name(), 1, n_features)?);
        }
        Ok(out)
    }

    /// Number of features, read from the partial sums
    pub fn n_features(&self) -> Option<usize> {
        self.table(partial::PARTIAL_SUM).map(NumericTable::n_columns)
    }

    /// Check presence and shape of every table; `None` accepts any width
    pub(crate) fn check(&self, n_features: Option<usize>) -> Status {
        check_numeric_table(
            self.table(partial::N_OBSERVATIONS),
            &TableSpec::new("nObservations", ArgumentRole::PartialResult).rows(1).columns(1),
        )?;
        for id in partial::FEATURES {
            let mut spec = TableSpec::new(id.name(), ArgumentRole::PartialResult).rows(1);
            if let Some(p) = n_features {
                spec = spec.columns(p);
            }
            check_numeric_table(self.table(id), &spec)?;
        }
        Ok(())
    }
}
