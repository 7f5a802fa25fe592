//! Per-feature accumulators
//!
//! Blocks are summarised independently and merged with the pairwise update
//! for centered sums of squares (Chan, Golub and LeVeque), so a batch over
//! all rows, an online run over consecutive blocks and a distributed run
//! over partitions all produce the same statistics up to rounding.

use crate::types::{partial, result, MomentsMethod, MomentsPartial, MomentsResult};
use mlkit_core::{
    ArgId, ArgumentRole, ComputePrimitives, ErrorKind, ErrorList, FloatElement, Numeric, NumericTable, Status,
};

/// Summary of a set of rows, one entry per feature
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ColumnStats<T> {
    pub n: usize,
    pub min: Vec<T>,
    pub max: Vec<T>,
    pub sum: Vec<T>,
    pub sum_squares: Vec<T>,
    pub sum_squares_centered: Vec<T>,
}

impl<T: FloatElement> ColumnStats<T> {
    pub fn empty(p: usize) -> Self {
        Self {
            n: 0,
            min: vec![T::infinity(); p],
            max: vec![T::neg_infinity(); p],
            sum: vec![T::zero(); p],
            sum_squares: vec![T::zero(); p],
            sum_squares_centered: vec![T::zero(); p],
        }
    }

    pub fn n_features(&self) -> usize {
        self.sum.len()
    }

    /// Summarise row-major `rows` of width `p`
    pub fn from_block<P: ComputePrimitives<T>>(rows: &[T], p: usize, method: MomentsMethod, primitives: &P) -> Self {
        match method {
            MomentsMethod::DefaultDense => Self::two_pass(rows, p, primitives),
            MomentsMethod::SinglePassDense => Self::single_pass(rows, p),
        }
    }

    fn two_pass<P: ComputePrimitives<T>>(rows: &[T], p: usize, primitives: &P) -> Self {
        let mut stats = Self::empty(p);
        for row in rows.chunks_exact(p) {
            stats.n += 1;
            primitives.axpy(T::one(), row, &mut stats.sum);
            for (j, &x) in row.iter().enumerate() {
                stats.sum_squares[j] += x * x;
                stats.observe_extremes(j, x);
            }
        }
        if stats.n == 0 {
            return stats;
        }

        let n = T::from_f64(stats.n as f64);
        let mean: Vec<T> = stats.sum.iter().map(|&s| s / n).collect();
        for row in rows.chunks_exact(p) {
            for (j, &x) in row.iter().enumerate() {
                let d = x - mean[j];
                stats.sum_squares_centered[j] += d * d;
            }
        }
        stats
    }

    fn single_pass(rows: &[T], p: usize) -> Self {
        let mut stats = Self::empty(p);
        let mut mean = vec![T::zero(); p];
        for row in rows.chunks_exact(p) {
            stats.n += 1;
            let k = T::from_f64(stats.n as f64);
            for (j, &x) in row.iter().enumerate() {
                let delta = x - mean[j];
                mean[j] += delta / k;
                stats.sum_squares_centered[j] += delta * (x - mean[j]);
                stats.sum[j] += x;
                stats.sum_squares[j] += x * x;
                stats.observe_extremes(j, x);
            }
        }
        stats
    }

    fn observe_extremes(&mut self, j: usize, x: T) {
        if x < self.min[j] {
            self.min[j] = x;
        }
        if x > self.max[j] {
            self.max[j] = x;
        }
    }

    /// Fold `other` into `self`
    pub fn merge(&mut self, other: &Self) {
        if other.n == 0 {
            return;
        }
        if self.n == 0 {
            *self = other.clone();
            return;
        }

        let na = T::from_f64(self.n as f64);
        let nb = T::from_f64(other.n as f64);
        let n = na + nb;
        for j in 0..self.n_features() {
            let delta = other.sum[j] / nb - self.sum[j] / na;
            self.sum_squares_centered[j] += other.sum_squares_centered[j] + delta * delta * na * nb / n;
            self.sum[j] += other.sum[j];
            self.sum_squares[j] += other.sum_squares[j];
            if other.min[j] < self.min[j] {
                self.min[j] = other.min[j];
            }
            if other.max[j] > self.max[j] {
                self.max[j] = other.max[j];
            }
        }
        self.n += other.n;
    }

    /// Load the state stored in a partial result
    pub fn read(partial: &MomentsPartial) -> Result<Self, ErrorList> {
        let count = partial
            .require_table(partial::N_OBSERVATIONS, ArgumentRole::PartialResult)?
            .value::<f64>(0, 0)?;
        let row = |id: ArgId<NumericTable>| -> Result<Vec<T>, ErrorList> {
            Ok(partial
                .require_table(id, ArgumentRole::PartialResult)?
                .read_rows::<T>(0, 1)?
                .into_owned())
        };
        if !(count >= 0.0 && count.fract() == 0.0) {
            return Err(ErrorKind::IncorrectNumberOfObservations.into());
        }

        let stats = Self {
            n: count as usize,
            min: row(partial::PARTIAL_MINIMUM)?,
            max: row(partial::PARTIAL_MAXIMUM)?,
            sum: row(partial::PARTIAL_SUM)?,
            sum_squares: row(partial::PARTIAL_SUM_SQUARES)?,
            sum_squares_centered: row(partial::PARTIAL_SUM_SQUARES_CENTERED)?,
        };
        if stats.n == 0 {
            // Freshly allocated partials hold zeros, not the identity of min/max
            return Ok(Self::empty(stats.n_features()));
        }
        Ok(stats)
    }

    /// Store this state into a partial result
    pub fn write(&self, partial: &mut MomentsPartial) -> Status {
        write_row(partial, partial::N_OBSERVATIONS, &[self.n as f64])?;
        write_row(partial, partial::PARTIAL_MINIMUM, &self.min)?;
        write_row(partial, partial::PARTIAL_MAXIMUM, &self.max)?;
        write_row(partial, partial::PARTIAL_SUM, &self.sum)?;
        write_row(partial, partial::PARTIAL_SUM_SQUARES, &self.sum_squares)?;
        write_row(partial, partial::PARTIAL_SUM_SQUARES_CENTERED, &self.sum_squares_centered)
    }

    /// Derive every moment from the accumulated sums
    ///
    /// Variance uses the unbiased `n - 1` denominator and is zero for a
    /// single observation.
    pub fn finalize(&self, out: &mut MomentsResult) -> Status {
        if self.n == 0 {
            return Err(ErrorKind::IncorrectNumberOfObservations.into());
        }
        let n = T::from_f64(self.n as f64);
        let denominator = T::from_f64(self.n.saturating_sub(1).max(1) as f64);

        let mean: Vec<T> = self.sum.iter().map(|&s| s / n).collect();
        let raw: Vec<T> = self.sum_squares.iter().map(|&s| s / n).collect();
        let variance: Vec<T> = if self.n > 1 {
            self.sum_squares_centered.iter().map(|&s| s / denominator).collect()
        } else {
            vec![T::zero(); self.n_features()]
        };
        let deviation: Vec<T> = variance.iter().map(|v| v.sqrt()).collect();
        let variation: Vec<T> = deviation.iter().zip(&mean).map(|(&s, &m)| s / m).collect();

        write_row(out, result::MINIMUM, &self.min)?;
        write_row(out, result::MAXIMUM, &self.max)?;
        write_row(out, result::SUM, &self.sum)?;
        write_row(out, result::SUM_SQUARES, &self.sum_squares)?;
        write_row(out, result::SUM_SQUARES_CENTERED, &self.sum_squares_centered)?;
        write_row(out, result::MEAN, &mean)?;
        write_row(out, result::SECOND_ORDER_RAW_MOMENT, &raw)?;
        write_row(out, result::VARIANCE, &variance)?;
        write_row(out, result::STANDARD_DEVIATION, &deviation)?;
        write_row(out, result::VARIATION, &variation)
    }
}

fn write_row<V: Numeric>(
    arguments: &mut mlkit_core::ArgumentCollection,
    id: ArgId<NumericTable>,
    values: &[V],
) -> Status {
    arguments
        .table_mut(id)
        .ok_or_else(|| ErrorList::from(mlkit_core::ErrorDetail::new(ErrorKind::NullResultNumericTable).with_argument(id.name())))?
        .write_rows(0, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use mlkit_core::ScalarBackend;

    const ROWS: [f64; 8] = [1.0, 10.0, 2.0, 20.0, 4.0, 30.0, 8.0, 40.0];

    #[test]
    fn test_methods_agree() {
        let backend = ScalarBackend::new();
        let two = ColumnStats::from_block(&ROWS, 2, MomentsMethod::DefaultDense, &backend);
        let one = ColumnStats::from_block(&ROWS, 2, MomentsMethod::SinglePassDense, &backend);

        assert_eq!(two.n, 4);
        assert_eq!(two.min, vec![1.0, 10.0]);
        assert_eq!(two.max, vec![8.0, 40.0]);
        assert_eq!(two.sum, one.sum);
        for j in 0..2 {
            assert_relative_eq!(two.sum_squares_centered[j], one.sum_squares_centered[j], epsilon = 1e-12);
        }
        // 1, 2, 4, 8 around 3.75
        assert_relative_eq!(two.sum_squares_centered[0], 30.75, epsilon = 1e-12);
    }

    #[test]
    fn test_single_precision_count_stays_exact() {
        let n = (1usize << 24) + 1;
        let stats = ColumnStats::<f32> {
            n,
            min: vec![-1.0],
            max: vec![1.0],
            sum: vec![0.0],
            sum_squares: vec![n as f32],
            sum_squares_centered: vec![n as f32],
        };
        let mut partial = MomentsPartial::allocate::<f32>(1).unwrap();
        stats.write(&mut partial).unwrap();

        let count = partial.table(partial::N_OBSERVATIONS).unwrap();
        assert_eq!(count.data_type(), mlkit_core::DataType::F64);
        assert_eq!(count.value::<f64>(0, 0).unwrap(), n as f64);
        assert_eq!(ColumnStats::<f32>::read(&partial).unwrap().n, n);
    }

    #[test]
    fn test_merge_matches_whole() {
        let backend = ScalarBackend::new();
        let whole = ColumnStats::from_block(&ROWS, 2, MomentsMethod::DefaultDense, &backend);
        let mut merged = ColumnStats::from_block(&ROWS[..2], 2, MomentsMethod::DefaultDense, &backend);
        merged.merge(&ColumnStats::from_block(&ROWS[2..], 2, MomentsMethod::DefaultDense, &backend));

        assert_eq!(merged.n, whole.n);
        assert_eq!(merged.min, whole.min);
        for j in 0..2 {
            assert_relative_eq!(merged.sum_squares_centered[j], whole.sum_squares_centered[j], epsilon = 1e-12);
        }

        let mut empty = ColumnStats::<f64>::empty(2);
        empty.merge(&whole);
        assert_eq!(empty, whole);
    }

    #[test]
    fn test_partial_round_trip() {
        let backend = ScalarBackend::new();
        let stats = ColumnStats::from_block(&ROWS, 2, MomentsMethod::DefaultDense, &backend);
        let mut partial = MomentsPartial::allocate::<f64>(2).unwrap();

        assert_eq!(ColumnStats::<f64>::read(&partial).unwrap(), ColumnStats::empty(2));
        stats.write(&mut partial).unwrap();
        assert_eq!(ColumnStats::<f64>::read(&partial).unwrap(), stats);
    }

    #[test]
    fn test_single_observation_variance() {
        let backend = ScalarBackend::new();
        let stats = ColumnStats::from_block(&[3.0f64, 4.0], 2, MomentsMethod::DefaultDense, &backend);
        let mut out = MomentsResult::allocate::<f64>(2).unwrap();
        stats.finalize(&mut out).unwrap();
        assert_eq!(out.table(result::VARIANCE).unwrap().read_all::<f64>().unwrap().as_ref(), &[0.0, 0.0]);
        assert_eq!(out.table(result::MEAN).unwrap().read_all::<f64>().unwrap().as_ref(), &[3.0, 4.0]);
    }
}
