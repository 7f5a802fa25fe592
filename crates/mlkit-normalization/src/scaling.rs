//! Column-wise affine rescaling shared by the normalization kernels

use mlkit_core::{
    allocate_table, check_numeric_table, ArgId, ArgumentCollection, ArgumentRole, Batch, ErrorDetail, ErrorKind,
    ErrorList, ExecutionEngine, FloatElement, LayoutMask, NumericTable, Status, TableSpec, DEFAULT_BLOCK_ROWS,
};
use mlkit_moments::{LowOrderMoments, MomentsInput, MomentsMethod, MomentsResult};
use std::sync::Arc;

/// `(x - shift) * scale + offset`, with one shift and scale per column
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ColumnScaling<T> {
    shift: Vec<T>,
    scale: Vec<T>,
    offset: T,
}

impl<T: FloatElement> ColumnScaling<T> {
    /// Map `[minimum, maximum]` onto `[lower, upper]`; constant columns map to `lower`
    pub(crate) fn min_max(minimum: &[T], maximum: &[T], lower: T, upper: T) -> Self {
        let range = upper - lower;
        let scale = minimum
            .iter()
            .zip(maximum)
            .map(|(&lo, &hi)| if hi > lo { range / (hi - lo) } else { T::zero() })
            .collect();
        Self {
            shift: minimum.to_vec(),
            scale,
            offset: lower,
        }
    }

    /// Center on `mean` and divide by `deviation`; constant columns map to zero
    pub(crate) fn standard(mean: &[T], deviation: &[T]) -> Self {
        let scale = deviation
            .iter()
            .map(|&s| if s > T::zero() { T::one() / s } else { T::zero() })
            .collect();
        Self {
            shift: mean.to_vec(),
            scale,
            offset: T::zero(),
        }
    }

    pub(crate) fn n_features(&self) -> usize {
        self.shift.len()
    }

    /// Rescale the row-major `data` into `out`, block by block
    pub(crate) fn apply<E: ExecutionEngine<T>>(&self, engine: &E, data: &[T], out: &mut [T]) {
        let p = self.n_features();
        if p == 0 {
            return;
        }
        engine.zip_chunks_mut(data, out, DEFAULT_BLOCK_ROWS * p, |src, dst| {
            for (row, target) in src.chunks_exact(p).zip(dst.chunks_exact_mut(p)) {
                for (j, value) in target.iter_mut().enumerate() {
                    *value = (row[j] - self.shift[j]) * self.scale[j] + self.offset;
                }
            }
        });
    }
}

/// Run a nested moments computation over `data`
pub(crate) fn moments_of<T: FloatElement>(
    data: &Arc<NumericTable>,
    method: MomentsMethod,
) -> Result<MomentsResult, ErrorList> {
    let mut moments = Batch::<LowOrderMoments<T>>::with_method(method);
    *moments.input_mut() = MomentsInput::with_data(Arc::clone(data));
    let (output, errors, _) = moments.compute_no_throw().into_parts();
    output.ok_or(errors)
}

/// The single row of a `1 x p` table
pub(crate) fn row<T: FloatElement>(arguments: &ArgumentCollection, id: ArgId<NumericTable>) -> Result<Vec<T>, ErrorList> {
    Ok(arguments
        .require_table(id, ArgumentRole::Result)?
        .read_rows::<T>(0, 1)?
        .into_owned())
}

pub(crate) fn shared_data(arguments: &ArgumentCollection, id: ArgId<NumericTable>) -> Result<&Arc<NumericTable>, ErrorList> {
    arguments
        .get(id)
        .ok_or_else(|| ErrorDetail::new(ErrorKind::NullInputNumericTable).with_argument(id.name()).into())
}

pub(crate) fn check_data(arguments: &ArgumentCollection, id: ArgId<NumericTable>) -> Status {
    check_numeric_table(
        arguments.table(id),
        &TableSpec::new(id.name(), ArgumentRole::Input).forbid(LayoutMask::PACKED),
    )
}

/// Shape of the input data, `(rows, columns)`
pub(crate) fn shape(arguments: &ArgumentCollection, id: ArgId<NumericTable>) -> Result<(usize, usize), ErrorList> {
    let data = arguments.require_table(id, ArgumentRole::Input)?;
    Ok((data.n_rows(), data.n_columns()))
}

pub(crate) fn allocate_normalized<T: FloatElement>(
    arguments: &mut ArgumentCollection,
    id: ArgId<NumericTable>,
    (rows, columns): (usize, usize),
) -> Status {
    arguments.set(id, allocate_table::<T>(id.name(), rows, columns)?);
    Ok(())
}

pub(crate) fn check_normalized(
    arguments: &ArgumentCollection,
    id: ArgId<NumericTable>,
    (rows, columns): (usize, usize),
) -> Status {
    check_numeric_table(
        arguments.table(id),
        &TableSpec::new(id.name(), ArgumentRole::Result)
            .rows(rows)
            .columns(columns)
            .forbid(LayoutMask::PACKED),
    )
}

/// Rescale `data` into the table at `target` of `out`
pub(crate) fn rescale<T: FloatElement, E: ExecutionEngine<T>>(
    engine: &E,
    scaling: &ColumnScaling<T>,
    data: &NumericTable,
    out: &mut ArgumentCollection,
    target: ArgId<NumericTable>,
) -> Status {
    let values = data.read_all::<T>()?;
    let normalized = out
        .table_mut(target)
        .ok_or_else(|| ErrorList::from(ErrorDetail::new(ErrorKind::NullResultNumericTable).with_argument(target.name())))?
        .values_mut::<T>()?;
    scaling.apply(engine, &values, normalized);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlkit_core::scalar_sequential;

    #[test]
    fn test_min_max_scaling() {
        let scaling = ColumnScaling::min_max(&[1.0, 5.0], &[3.0, 5.0], -1.0, 1.0);
        let mut out = vec![0.0; 4];
        scaling.apply(&scalar_sequential::<f64>(), &[1.0, 5.0, 3.0, 5.0], &mut out);
        assert_eq!(out, vec![-1.0, -1.0, 1.0, -1.0]);
    }

    #[test]
    fn test_standard_scaling() {
        let scaling = ColumnScaling::standard(&[2.0], &[0.5]);
        let mut out = vec![0.0; 3];
        scaling.apply(&scalar_sequential::<f64>(), &[1.0, 2.0, 3.0], &mut out);
        assert_eq!(out, vec![-2.0, 0.0, 2.0]);

        let flat = ColumnScaling::standard(&[4.0], &[0.0]);
        flat.apply(&scalar_sequential::<f64>(), &[4.0, 4.0, 4.0], &mut out);
        assert_eq!(out, vec![0.0; 3]);
    }

    #[test]
    fn test_nested_moments() {
        let data = Arc::new(NumericTable::from_rows(&[[1.0f64], [3.0]]).unwrap());
        let moments = moments_of::<f64>(&data, MomentsMethod::SinglePassDense).unwrap();
        assert_eq!(row::<f64>(&moments, mlkit_moments::result::MEAN).unwrap(), vec![2.0]);

        let empty = Arc::new(NumericTable::allocate::<f64>(0, 1).unwrap());
        let errors = moments_of::<f64>(&empty, MomentsMethod::DefaultDense).unwrap_err();
        assert!(errors.contains(ErrorKind::IncorrectNumberOfObservations));
    }
}
