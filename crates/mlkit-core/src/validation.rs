//! Argument validation helpers
//!
//! Checks run in a fixed order per argument: presence, layout, then shape.
//! Each returns a [`Status`]; the first failure for an argument stops the
//! remaining checks on that argument.

use crate::argument::ArgumentRole;
use crate::error::{ErrorDetail, ErrorKind, ErrorList, Status};
use crate::numeric::Numeric;
use crate::table::{LayoutMask, NumericTable, Tensor};

/// Constraints declared for one table argument
#[derive(Debug, Clone)]
pub struct TableSpec<'a> {
    name: &'a str,
    role: ArgumentRole,
    unexpected_layouts: LayoutMask,
    rows: Option<usize>,
    columns: Option<usize>,
}

impl<'a> TableSpec<'a> {
    /// Dense-or-packed table with any non-zero number of rows
    pub fn new(name: &'a str, role: ArgumentRole) -> Self {
        Self {
            name,
            role,
            unexpected_layouts: LayoutMask::empty(),
            rows: None,
            columns: None,
        }
    }

    pub fn rows(mut self, rows: usize) -> Self {
        self.rows = Some(rows);
        self
    }

    pub fn columns(mut self, columns: usize) -> Self {
        self.columns = Some(columns);
        self
    }

    /// Reject tables stored in any of `layouts`
    pub fn forbid(mut self, layouts: LayoutMask) -> Self {
        self.unexpected_layouts |= layouts;
        self
    }

    pub fn name(&self) -> &str {
        self.name
    }
}

/// Validate `table` against `spec`
pub fn check_numeric_table(table: Option<&NumericTable>, spec: &TableSpec<'_>) -> Status {
    let table = match table {
        Some(table) => table,
        None => {
            return Err(ErrorDetail::new(spec.role.null_table_kind())
                .with_argument(spec.name)
                .into())
        }
    };

    if spec.unexpected_layouts.intersects(table.layout().mask()) {
        return Err(ErrorDetail::new(ErrorKind::IncorrectTypeOfNumericTable)
            .with_argument(spec.name)
            .with_message(format!("{:?} layout is not supported", table.layout()))
            .into());
    }

    if let Some(columns) = spec.columns {
        if table.n_columns() != columns {
            return Err(ErrorDetail::mismatch(ErrorKind::IncorrectNumberOfColumns, spec.name, columns, table.n_columns()).into());
        }
    } else if table.n_columns() == 0 {
        return Err(ErrorDetail::new(ErrorKind::IncorrectNumberOfColumns)
            .with_argument(spec.name)
            .with_dimensions(1, 0)
            .into());
    }

    match spec.rows {
        Some(rows) if table.n_rows() != rows => {
            Err(ErrorDetail::mismatch(ErrorKind::IncorrectNumberOfRows, spec.name, rows, table.n_rows()).into())
        }
        None if table.n_rows() == 0 => Err(ErrorDetail::new(ErrorKind::IncorrectNumberOfObservations)
            .with_argument(spec.name)
            .with_dimensions(1, 0)
            .into()),
        _ if !table.is_allocated() => Err(ErrorDetail::new(spec.role.null_table_kind())
            .with_argument(spec.name)
            .with_message("table has no memory")
            .into()),
        _ => Ok(()),
    }
}

/// Validate presence and dimensions of a tensor
///
/// `dimensions` entries of `None` accept any size.
pub fn check_tensor(tensor: Option<&Tensor>, name: &str, dimensions: &[Option<usize>]) -> Status {
    let tensor = tensor.ok_or_else(|| ErrorList::from(ErrorDetail::new(ErrorKind::NullTensor).with_argument(name)))?;
    if tensor.n_dimensions() != dimensions.len() {
        return Err(ErrorDetail::mismatch(
            ErrorKind::IncorrectNumberOfDimensionsInTensor,
            name,
            dimensions.len(),
            tensor.n_dimensions(),
        )
        .into());
    }
    for (index, (&actual, expected)) in tensor.dimensions().iter().zip(dimensions).enumerate() {
        let bad = match expected {
            Some(expected) => actual != *expected,
            None => actual == 0,
        };
        if bad {
            return Err(ErrorDetail::mismatch(
                ErrorKind::IncorrectSizeOfDimensionInTensor,
                name,
                expected.unwrap_or(1),
                actual,
            )
            .with_index(index)
            .into());
        }
    }
    Ok(())
}

/// Tensor with exactly the dimensions of `reference`
pub fn check_tensor_like(tensor: Option<&Tensor>, name: &str, reference: &Tensor) -> Status {
    let dims: Vec<_> = reference.dimensions().iter().map(|&d| Some(d)).collect();
    check_tensor(tensor, name, &dims)
}

/// `value` must be at least `min`
pub fn check_at_least(name: &str, value: usize, min: usize) -> Status {
    if value < min {
        return Err(ErrorDetail::new(ErrorKind::IncorrectParameter)
            .with_argument(name)
            .with_message(format!("must be at least {min}, got {value}"))
            .into());
    }
    Ok(())
}

/// `value` must be finite and fall in `[low, high]`
pub fn check_in_range(name: &str, value: f64, low: f64, high: f64) -> Status {
    if !(value.is_finite() && low <= value && value <= high) {
        return Err(ErrorDetail::new(ErrorKind::IncorrectParameter)
            .with_argument(name)
            .with_message(format!("must lie in [{low}, {high}], got {value}"))
            .into());
    }
    Ok(())
}

/// Lower bound must be strictly below upper bound
pub fn check_bounds(lower: f64, upper: f64) -> Status {
    if lower >= upper {
        return Err(ErrorDetail::new(ErrorKind::LowerBoundGreaterThanOrEqualToUpperBound)
            .with_argument("lowerBound")
            .with_message(format!("{lower} >= {upper}"))
            .into());
    }
    Ok(())
}

/// Every value of `table` must be finite
pub fn check_finite<T: Numeric>(table: &NumericTable, name: &str) -> Status {
    let values = table.read_all::<T>()?;
    let columns = table.n_columns().max(1);
    match values.iter().position(|v| !v.is_finite_value()) {
        Some(pos) => Err(ErrorDetail::new(ErrorKind::NonFiniteValue)
            .with_argument(name)
            .with_index(pos / columns)
            .into()),
        None => Ok(()),
    }
}

/// Collects independent checks into one list
#[derive(Debug, Default)]
pub struct Validator {
    errors: ErrorList,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failed check; returns whether it passed
    pub fn check(&mut self, status: Status) -> bool {
        match status {
            Ok(()) => true,
            Err(errors) => {
                self.errors.append(errors);
                false
            }
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn finish(self) -> Status {
        self.errors.into_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::DataType;
    use crate::table::StorageLayout;

    fn data(rows: usize, cols: usize) -> NumericTable {
        NumericTable::allocate::<f64>(rows, cols).unwrap()
    }

    #[test]
    fn test_null_table_per_role() {
        let spec = TableSpec::new("data", ArgumentRole::Input);
        let err = check_numeric_table(None, &spec).unwrap_err();
        assert_eq!(err.len(), 1);
        assert_eq!(err.first().unwrap().kind, ErrorKind::NullInputNumericTable);

        let spec = TableSpec::new("centroids", ArgumentRole::Result);
        let err = check_numeric_table(None, &spec).unwrap_err();
        assert_eq!(err.first().unwrap().kind, ErrorKind::NullResultNumericTable);
    }

    #[test]
    fn test_empty_is_distinct_from_null() {
        let table = data(0, 3);
        let err = check_numeric_table(Some(&table), &TableSpec::new("data", ArgumentRole::Input)).unwrap_err();
        assert_eq!(err.first().unwrap().kind, ErrorKind::IncorrectNumberOfObservations);
    }

    #[test]
    fn test_row_mismatch_carries_dimensions() {
        let table = data(4, 2);
        let spec = TableSpec::new("centroids", ArgumentRole::Result).rows(5).columns(2);
        let err = check_numeric_table(Some(&table), &spec).unwrap_err();
        let detail = err.first().unwrap();
        assert_eq!(detail.kind, ErrorKind::IncorrectNumberOfRows);
        assert_eq!(detail.argument.as_deref(), Some("centroids"));
        assert_eq!((detail.expected, detail.actual), (Some(5), Some(4)));
    }

    #[test]
    fn test_layout_checked_before_shape() {
        let packed = NumericTable::packed(2, StorageLayout::PackedSymmetric, vec![1.0f64; 3]).unwrap();
        let spec = TableSpec::new("data", ArgumentRole::Input).rows(7).forbid(LayoutMask::PACKED);
        let err = check_numeric_table(Some(&packed), &spec).unwrap_err();
        assert_eq!(err.len(), 1);
        assert_eq!(err.first().unwrap().kind, ErrorKind::IncorrectTypeOfNumericTable);
    }

    #[test]
    fn test_unallocated_table() {
        let shell = NumericTable::unallocated(2, 2, DataType::F64);
        let err = check_numeric_table(Some(&shell), &TableSpec::new("data", ArgumentRole::Input)).unwrap_err();
        assert_eq!(err.first().unwrap().kind, ErrorKind::NullInputNumericTable);
    }

    #[test]
    fn test_tensor_dimensions() {
        let tensor = Tensor::allocate::<f32>(&[2, 3]).unwrap();
        assert!(check_tensor(Some(&tensor), "value", &[None, Some(3)]).is_ok());

        let err = check_tensor(Some(&tensor), "value", &[None]).unwrap_err();
        assert_eq!(err.first().unwrap().kind, ErrorKind::IncorrectNumberOfDimensionsInTensor);

        let err = check_tensor(Some(&tensor), "value", &[Some(2), Some(4)]).unwrap_err();
        let detail = err.first().unwrap();
        assert_eq!(detail.kind, ErrorKind::IncorrectSizeOfDimensionInTensor);
        assert_eq!(detail.index, Some(1));

        assert!(check_tensor(None, "value", &[]).unwrap_err().contains(ErrorKind::NullTensor));
    }

    #[test]
    fn test_parameter_ranges() {
        assert!(check_at_least("nClusters", 0, 1).is_err());
        assert!(check_in_range("gamma", 0.5, 0.0, 1.0).is_ok());
        assert!(check_in_range("gamma", f64::NAN, 0.0, 1.0).is_err());
        let err = check_bounds(1.0, 1.0).unwrap_err();
        assert!(err.contains(ErrorKind::LowerBoundGreaterThanOrEqualToUpperBound));
    }

    #[test]
    fn test_finite_values() {
        let table = NumericTable::from_rows(&[[1.0f64, 2.0], [f64::INFINITY, 0.0]]).unwrap();
        let err = check_finite::<f64>(&table, "data").unwrap_err();
        assert_eq!(err.first().unwrap().index, Some(1));
    }

    #[test]
    fn test_validator_accumulates() {
        let mut validator = Validator::new();
        assert!(!validator.check(check_at_least("a", 0, 1)));
        assert!(validator.check(Ok(())));
        assert!(!validator.check(check_bounds(2.0, 1.0)));
        assert_eq!(validator.finish().unwrap_err().len(), 2);
    }
}
