//! Two-dimensional homogeneous table

use super::buffer::{same_values, Ownership, TableData};
use crate::error::{ErrorDetail, ErrorKind, ErrorList};
use crate::numeric::{DataType, Numeric};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;

/// Physical arrangement of a table's values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageLayout {
    /// Row-major `n_rows * n_columns` values
    Dense,
    /// Lower triangle of a symmetric square matrix, row by row
    PackedSymmetric,
    /// Lower triangle of a square matrix, upper part implicitly zero
    PackedLowerTriangular,
}

bitflags! {
    /// Set of layouts, used to state which layouts an argument must not have
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct LayoutMask: u8 {
        const DENSE = 1 << 0;
        const PACKED_SYMMETRIC = 1 << 1;
        const PACKED_LOWER_TRIANGULAR = 1 << 2;
        const PACKED = Self::PACKED_SYMMETRIC.bits() | Self::PACKED_LOWER_TRIANGULAR.bits();
    }
}

impl StorageLayout {
    pub fn mask(&self) -> LayoutMask {
        match self {
            StorageLayout::Dense => LayoutMask::DENSE,
            StorageLayout::PackedSymmetric => LayoutMask::PACKED_SYMMETRIC,
            StorageLayout::PackedLowerTriangular => LayoutMask::PACKED_LOWER_TRIANGULAR,
        }
    }

    pub fn is_packed(&self) -> bool {
        LayoutMask::PACKED.contains(self.mask())
    }
}

/// Position of `(row, col)` inside lower-packed storage
#[inline]
fn packed_index(row: usize, col: usize) -> usize {
    row * (row + 1) / 2 + col
}

fn storage_len(layout: StorageLayout, n_rows: usize, n_columns: usize) -> Option<usize> {
    match layout {
        StorageLayout::Dense => n_rows.checked_mul(n_columns),
        _ => n_rows.checked_mul(n_rows + 1).map(|v| v / 2),
    }
}

fn dense_len(n_rows: usize, n_columns: usize) -> Result<usize, ErrorList> {
    storage_len(StorageLayout::Dense, n_rows, n_columns).ok_or_else(|| {
        ErrorDetail::new(ErrorKind::MemoryAllocationFailed)
            .with_argument("values")
            .with_message(format!("{n_rows} x {n_columns} elements overflow usize"))
            .into()
    })
}

fn shape_error(expected: usize, actual: usize) -> ErrorList {
    ErrorDetail::mismatch(ErrorKind::IncorrectNumberOfObservations, "values", expected, actual).into()
}

/// Homogeneous 2-D numeric table with an ownership-tagged buffer
///
/// Shape is fixed at construction. Block accessors are generic over the
/// requested element type and cast from the stored type when they differ.
#[derive(Debug, Clone)]
pub struct NumericTable {
    n_rows: usize,
    n_columns: usize,
    layout: StorageLayout,
    data: TableData,
}

impl NumericTable {
    /// Shape-only table with no memory behind it
    pub fn unallocated(n_rows: usize, n_columns: usize, data_type: DataType) -> Self {
        Self {
            n_rows,
            n_columns,
            layout: StorageLayout::Dense,
            data: TableData::unallocated(data_type),
        }
    }

    /// Zeroed, internally allocated dense table
    pub fn allocate<T: Numeric>(n_rows: usize, n_columns: usize) -> Result<Self, ErrorList> {
        Self::allocate_as(n_rows, n_columns, T::DATA_TYPE)
    }

    /// Zeroed, internally allocated dense table of a runtime element type
    pub fn allocate_as(n_rows: usize, n_columns: usize, data_type: DataType) -> Result<Self, ErrorList> {
        let len = storage_len(StorageLayout::Dense, n_rows, n_columns)
            .ok_or_else(|| ErrorList::from(ErrorKind::MemoryAllocationFailed))?;
        Ok(Self {
            n_rows,
            n_columns,
            layout: StorageLayout::Dense,
            data: TableData::allocate(data_type, len)?,
        })
    }

    /// Dense table taking ownership of row-major `values`
    pub fn from_vec<T: Numeric>(n_rows: usize, n_columns: usize, values: Vec<T>) -> Result<Self, ErrorList> {
        let expected = dense_len(n_rows, n_columns)?;
        if values.len() != expected {
            return Err(shape_error(expected, values.len()));
        }
        Ok(Self {
            n_rows,
            n_columns,
            layout: StorageLayout::Dense,
            data: TableData::from_vec(values),
        })
    }

    /// Dense table over caller-owned row-major `values`
    pub fn from_user<T: Numeric>(n_rows: usize, n_columns: usize, values: Arc<[T]>) -> Result<Self, ErrorList> {
        let expected = dense_len(n_rows, n_columns)?;
        if values.len() != expected {
            return Err(shape_error(expected, values.len()));
        }
        Ok(Self {
            n_rows,
            n_columns,
            layout: StorageLayout::Dense,
            data: TableData::from_user(values),
        })
    }

    /// Dense table copied from a slice of rows
    pub fn from_rows<T: Numeric, R: AsRef<[T]>>(rows: &[R]) -> Result<Self, ErrorList> {
        let n_columns = rows.first().map_or(0, |r| r.as_ref().len());
        let mut values = Vec::with_capacity(rows.len() * n_columns);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != n_columns {
                return Err(ErrorDetail::mismatch(ErrorKind::IncorrectNumberOfColumns, "values", n_columns, row.len())
                    .with_index(i)
                    .into());
            }
            values.extend_from_slice(row);
        }
        Self::from_vec(rows.len(), n_columns, values)
    }

    /// 1x1 table holding `value`
    pub fn scalar<T: Numeric>(value: T) -> Self {
        Self {
            n_rows: 1,
            n_columns: 1,
            layout: StorageLayout::Dense,
            data: TableData::from_vec(vec![value]),
        }
    }

    /// Square `n x n` table stored as its packed lower triangle
    pub fn packed<T: Numeric>(n: usize, layout: StorageLayout, values: Vec<T>) -> Result<Self, ErrorList> {
        let expected = n * (n + 1) / 2;
        if !layout.is_packed() {
            return Err(ErrorKind::IncorrectTypeOfNumericTable.into());
        }
        if values.len() != expected {
            return Err(shape_error(expected, values.len()));
        }
        Ok(Self {
            n_rows: n,
            n_columns: n,
            layout,
            data: TableData::from_vec(values),
        })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_columns(&self) -> usize {
        self.n_columns
    }

    pub fn layout(&self) -> StorageLayout {
        self.layout
    }

    pub fn data_type(&self) -> DataType {
        self.data.data_type()
    }

    pub fn ownership(&self) -> Ownership {
        self.data.ownership()
    }

    pub fn is_allocated(&self) -> bool {
        self.ownership() != Ownership::NotAllocated
    }

    pub(crate) fn storage(&self) -> &TableData {
        &self.data
    }

    fn check_rows(&self, start: usize, count: usize) -> Result<(), ErrorList> {
        if start.checked_add(count).map_or(true, |end| end > self.n_rows) {
            return Err(ErrorDetail::mismatch(ErrorKind::IncorrectNumberOfRows, "rows", self.n_rows, start + count).into());
        }
        if !self.is_allocated() && count > 0 && self.n_columns > 0 {
            return Err(ErrorKind::NullInputNumericTable.into());
        }
        Ok(())
    }

    /// `count` rows starting at `start`, row-major, cast to `T`
    ///
    /// Packed layouts are expanded into full rows.
    pub fn read_rows<T: Numeric>(&self, start: usize, count: usize) -> Result<Cow<'_, [T]>, ErrorList> {
        self.check_rows(start, count)?;
        match self.layout {
            StorageLayout::Dense => {
                let cols = self.n_columns;
                Ok(self.data.read(start * cols..(start + count) * cols))
            }
            _ => {
                let packed = self.data.read::<T>(0..self.data.len());
                let mut out = Vec::with_capacity(count * self.n_columns);
                for row in start..start + count {
                    for col in 0..self.n_columns {
                        out.push(self.packed_value(&packed, row, col));
                    }
                }
                Ok(Cow::Owned(out))
            }
        }
    }

    fn packed_value<T: Numeric>(&self, packed: &[T], row: usize, col: usize) -> T {
        if col <= row {
            packed[packed_index(row, col)]
        } else if self.layout == StorageLayout::PackedSymmetric {
            packed[packed_index(col, row)]
        } else {
            T::zero()
        }
    }

    /// Every row of the table
    pub fn read_all<T: Numeric>(&self) -> Result<Cow<'_, [T]>, ErrorList> {
        self.read_rows(0, self.n_rows)
    }

    /// Column `col` cast to `T`
    pub fn read_column<T: Numeric>(&self, col: usize) -> Result<Vec<T>, ErrorList> {
        if col >= self.n_columns {
            return Err(ErrorDetail::mismatch(ErrorKind::IncorrectNumberOfColumns, "column", self.n_columns, col + 1).into());
        }
        let all = self.read_all::<T>()?;
        Ok(all.iter().skip(col).step_by(self.n_columns.max(1)).copied().collect())
    }

    /// Single value at `(row, col)` cast to `T`
    pub fn value<T: Numeric>(&self, row: usize, col: usize) -> Result<T, ErrorList> {
        if col >= self.n_columns {
            return Err(ErrorDetail::mismatch(ErrorKind::IncorrectNumberOfColumns, "column", self.n_columns, col + 1).into());
        }
        let rows = self.read_rows::<T>(row, 1)?;
        Ok(rows[col])
    }

    /// Overwrite whole rows starting at `start` with row-major `values`
    pub fn write_rows<T: Numeric>(&mut self, start: usize, values: &[T]) -> Result<(), ErrorList> {
        if self.layout != StorageLayout::Dense {
            return Err(ErrorDetail::new(ErrorKind::IncorrectTypeOfNumericTable)
                .with_message("packed tables are read-only through row accessors")
                .into());
        }
        let cols = self.n_columns.max(1);
        if values.len() % cols != 0 {
            return Err(ErrorDetail::mismatch(ErrorKind::IncorrectNumberOfColumns, "values", cols, values.len() % cols).into());
        }
        self.check_rows(start, values.len() / cols)?;
        self.data.write(start * self.n_columns, values)
    }

    /// Direct mutable view of a dense table whose stored type is `T`
    pub fn values_mut<T: Numeric>(&mut self) -> Result<&mut [T], ErrorList> {
        if self.layout != StorageLayout::Dense {
            return Err(ErrorKind::IncorrectTypeOfNumericTable.into());
        }
        self.data.as_mut()
    }

    /// Set every element to `value`
    pub fn fill<T: Numeric>(&mut self, value: T) -> Result<(), ErrorList> {
        let len = self.data.len();
        self.data.write(0, &vec![value; len])
    }

    /// Deep copy with library-owned memory
    pub fn to_internal(&self) -> Self {
        Self {
            n_rows: self.n_rows,
            n_columns: self.n_columns,
            layout: self.layout,
            data: self.data.to_internal(),
        }
    }
}

impl PartialEq for NumericTable {
    /// Same shape, layout and element type with equal values
    fn eq(&self, other: &Self) -> bool {
        if self.n_rows != other.n_rows
            || self.n_columns != other.n_columns
            || self.layout != other.layout
            || self.data_type() != other.data_type()
            || self.is_allocated() != other.is_allocated()
        {
            return false;
        }
        let len = self.data.len();
        len == other.data.len() && same_values(&self.data.read::<f64>(0..len), &other.data.read::<f64>(0..len))
    }
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", content = "values", rename_all = "lowercase")]
pub(crate) enum StoredValues {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I32(Vec<i32>),
    None(DataType),
}

impl StoredValues {
    pub(crate) fn capture(data: &TableData) -> Self {
        if data.ownership() == Ownership::NotAllocated {
            return StoredValues::None(data.data_type());
        }
        let len = data.len();
        match data.data_type() {
            DataType::F32 => StoredValues::F32(data.read(0..len).into_owned()),
            DataType::F64 => StoredValues::F64(data.read(0..len).into_owned()),
            DataType::I32 => StoredValues::I32(data.read(0..len).into_owned()),
        }
    }

    pub(crate) fn len(&self) -> Option<usize> {
        match self {
            StoredValues::F32(v) => Some(v.len()),
            StoredValues::F64(v) => Some(v.len()),
            StoredValues::I32(v) => Some(v.len()),
            StoredValues::None(_) => None,
        }
    }

    /// Rebuild storage; restored memory is always library-owned
    pub(crate) fn restore(self) -> TableData {
        match self {
            StoredValues::F32(v) => TableData::from_vec(v),
            StoredValues::F64(v) => TableData::from_vec(v),
            StoredValues::I32(v) => TableData::from_vec(v),
            StoredValues::None(data_type) => TableData::unallocated(data_type),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct TableRepr {
    n_rows: usize,
    n_columns: usize,
    layout: StorageLayout,
    data: StoredValues,
}

impl Serialize for NumericTable {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        TableRepr {
            n_rows: self.n_rows,
            n_columns: self.n_columns,
            layout: self.layout,
            data: StoredValues::capture(&self.data),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for NumericTable {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = TableRepr::deserialize(deserializer)?;
        if let Some(len) = repr.data.len() {
            let expected = storage_len(repr.layout, repr.n_rows, repr.n_columns)
                .ok_or_else(|| serde::de::Error::custom("table shape overflows"))?;
            if len != expected {
                return Err(serde::de::Error::custom(format!(
                    "table {}x{} expects {} values, found {}",
                    repr.n_rows, repr.n_columns, expected, len
                )));
            }
        }
        Ok(Self {
            n_rows: repr.n_rows,
            n_columns: repr.n_columns,
            layout: repr.layout,
            data: repr.data.restore(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NumericTable {
        NumericTable::from_rows(&[[1.0f64, 2.0, 3.0], [4.0, 5.0, 6.0]]).unwrap()
    }

    #[test]
    fn test_shape_and_ownership() {
        let table = sample();
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.n_columns(), 3);
        assert_eq!(table.ownership(), Ownership::InternallyAllocated);
        assert_eq!(table.data_type(), DataType::F64);

        let shell = NumericTable::unallocated(4, 2, DataType::F32);
        assert!(!shell.is_allocated());
    }

    #[test]
    fn test_read_rows_and_columns() {
        let table = sample();
        assert_eq!(table.read_rows::<f64>(1, 1).unwrap().as_ref(), &[4.0, 5.0, 6.0]);
        assert_eq!(table.read_column::<i32>(2).unwrap(), vec![3, 6]);
        assert_eq!(table.value::<f32>(0, 1).unwrap(), 2.0);
    }

    #[test]
    fn test_read_out_of_range_reports_rows() {
        let err = sample().read_rows::<f64>(1, 2).unwrap_err();
        assert!(err.contains(ErrorKind::IncorrectNumberOfRows));
    }

    #[test]
    fn test_from_vec_length_mismatch() {
        let err = NumericTable::from_vec(2, 2, vec![1.0f64; 3]).unwrap_err();
        let detail = err.first().unwrap();
        assert_eq!(detail.expected, Some(4));
        assert_eq!(detail.actual, Some(3));
    }

    #[test]
    fn test_from_vec_shape_overflow() {
        let err = NumericTable::from_vec::<f64>(usize::MAX, 2, vec![]).unwrap_err();
        let detail = err.first().unwrap();
        assert_eq!(detail.kind, ErrorKind::MemoryAllocationFailed);
        assert_eq!(detail.argument.as_deref(), Some("values"));

        let values: Arc<[f32]> = Arc::from(vec![0.0f32; 4]);
        let err = NumericTable::from_user(2, usize::MAX / 2 + 1, values).unwrap_err();
        assert!(err.contains(ErrorKind::MemoryAllocationFailed));
    }

    #[test]
    fn test_nan_cells_compare_equal() {
        let table = NumericTable::from_rows(&[[f64::NAN, 1.0], [2.0, f64::NAN]]).unwrap();
        assert_eq!(table, table.clone());

        let single = NumericTable::from_vec(1, 2, vec![f32::NAN, 0.5]).unwrap();
        assert_eq!(single, NumericTable::from_vec(1, 2, vec![f32::NAN, 0.5]).unwrap());
        assert_ne!(single, NumericTable::from_vec(1, 2, vec![0.0f32, 0.5]).unwrap());
    }

    #[test]
    fn test_write_rows_casts() {
        let mut table = NumericTable::allocate::<i32>(2, 2).unwrap();
        table.write_rows(1, &[1.9f64, -4.2]).unwrap();
        assert_eq!(table.read_all::<i32>().unwrap().as_ref(), &[0, 0, 1, -4]);
    }

    #[test]
    fn test_user_table_rejects_writes() {
        let values: Arc<[f64]> = Arc::from(vec![1.0, 2.0]);
        let mut table = NumericTable::from_user(1, 2, values).unwrap();
        assert_eq!(table.ownership(), Ownership::UserAllocated);
        let err = table.write_rows(0, &[0.0f64, 0.0]).unwrap_err();
        assert!(err.contains(ErrorKind::ReadOnlyBuffer));
    }

    #[test]
    fn test_packed_symmetric_expands() {
        // [[1, 2, 4], [2, 3, 5], [4, 5, 6]]
        let table = NumericTable::packed(3, StorageLayout::PackedSymmetric, vec![1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(table.read_rows::<f64>(0, 1).unwrap().as_ref(), &[1.0, 2.0, 4.0]);
        assert_eq!(table.read_rows::<f64>(2, 1).unwrap().as_ref(), &[4.0, 5.0, 6.0]);
        assert!(table.layout().is_packed());
    }

    #[test]
    fn test_packed_lower_triangular_zero_upper() {
        let table = NumericTable::packed(2, StorageLayout::PackedLowerTriangular, vec![1.0f64, 2.0, 3.0]).unwrap();
        assert_eq!(table.read_all::<f64>().unwrap().as_ref(), &[1.0, 0.0, 2.0, 3.0]);
    }

    #[test]
    fn test_serde_restores_internal_ownership() {
        let values: Arc<[f32]> = Arc::from(vec![1.5f32, 2.5]);
        let table = NumericTable::from_user(2, 1, values).unwrap();
        let json = serde_json::to_string(&table).unwrap();
        let restored: NumericTable = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, table);
        assert_eq!(restored.ownership(), Ownership::InternallyAllocated);
        assert_eq!(restored.data_type(), DataType::F32);
    }

    #[test]
    fn test_serde_rejects_wrong_length() {
        let json = r#"{"n_rows":2,"n_columns":2,"layout":"Dense","data":{"type":"f64","values":[1.0]}}"#;
        assert!(serde_json::from_str::<NumericTable>(json).is_err());
    }
}
