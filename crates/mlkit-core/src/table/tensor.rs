//! N-dimensional homogeneous tensor

use super::buffer::{same_values, Ownership, TableData};
use super::numeric_table::StoredValues;
use crate::error::{ErrorDetail, ErrorKind, ErrorList};
use crate::numeric::{DataType, Numeric};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;

/// Row-major N-dimensional container sharing the table buffer model
#[derive(Debug, Clone)]
pub struct Tensor {
    dimensions: Vec<usize>,
    data: TableData,
}

fn element_count(dimensions: &[usize]) -> Option<usize> {
    dimensions.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

impl Tensor {
    /// Zeroed, internally allocated tensor
    pub fn allocate<T: Numeric>(dimensions: &[usize]) -> Result<Self, ErrorList> {
        let len = element_count(dimensions).ok_or_else(|| ErrorList::from(ErrorKind::MemoryAllocationFailed))?;
        Ok(Self {
            dimensions: dimensions.to_vec(),
            data: TableData::allocate(T::DATA_TYPE, len)?,
        })
    }

    /// Tensor taking ownership of row-major `values`
    pub fn from_vec<T: Numeric>(dimensions: &[usize], values: Vec<T>) -> Result<Self, ErrorList> {
        Self::check_len(dimensions, values.len())?;
        Ok(Self {
            dimensions: dimensions.to_vec(),
            data: TableData::from_vec(values),
        })
    }

    /// Tensor over caller-owned row-major `values`
    pub fn from_user<T: Numeric>(dimensions: &[usize], values: Arc<[T]>) -> Result<Self, ErrorList> {
        Self::check_len(dimensions, values.len())?;
        Ok(Self {
            dimensions: dimensions.to_vec(),
            data: TableData::from_user(values),
        })
    }

    fn check_len(dimensions: &[usize], len: usize) -> Result<(), ErrorList> {
        let expected = element_count(dimensions).unwrap_or(usize::MAX);
        if expected != len {
            return Err(ErrorDetail::mismatch(ErrorKind::IncorrectSizeOfDimensionInTensor, "values", expected, len).into());
        }
        Ok(())
    }

    pub fn dimensions(&self) -> &[usize] {
        &self.dimensions
    }

    pub fn n_dimensions(&self) -> usize {
        self.dimensions.len()
    }

    /// Total number of elements
    pub fn size(&self) -> usize {
        element_count(&self.dimensions).unwrap_or(0)
    }

    pub fn data_type(&self) -> DataType {
        self.data.data_type()
    }

    pub fn ownership(&self) -> Ownership {
        self.data.ownership()
    }

    /// All elements cast to `T`
    pub fn read<T: Numeric>(&self) -> Cow<'_, [T]> {
        self.data.read(0..self.data.len())
    }

    /// Slices `start..start + count` along the first dimension
    pub fn read_subtensor<T: Numeric>(&self, start: usize, count: usize) -> Result<Cow<'_, [T]>, ErrorList> {
        let first = self.dimensions.first().copied().unwrap_or(0);
        if start + count > first {
            return Err(ErrorDetail::mismatch(ErrorKind::IncorrectSizeOfDimensionInTensor, "dimension 0", first, start + count)
                .with_index(0)
                .into());
        }
        let stride = element_count(&self.dimensions[1..]).unwrap_or(0);
        Ok(self.data.read(start * stride..(start + count) * stride))
    }

    /// Overwrite all elements, casting into the stored type
    pub fn write<T: Numeric>(&mut self, values: &[T]) -> Result<(), ErrorList> {
        Self::check_len(&self.dimensions, values.len())?;
        self.data.write(0, values)
    }

    /// Direct mutable view when the stored type is `T`
    pub fn values_mut<T: Numeric>(&mut self) -> Result<&mut [T], ErrorList> {
        self.data.as_mut()
    }
}

impl PartialEq for Tensor {
    fn eq(&self, other: &Self) -> bool {
        self.dimensions == other.dimensions
            && self.data_type() == other.data_type()
            && same_values(&self.read::<f64>(), &other.read::<f64>())
    }
}

#[derive(Serialize, Deserialize)]
struct TensorRepr {
    dimensions: Vec<usize>,
    data: StoredValues,
}

impl Serialize for Tensor {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        TensorRepr {
            dimensions: self.dimensions.clone(),
            data: StoredValues::capture(&self.data),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Tensor {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = TensorRepr::deserialize(deserializer)?;
        if let Some(len) = repr.data.len() {
            Self::check_len(&repr.dimensions, len).map_err(serde::de::Error::custom)?;
        }
        Ok(Self {
            dimensions: repr.dimensions,
            data: repr.data.restore(),
        })
    }
}
