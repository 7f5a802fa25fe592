//! Ownership-tagged element storage shared by tables and tensors

use crate::error::{ErrorDetail, ErrorKind, ErrorList};
use crate::numeric::{DataType, Numeric};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;

/// Who is responsible for releasing a container's memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ownership {
    /// No memory behind the container
    NotAllocated,
    /// Caller-provided memory; never released by the library
    UserAllocated,
    /// Library-owned memory, released when the container is dropped
    InternallyAllocated,
}

/// Element storage with an ownership tag
///
/// `User` buffers are shared with the caller through an `Arc`, so the caller's
/// handle keeps the allocation alive and the library only ever reads it.
/// `Internal` buffers are plain vectors owned by the container.
#[derive(Debug, Clone)]
pub enum Buffer<T> {
    NotAllocated,
    User(Arc<[T]>),
    Internal(Vec<T>),
}

impl<T: Numeric> Buffer<T> {
    /// Allocate a zeroed internal buffer
    pub fn allocate(len: usize) -> Result<Self, ErrorList> {
        let mut values = Vec::new();
        values.try_reserve_exact(len).map_err(|e| {
            ErrorList::from(
                ErrorDetail::new(ErrorKind::MemoryAllocationFailed)
                    .with_dimensions(len, 0)
                    .with_message(e.to_string()),
            )
        })?;
        values.resize(len, T::zero());
        Ok(Buffer::Internal(values))
    }

    pub fn ownership(&self) -> Ownership {
        match self {
            Buffer::NotAllocated => Ownership::NotAllocated,
            Buffer::User(_) => Ownership::UserAllocated,
            Buffer::Internal(_) => Ownership::InternallyAllocated,
        }
    }

    pub fn as_slice(&self) -> &[T] {
        match self {
            Buffer::NotAllocated => &[],
            Buffer::User(values) => values,
            Buffer::Internal(values) => values,
        }
    }

    /// Mutable access, refused for caller-owned memory
    pub fn as_mut_slice(&mut self) -> Result<&mut [T], ErrorList> {
        match self {
            Buffer::NotAllocated => Ok(&mut []),
            Buffer::User(_) => Err(ErrorKind::ReadOnlyBuffer.into()),
            Buffer::Internal(values) => Ok(values),
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Type-erased storage: one [`Buffer`] per supported element type
#[derive(Debug, Clone)]
pub enum TableData {
    F32(Buffer<f32>),
    F64(Buffer<f64>),
    I32(Buffer<i32>),
}

macro_rules! with_buffer {
    ($data:expr, $buf:ident => $body:expr) => {
        match $data {
            TableData::F32($buf) => $body,
            TableData::F64($buf) => $body,
            TableData::I32($buf) => $body,
        }
    };
}

/// Borrow when the stored type matches, otherwise convert by value
fn view<S: Numeric, T: Numeric>(values: &[S]) -> Cow<'_, [T]> {
    if S::DATA_TYPE == T::DATA_TYPE {
        Cow::Borrowed(bytemuck::cast_slice(values))
    } else {
        Cow::Owned(values.iter().map(|&v| T::cast_from(v)).collect())
    }
}

fn view_mut<S: Numeric, T: Numeric>(values: &mut [S]) -> Option<&mut [T]> {
    if S::DATA_TYPE == T::DATA_TYPE {
        Some(bytemuck::cast_slice_mut(values))
    } else {
        None
    }
}

fn store<S: Numeric, T: Numeric>(dst: &mut [S], src: &[T]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = S::cast_from(s);
    }
}

impl TableData {
    /// Placeholder storage of the given element type
    pub fn unallocated(data_type: DataType) -> Self {
        match data_type {
            DataType::F32 => TableData::F32(Buffer::NotAllocated),
            DataType::F64 => TableData::F64(Buffer::NotAllocated),
            DataType::I32 => TableData::I32(Buffer::NotAllocated),
        }
    }

    /// Zeroed internal storage of `len` elements of `data_type`
    pub fn allocate(data_type: DataType, len: usize) -> Result<Self, ErrorList> {
        Ok(match data_type {
            DataType::F32 => TableData::F32(Buffer::allocate(len)?),
            DataType::F64 => TableData::F64(Buffer::allocate(len)?),
            DataType::I32 => TableData::I32(Buffer::allocate(len)?),
        })
    }

    /// Take ownership of `values`
    pub fn from_vec<T: Numeric>(values: Vec<T>) -> Self {
        T::into_storage(Buffer::Internal(values))
    }

    /// Share caller-owned `values`
    pub fn from_user<T: Numeric>(values: Arc<[T]>) -> Self {
        T::into_storage(Buffer::User(values))
    }

    pub fn data_type(&self) -> DataType {
        match self {
            TableData::F32(_) => DataType::F32,
            TableData::F64(_) => DataType::F64,
            TableData::I32(_) => DataType::I32,
        }
    }

    pub fn ownership(&self) -> Ownership {
        with_buffer!(self, buf => buf.ownership())
    }

    pub fn len(&self) -> usize {
        with_buffer!(self, buf => buf.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Elements in `range`, converted to `T` when needed
    pub fn read<T: Numeric>(&self, range: std::ops::Range<usize>) -> Cow<'_, [T]> {
        with_buffer!(self, buf => view(&buf.as_slice()[range]))
    }

    /// Direct mutable access when the stored type is `T`
    pub fn as_mut<T: Numeric>(&mut self) -> Result<&mut [T], ErrorList> {
        let stored = self.data_type();
        with_buffer!(self, buf => {
            let values = buf.as_mut_slice()?;
            view_mut(values).ok_or_else(|| {
                ErrorList::from(
                    ErrorDetail::new(ErrorKind::IncorrectDataType)
                        .with_message(format!("stored {}, requested {}", stored.name(), T::DATA_TYPE.name())),
                )
            })
        })
    }

    /// Cast `values` into the stored type starting at `offset`
    pub fn write<T: Numeric>(&mut self, offset: usize, values: &[T]) -> Result<(), ErrorList> {
        with_buffer!(self, buf => {
            let dst = buf.as_mut_slice()?;
            store(&mut dst[offset..offset + values.len()], values);
            Ok(())
        })
    }

    /// Deep copy into library-owned storage
    pub fn to_internal(&self) -> Self {
        match self {
            TableData::F32(buf) => TableData::F32(copy_internal(buf)),
            TableData::F64(buf) => TableData::F64(copy_internal(buf)),
            TableData::I32(buf) => TableData::I32(copy_internal(buf)),
        }
    }
}

/// Element-wise equality where NaN matches NaN
pub(crate) fn same_values(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y || (x.is_nan() && y.is_nan()))
}

fn copy_internal<T: Numeric>(buf: &Buffer<T>) -> Buffer<T> {
    match buf {
        Buffer::NotAllocated => Buffer::NotAllocated,
        other => Buffer::Internal(other.as_slice().to_vec()),
    }
}
