//! Element types stored in numeric containers
//!
//! Tables and tensors store one of a small closed set of element types
//! ([`DataType`]). Accessors are generic over [`Numeric`] and convert between
//! the stored type and the requested type by value cast, never by
//! reinterpreting bytes. Kernels are generic over [`FloatElement`], which is
//! the element type an algorithm is instantiated with.

use crate::table::{Buffer, TableData};
use bytemuck::Pod;
use num_traits::{Float, Num, NumCast};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::ops::AddAssign;

/// Runtime tag for the element type of a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    F32,
    F64,
    I32,
}

impl DataType {
    /// Size of one element in bytes
    pub fn size_of(&self) -> usize {
        match self {
            DataType::F32 | DataType::I32 => 4,
            DataType::F64 => 8,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DataType::F32 => "f32",
            DataType::F64 => "f64",
            DataType::I32 => "i32",
        }
    }
}

/// Base trait for element types of numeric containers
pub trait Numeric:
    Pod + Num + NumCast + Copy + PartialOrd + Debug + Default + Send + Sync + 'static
{
    /// Tag identifying this type at runtime
    const DATA_TYPE: DataType;

    /// Convert from f64 with `as` semantics (saturating for integers)
    fn from_f64(val: f64) -> Self;

    /// Widen to f64
    fn as_f64(&self) -> f64;

    /// Check if value is finite (always true for integers)
    fn is_finite_value(&self) -> bool;

    /// Wrap a typed buffer into type-erased storage
    fn into_storage(buffer: Buffer<Self>) -> TableData;

    /// Value-preserving cast between element types
    #[inline]
    fn cast_from<U: Numeric>(value: U) -> Self {
        Self::from_f64(value.as_f64())
    }
}

impl Numeric for f64 {
    const DATA_TYPE: DataType = DataType::F64;

    fn into_storage(buffer: Buffer<Self>) -> TableData {
        TableData::F64(buffer)
    }

    #[inline]
    fn from_f64(val: f64) -> Self {
        val
    }

    #[inline]
    fn as_f64(&self) -> f64 {
        *self
    }

    #[inline]
    fn is_finite_value(&self) -> bool {
        f64::is_finite(*self)
    }
}

impl Numeric for f32 {
    const DATA_TYPE: DataType = DataType::F32;

    fn into_storage(buffer: Buffer<Self>) -> TableData {
        TableData::F32(buffer)
    }

    #[inline]
    fn from_f64(val: f64) -> Self {
        val as f32
    }

    #[inline]
    fn as_f64(&self) -> f64 {
        *self as f64
    }

    #[inline]
    fn is_finite_value(&self) -> bool {
        f32::is_finite(*self)
    }
}

impl Numeric for i32 {
    const DATA_TYPE: DataType = DataType::I32;

    fn into_storage(buffer: Buffer<Self>) -> TableData {
        TableData::I32(buffer)
    }

    #[inline]
    fn from_f64(val: f64) -> Self {
        val as i32
    }

    #[inline]
    fn as_f64(&self) -> f64 {
        *self as f64
    }

    #[inline]
    fn is_finite_value(&self) -> bool {
        true // Integers are always finite
    }
}

/// Bounds the compiled-in SIMD backends place on element types
#[cfg(all(target_arch = "x86_64", feature = "avx2"))]
pub trait SimdElement: crate::primitives::backends::avx2::Avx2Reduce {}

#[cfg(all(target_arch = "x86_64", feature = "avx2"))]
impl<T: crate::primitives::backends::avx2::Avx2Reduce> SimdElement for T {}

/// Bounds the compiled-in SIMD backends place on element types
#[cfg(not(all(target_arch = "x86_64", feature = "avx2")))]
pub trait SimdElement {}

#[cfg(not(all(target_arch = "x86_64", feature = "avx2")))]
impl<T> SimdElement for T {}

/// Floating-point element type an algorithm is instantiated with
pub trait FloatElement: Numeric + Float + AddAssign + std::iter::Sum + SimdElement {}

impl FloatElement for f32 {}
impl FloatElement for f64 {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_tags() {
        assert_eq!(<f64 as Numeric>::DATA_TYPE, DataType::F64);
        assert_eq!(<f32 as Numeric>::DATA_TYPE, DataType::F32);
        assert_eq!(<i32 as Numeric>::DATA_TYPE, DataType::I32);
        assert_eq!(DataType::F64.size_of(), 8);
        assert_eq!(DataType::I32.name(), "i32");
    }

    #[test]
    fn test_cast_preserves_value() {
        assert_eq!(f64::cast_from(7i32), 7.0);
        assert_eq!(i32::cast_from(3.9f64), 3);
        assert_eq!(i32::cast_from(-3.9f32), -3);
        assert_eq!(f32::cast_from(0.5f64), 0.5f32);
        // Saturating, not reinterpreting
        assert_eq!(i32::cast_from(1e20f64), i32::MAX);
    }

    #[test]
    fn test_finiteness() {
        assert!(1.0f64.is_finite_value());
        assert!(!f64::NAN.is_finite_value());
        assert!(!f32::INFINITY.is_finite_value());
        assert!(42i32.is_finite_value());
    }
}
