//! AVX2 backend
//!
//! The reductions live in [`reduce`], written once for both float types;
//! [`Avx2Reduce`] keeps the backend generic over the element type.

mod reduce;

use crate::numeric::FloatElement;
use crate::primitives::ComputePrimitives;

pub use reduce::Avx2Reduce;

/// AVX2 + FMA backend for x86_64 processors
///
/// Only obtainable through [`Avx2Backend::try_new`], which verifies the
/// running CPU, so holding a value proves the intrinsics are safe to call.
#[derive(Clone, Copy, Debug)]
pub struct Avx2Backend {
    _verified: (),
}

impl Avx2Backend {
    /// Backend for the running CPU, or `None` if it lacks AVX2 or FMA
    pub fn try_new() -> Option<Self> {
        Self::is_available().then_some(Self { _verified: () })
    }

    /// Check if AVX2 and FMA are available on this CPU
    pub fn is_available() -> bool {
        is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma")
    }
}

// Every FloatElement is Avx2Reduce when this backend is compiled in
impl<T: FloatElement> ComputePrimitives<T> for Avx2Backend {
    fn backend_name(&self) -> &'static str {
        "avx2"
    }

    fn simd_width(&self) -> usize {
        <T as Avx2Reduce>::AVX2_LANES
    }

    fn sum(&self, data: &[T]) -> T {
        // Safety: CPU support verified in try_new()
        unsafe { <T as Avx2Reduce>::reduce_sum(data) }
    }

    fn dot_product(&self, a: &[T], b: &[T]) -> T {
        // Safety: CPU support verified in try_new()
        unsafe { <T as Avx2Reduce>::reduce_dot(a, b) }
    }

    fn squared_distance(&self, a: &[T], b: &[T]) -> T {
        // Safety: CPU support verified in try_new()
        unsafe { <T as Avx2Reduce>::reduce_squared_distance(a, b) }
    }
}
