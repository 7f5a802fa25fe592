//! Concrete backend types
//!
//! No Box, no dyn: each backend is a plain type and kernels are generic over
//! it, so the choice between backends happens once, when a kernel is built.

pub mod scalar;
#[cfg(all(target_arch = "x86_64", feature = "avx2"))]
pub mod avx2;

pub use scalar::ScalarBackend;
#[cfg(all(target_arch = "x86_64", feature = "avx2"))]
pub use avx2::Avx2Backend;
