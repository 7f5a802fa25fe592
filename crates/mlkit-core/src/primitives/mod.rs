//! Computational primitives with compile-time dispatch
//!
//! # Architecture
//!
//! - One `ComputePrimitives<T>` trait with scalar defaults for every operation
//! - Concrete backend types: `ScalarBackend` and, behind the `avx2` feature on
//!   x86_64, `Avx2Backend`
//! - Kernels are generic over the backend; the kernel registry decides at
//!   runtime which instantiation to build
//!
//! # Usage
//!
//! ```rust
//! use mlkit_core::primitives::{ComputePrimitives, ScalarBackend};
//!
//! let backend = ScalarBackend::new();
//! let d = backend.squared_distance(&[1.0f64, 2.0], &[1.0, 4.0]);
//! assert_eq!(d, 4.0);
//! ```

pub mod backends;
pub mod traits;

pub use backends::ScalarBackend;
#[cfg(all(target_arch = "x86_64", feature = "avx2"))]
pub use backends::Avx2Backend;
pub use traits::ComputePrimitives;

/// Name of the widest backend usable on this machine
pub fn best_backend_name() -> &'static str {
    #[cfg(all(target_arch = "x86_64", feature = "avx2"))]
    {
        if Avx2Backend::is_available() {
            return "avx2";
        }
    }
    "scalar"
}
