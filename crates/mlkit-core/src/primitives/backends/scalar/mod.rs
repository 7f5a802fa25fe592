//! Scalar backend implementation
//!
//! Baseline backend: plain loops, available on every target.

use crate::numeric::FloatElement;
use crate::primitives::ComputePrimitives;

/// Scalar backend - works for all element types
#[derive(Clone, Copy, Debug, Default)]
pub struct ScalarBackend;

impl ScalarBackend {
    pub fn new() -> Self {
        Self
    }
}

impl<T: FloatElement> ComputePrimitives<T> for ScalarBackend {
    fn backend_name(&self) -> &'static str {
        "scalar"
    }
}
