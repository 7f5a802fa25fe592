//! Vector primitives shared by every kernel

use crate::numeric::FloatElement;
use std::fmt::Debug;

/// Low-level vector operations with a scalar default for each
///
/// Backends override the operations they accelerate. Reductions are
/// accumulated in `T`, so results depend only on the backend and the input.
pub trait ComputePrimitives<T: FloatElement>: Clone + Debug + Send + Sync {
    /// Name of this backend, reported in kernel names and logs
    fn backend_name(&self) -> &'static str;

    /// Number of elements processed per instruction
    fn simd_width(&self) -> usize {
        1
    }

    /// Sum all elements in a slice
    fn sum(&self, data: &[T]) -> T {
        data.iter().fold(T::zero(), |acc, &x| acc + x)
    }

    /// Sum of squared elements
    fn sum_of_squares(&self, data: &[T]) -> T {
        self.dot_product(data, data)
    }

    /// Dot product over the common prefix of `a` and `b`
    fn dot_product(&self, a: &[T], b: &[T]) -> T {
        a.iter()
            .zip(b.iter())
            .fold(T::zero(), |acc, (&x, &y)| acc + x * y)
    }

    /// Squared Euclidean distance between `a` and `b`
    fn squared_distance(&self, a: &[T], b: &[T]) -> T {
        a.iter().zip(b.iter()).fold(T::zero(), |acc, (&x, &y)| {
            let d = x - y;
            acc + d * d
        })
    }

    /// `y += alpha * x`
    fn axpy(&self, alpha: T, x: &[T], y: &mut [T]) {
        for (yi, &xi) in y.iter_mut().zip(x.iter()) {
            *yi += alpha * xi;
        }
    }

    /// Smallest and largest element, `None` for an empty slice
    fn min_max(&self, data: &[T]) -> Option<(T, T)> {
        let (&first, rest) = data.split_first()?;
        Some(rest.iter().fold((first, first), |(lo, hi), &x| {
            (if x < lo { x } else { lo }, if x > hi { x } else { hi })
        }))
    }

    /// Index of the smallest element; ties resolve to the lowest index
    fn argmin(&self, data: &[T]) -> Option<usize> {
        let mut best: Option<(usize, T)> = None;
        for (i, &x) in data.iter().enumerate() {
            match best {
                Some((_, b)) if !(x < b) => {}
                _ => best = Some((i, x)),
            }
        }
        best.map(|(i, _)| i)
    }
}
