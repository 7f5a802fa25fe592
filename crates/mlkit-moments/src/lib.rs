//! Low order moments
//!
//! Per-feature minimum, maximum, sum, sum of squares, centered sum of
//! squares, mean, second order raw moment, variance, standard deviation and
//! variation of a numeric table, computed in batch, online and distributed
//! modes through the `mlkit-core` pipeline.
//!
//! # Example
//!
//! ```rust
//! use mlkit_core::{Batch, NumericTable};
//! use mlkit_moments::{result, LowOrderMoments, MomentsInput};
//!
//! let data = NumericTable::from_rows(&[[1.0f64, 10.0], [3.0, 30.0]]).unwrap();
//! let mut moments = Batch::<LowOrderMoments<f64>>::new();
//! *moments.input_mut() = MomentsInput::with_data(data);
//! let out = moments.compute().unwrap();
//!
//! let mean = out.table(result::MEAN).unwrap().read_all::<f64>().unwrap();
//! assert_eq!(mean.as_ref(), &[2.0, 20.0]);
//! ```

mod algorithms;
mod kernel;
mod stats;
mod types;

pub use algorithms::{LowOrderMoments, LowOrderMomentsOnline, MomentsStep1Local, MomentsStep2Master};
pub use kernel::{MomentsKernel, ScalarMomentsKernel};
#[cfg(all(target_arch = "x86_64", feature = "avx2"))]
pub use kernel::Avx2MomentsKernel;
pub use types::{input, partial, result, MomentsInput, MomentsMasterInput, MomentsMethod, MomentsPartial, MomentsResult};
