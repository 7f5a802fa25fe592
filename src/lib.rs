//! mlkit: numerical algorithms on a shared compute framework
//!
//! Every algorithm runs through the same pipeline: arguments are checked,
//! results allocated, a kernel picked for the running CPU and the result
//! checked again. Algorithms that split across nodes expose a local step and
//! a master step whose partial results travel through the same argument model.
//!
//! ## Crates
//!
//! - [`framework`]: containers, arguments, validation, dispatch and the pipeline
//! - [`moments`]: low order moments of each column
//! - [`kmeans`]: initialization, Lloyd iterations and assignment
//! - [`normalization`]: min-max and z-score scaling
//! - [`layers`]: element-wise activation layers
//!
//! ## Example
//!
//! ```rust
//! use mlkit::framework::{Batch, NumericTable};
//! use mlkit::moments::{result, LowOrderMoments, MomentsInput};
//!
//! let data = NumericTable::from_rows(&[[1.0f64, 4.0], [3.0, 8.0]]).unwrap();
//! let mut moments = Batch::<LowOrderMoments<f64>>::new();
//! *moments.input_mut() = MomentsInput::with_data(data);
//! let out = moments.compute().unwrap();
//! assert_eq!(out.table(result::MEAN).unwrap().read_all::<f64>().unwrap().as_ref(), &[2.0, 6.0]);
//! ```

pub use mlkit_core as framework;
pub use mlkit_kmeans as kmeans;
pub use mlkit_layers as layers;
pub use mlkit_moments as moments;
pub use mlkit_normalization as normalization;

pub use mlkit_core::{Batch, Error, ErrorKind, ErrorList, NumericTable, Online, Result, Tensor};
