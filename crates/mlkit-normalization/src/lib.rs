//! Normalization of numeric tables
//!
//! Both algorithms rescale each column independently and produce a table of
//! the input's shape:
//!
//! - [`minmax`]: linear map of `[min, max]` onto `[lower_bound, upper_bound]`
//! - [`zscore`]: centering on the mean and division by the standard deviation
//!
//! # Example
//!
//! ```rust
//! use mlkit_core::{Batch, NumericTable};
//! use mlkit_normalization::minmax::{MinMax, MinMaxInput, MinMaxParameter, NORMALIZED_DATA};
//!
//! let data = NumericTable::from_rows(&[[1.0f64, 10.0], [2.0, 20.0], [3.0, 40.0]]).unwrap();
//!
//! let mut minmax = Batch::<MinMax<f64>>::with_parameter(MinMaxParameter::new(-1.0, 1.0));
//! *minmax.input_mut() = MinMaxInput::with_data(data);
//! let out = minmax.compute().unwrap();
//!
//! let first = out.table(NORMALIZED_DATA).unwrap().read_column::<f64>(0).unwrap();
//! assert_eq!(first, vec![-1.0, 0.0, 1.0]);
//! ```

pub mod minmax;
mod scaling;
pub mod zscore;

pub use minmax::{MinMax, MinMaxInput, MinMaxMethod, MinMaxParameter, MinMaxResult};
pub use zscore::{ZScore, ZScoreInput, ZScoreMethod, ZScoreParameter, ZScoreResult};
