//! K-means clustering
//!
//! - [`init`]: initial centroids, batch or distributed
//! - [`KMeansBatch`]: Lloyd iterations over a whole data set
//! - [`KMeansStep1Local`] / [`KMeansStep2Master`]: one distributed iteration
//! - [`KMeansAssign`]: nearest centroid of new observations, given a model
//!
//! # Example
//!
//! ```rust
//! use mlkit_core::{Batch, NumericTable};
//! use mlkit_kmeans::init::{InitBatch, InitInput, InitParameter, CENTROIDS};
//! use mlkit_kmeans::{result, KMeansBatch, KMeansInput, KMeansParameter};
//! use std::sync::Arc;
//!
//! let data = Arc::new(NumericTable::from_rows(&[[0.0f64, 0.0], [10.0, 10.0], [0.5, 0.0], [10.5, 10.0]]).unwrap());
//!
//! let mut init = Batch::<InitBatch<f64>>::with_parameter(InitParameter::new(2));
//! *init.input_mut() = InitInput::with_data(Arc::clone(&data));
//! let start = init.compute().unwrap();
//!
//! let mut kmeans = Batch::<KMeansBatch<f64>>::with_parameter(KMeansParameter::new(2, 10));
//! *kmeans.input_mut() = KMeansInput::with_data(data, Arc::clone(start.get(CENTROIDS).unwrap()));
//! let out = kmeans.compute().unwrap();
//!
//! let assignments = out.table(result::ASSIGNMENTS).unwrap().read_all::<i32>().unwrap();
//! assert_eq!(assignments.as_ref(), &[0, 1, 0, 1]);
//! ```

mod algorithms;
pub mod assign;
mod clusters;
pub mod init;
mod kernel;
mod types;

pub use algorithms::{KMeansBatch, KMeansStep1Local, KMeansStep2Master};
pub use assign::{AssignInput, AssignResult, KMeansAssign};
pub use kernel::{LloydKernel, ScalarLloydKernel};
#[cfg(all(target_arch = "x86_64", feature = "avx2"))]
pub use kernel::Avx2LloydKernel;
pub use types::{
    input, model, partial, result, KMeansInput, KMeansMasterInput, KMeansMethod, KMeansModelData, KMeansParameter,
    KMeansPartial, KMeansResult, MODEL_TAG,
};
