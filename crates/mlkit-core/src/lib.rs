//! Core framework for mlkit algorithms
//!
//! This crate provides the machinery every algorithm plugs into: numeric
//! containers, the argument model, validation, CPU-level kernel dispatch and
//! the staged compute pipeline with its batch, online and distributed modes.
//!
//! # Architecture Overview
//!
//! 1. **Containers** - [`NumericTable`] and [`Tensor`] with ownership tracking
//! 2. **Arguments** - tagged [`ArgumentCollection`]s addressed by typed [`ArgId`]s
//! 3. **Validation** - checks returning a [`Status`] of structured errors
//! 4. **Kernels** - [`ComputePrimitives`] backends, [`ExecutionEngine`]s and a
//!    [`KernelRegistry`] keyed by method and [`CpuLevel`]
//! 5. **Pipeline** - [`Batch`] and [`Online`] containers driving an
//!    [`Algorithm`] through check, allocate, compute and finalize stages
//!
//! # Example
//!
//! ```rust
//! use mlkit_core::{ArgumentRole, NumericTable, TableSpec, check_numeric_table, ErrorKind};
//!
//! let table = NumericTable::from_rows(&[[1.0f64, 2.0], [3.0, 4.0]]).unwrap();
//! let spec = TableSpec::new("data", ArgumentRole::Input).columns(2);
//! assert!(check_numeric_table(Some(&table), &spec).is_ok());
//!
//! let errors = check_numeric_table(None, &spec).unwrap_err();
//! assert!(errors.contains(ErrorKind::NullInputNumericTable));
//! ```

pub mod argument;
pub mod dispatch;
pub mod distributed;
pub mod error;
pub mod execution;
pub mod kernels;
pub mod numeric;
pub mod pipeline;
pub mod primitives;
pub mod serialization;
pub mod table;
pub mod validation;

// Re-export core types
pub use error::{ensure, Error, ErrorCategory, ErrorDetail, ErrorKind, ErrorList, Result, Status};
pub use numeric::{DataType, FloatElement, Numeric};

pub use table::{Buffer, LayoutMask, NumericTable, Ownership, StorageLayout, TableData, Tensor};

pub use argument::{
    ArgId, ArgumentCollection, ArgumentRole, ArgumentTag, BlockId, DataCollection, KeyedCollection, Model,
    TypedArguments, Value, ValueKind,
};

pub use validation::{
    check_at_least, check_bounds, check_finite, check_in_range, check_numeric_table, check_tensor,
    check_tensor_like, TableSpec, Validator,
};

pub use execution::{
    default_engine, scalar_sequential, DefaultEngine, ExecutionEngine, ExecutionStrategy, SequentialEngine,
    DEFAULT_BLOCK_ROWS,
};
#[cfg(feature = "parallel")]
pub use execution::ParallelEngine;

pub use primitives::{best_backend_name, ComputePrimitives, ScalarBackend};
#[cfg(all(target_arch = "x86_64", feature = "avx2"))]
pub use primitives::Avx2Backend;

pub use dispatch::{CpuFeatures, CpuLevel, CpuProbe, FixedCpu, HostCpu, KernelFactory, KernelRegistry, SelectedKernel};
pub use kernels::{kernel_name, Kernel, OnlineKernel};

pub use pipeline::{
    allocate_table, Algorithm, Batch, ComputeContext, ComputeMode, ComputeSettings, Method, Online,
    OnlineAlgorithm, Outcome, Parameter, PipelineState,
};

pub use distributed::{DistributedStep, PartialResultsInput};
