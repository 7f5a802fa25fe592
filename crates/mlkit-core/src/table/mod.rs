//! Numeric containers
//!
//! Tables and tensors give typed, shaped access to contiguous memory whose
//! ownership is tracked by [`Ownership`]. Caller memory is shared through an
//! `Arc` and never written; library memory is a `Vec` released on drop.

mod buffer;
mod numeric_table;
mod tensor;

pub use buffer::{Buffer, Ownership, TableData};
pub use numeric_table::{LayoutMask, NumericTable, StorageLayout};
pub use tensor::Tensor;
