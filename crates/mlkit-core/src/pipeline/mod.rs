//! Staged compute pipeline shared by every algorithm
//!
//! One generic pipeline drives all algorithms. The algorithm itself is a
//! type-level strategy ([`Algorithm`] or [`OnlineAlgorithm`]) supplying
//! checks, allocation and a kernel registry; the containers ([`Batch`],
//! [`Online`]) own the arguments, the selected kernel and the per-call
//! error list.
//!
//! ```text
//! Created -> ParamsChecked -> InputAllocated -> ResultAllocated
//!         -> ResultChecked -> Computed -> (Reset | Finalized)
//! ```
//!
//! Any error before the kernel stage aborts the call without running the
//! kernel. Distributed steps are ordinary algorithms whose inputs are
//! [`KeyedCollection`](crate::argument::KeyedCollection)s of partial results.

mod algorithm;
mod batch;
mod context;
mod online;
mod state;

pub use algorithm::{Algorithm, Method, OnlineAlgorithm, Parameter};
pub use batch::Batch;
pub use context::{ComputeContext, ComputeMode};
pub use online::Online;
pub use state::{Outcome, PipelineState};

use crate::dispatch::{CpuProbe, KernelRegistry, SelectedKernel};
use crate::error::{ErrorDetail, ErrorKind, ErrorList};
use crate::numeric::Numeric;
use crate::table::NumericTable;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Per-container switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeSettings {
    /// Run the check stages before the kernel
    pub enable_checks: bool,
    /// Reset kernel state once a result has been produced
    pub reset_after_compute: bool,
}

impl Default for ComputeSettings {
    fn default() -> Self {
        Self {
            enable_checks: true,
            reset_after_compute: false,
        }
    }
}

/// Select the kernel on first use, then keep reusing it
pub(crate) fn bind_kernel<'a, M, K>(
    slot: &'a mut Option<SelectedKernel<K>>,
    registry: impl FnOnce() -> KernelRegistry<M, K>,
    method: M,
    probe: &dyn CpuProbe,
) -> Result<&'a mut SelectedKernel<K>, ErrorList>
where
    M: Copy + PartialEq + fmt::Debug,
    K: ?Sized,
{
    if slot.is_none() {
        let level = probe.level();
        debug!(method = ?method, level = %level, "binding kernel");
        *slot = Some(registry().select(method, level)?);
    }
    slot.as_mut()
        .ok_or_else(|| ErrorList::from(ErrorDetail::new(ErrorKind::MethodNotSupported).with_argument("method")))
}

/// Allocate a zeroed result table of `rows x columns`
///
/// A result that needs observations cannot have zero rows; that is reported
/// as [`ErrorKind::IncorrectNumberOfObservations`] instead of producing an
/// empty table.
pub fn allocate_table<T: Numeric>(name: &str, rows: usize, columns: usize) -> Result<Arc<NumericTable>, ErrorList> {
    if rows == 0 {
        return Err(ErrorDetail::new(ErrorKind::IncorrectNumberOfObservations)
            .with_argument(name)
            .with_message("result table would have no rows")
            .into());
    }
    if columns == 0 {
        return Err(ErrorDetail::new(ErrorKind::IncorrectNumberOfColumns)
            .with_argument(name)
            .with_message("result table would have no columns")
            .into());
    }
    NumericTable::allocate::<T>(rows, columns)
        .map(Arc::new)
        .map_err(|errors| errors.into_iter().map(|e| e.with_argument(name)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Ownership;

    #[test]
    fn test_default_settings() {
        let settings = ComputeSettings::default();
        assert!(settings.enable_checks);
        assert!(!settings.reset_after_compute);
    }

    #[test]
    fn test_allocate_table() {
        let table = allocate_table::<f64>("mean", 1, 3).unwrap();
        assert_eq!(table.n_rows(), 1);
        assert_eq!(table.n_columns(), 3);
        assert_eq!(table.ownership(), Ownership::InternallyAllocated);
        assert!(table.read_all::<f64>().unwrap().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_allocate_zero_rows() {
        let errors = allocate_table::<f64>("assignments", 0, 1).unwrap_err();
        assert_eq!(errors.len(), 1);
        let detail = errors.first().unwrap();
        assert_eq!(detail.kind, ErrorKind::IncorrectNumberOfObservations);
        assert_eq!(detail.argument.as_deref(), Some("assignments"));
    }
}
