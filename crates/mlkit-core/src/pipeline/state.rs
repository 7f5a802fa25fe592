//! Pipeline state machine and call outcome

use super::context::ComputeContext;
use crate::error::{Error, ErrorKind, ErrorList, Result};
use serde::{Deserialize, Serialize};

/// Last stage a pipeline reached
///
/// Batch calls end in `Computed` (or `Reset` when reset-after-compute is on);
/// online and distributed flows end in `Finalized` after an explicit
/// finalize call. A failed call stays at the last stage that succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PipelineState {
    Created,
    ParamsChecked,
    InputAllocated,
    ResultAllocated,
    ResultChecked,
    Computed,
    Reset,
    Finalized,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Computed | PipelineState::Reset | PipelineState::Finalized)
    }
}

/// Result of a no-throw compute call
///
/// Either `output` is set and `errors` is empty, or `output` is `None` and
/// `errors` explains why.
#[derive(Debug)]
pub struct Outcome<T> {
    output: Option<T>,
    errors: ErrorList,
    state: PipelineState,
    context: ComputeContext,
}

impl<T> Outcome<T> {
    pub(crate) fn success(output: T, state: PipelineState, context: ComputeContext) -> Self {
        Self {
            output: Some(output),
            errors: ErrorList::new(),
            state,
            context,
        }
    }

    pub(crate) fn failure(errors: ErrorList, state: PipelineState, context: ComputeContext) -> Self {
        Self {
            output: None,
            errors,
            state,
            context,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty() && self.output.is_some()
    }

    pub fn output(&self) -> Option<&T> {
        self.output.as_ref()
    }

    pub fn errors(&self) -> &ErrorList {
        &self.errors
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn context(&self) -> &ComputeContext {
        &self.context
    }

    /// Convert into the throwing form
    pub fn into_result(self) -> Result<T> {
        match self.output {
            Some(output) if self.errors.is_empty() => Ok(output),
            _ if self.errors.is_empty() => Err(Error::from(ErrorKind::Computation)),
            _ => Err(Error::Compute(self.errors)),
        }
    }

    pub fn into_parts(self) -> (Option<T>, ErrorList, ComputeContext) {
        (self.output, self.errors, self.context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ComputeMode;

    #[test]
    fn test_state_order() {
        assert!(PipelineState::Created < PipelineState::ParamsChecked);
        assert!(PipelineState::ResultChecked < PipelineState::Computed);
        assert!(PipelineState::Finalized.is_terminal());
        assert!(!PipelineState::ResultAllocated.is_terminal());
    }

    #[test]
    fn test_outcome_into_result() {
        let ctx = ComputeContext::new("test", ComputeMode::Batch);
        let ok = Outcome::success(5, PipelineState::Computed, ctx.clone());
        assert!(ok.is_ok());
        assert_eq!(ok.into_result().unwrap(), 5);

        let failed: Outcome<i32> =
            Outcome::failure(ErrorKind::NullInputNumericTable.into(), PipelineState::Created, ctx);
        assert!(!failed.is_ok());
        let err = failed.into_result().unwrap_err();
        assert!(err.has_kind(ErrorKind::NullInputNumericTable));
        assert!(err.to_string().contains("Compute failed"));
    }
}
