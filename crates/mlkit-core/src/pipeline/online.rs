//! Online (accumulating) algorithm container

use super::algorithm::{OnlineAlgorithm, Parameter};
use super::context::{ComputeContext, ComputeMode};
use super::state::{Outcome, PipelineState};
use super::{bind_kernel, ComputeSettings};
use crate::argument::ArgumentRole;
use crate::dispatch::{CpuLevel, CpuProbe, HostCpu, SelectedKernel};
use crate::error::{ErrorDetail, ErrorList, Result};
use crate::kernels::OnlineKernel;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info_span, warn};

/// Container accumulating an [`OnlineAlgorithm`] over several compute calls
///
/// Each `compute` folds the current input into the partial result; calls
/// on one container are totally ordered. A failed call leaves the partial
/// result exactly as it was before the call. `finalize_compute` turns the
/// accumulated partial result into the final result.
pub struct Online<A: OnlineAlgorithm> {
    input: A::Input,
    parameter: A::Parameter,
    method: A::Method,
    settings: ComputeSettings,
    probe: Arc<dyn CpuProbe>,
    kernel: Option<SelectedKernel<dyn OnlineKernel<A>>>,
    partial: Option<A::PartialResult>,
    state: PipelineState,
    errors: ErrorList,
}

impl<A: OnlineAlgorithm> Online<A> {
    pub fn new() -> Self {
        Self::with_method(A::Method::default())
    }

    pub fn with_method(method: A::Method) -> Self {
        Self {
            input: A::Input::default(),
            parameter: A::Parameter::default(),
            method,
            settings: ComputeSettings::default(),
            probe: Arc::new(HostCpu),
            kernel: None,
            partial: None,
            state: PipelineState::Created,
            errors: ErrorList::new(),
        }
    }

    pub fn with_parameter(parameter: A::Parameter) -> Self {
        let mut online = Self::new();
        online.parameter = parameter;
        online
    }

    pub fn with_probe(mut self, probe: impl CpuProbe + 'static) -> Self {
        self.probe = Arc::new(probe);
        self.kernel = None;
        self
    }

    pub fn method(&self) -> A::Method {
        self.method
    }

    pub fn input(&self) -> &A::Input {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut A::Input {
        &mut self.input
    }

    pub fn parameter(&self) -> &A::Parameter {
        &self.parameter
    }

    pub fn parameter_mut(&mut self) -> &mut A::Parameter {
        &mut self.parameter
    }

    pub fn enable_checks(&mut self, enabled: bool) {
        self.settings.enable_checks = enabled;
    }

    /// Clear the accumulated state after every successful finalize
    pub fn set_reset_after_compute(&mut self, reset: bool) {
        self.settings.reset_after_compute = reset;
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn errors(&self) -> &ErrorList {
        &self.errors
    }

    pub fn kernel_name(&self) -> Option<String> {
        self.kernel.as_ref().map(|k| k.kernel.name())
    }

    pub fn kernel_level(&self) -> Option<CpuLevel> {
        self.kernel.as_ref().map(|k| k.level)
    }

    /// Accumulated state, `None` before the first successful compute
    pub fn partial_result(&self) -> Option<&A::PartialResult> {
        self.partial.as_ref()
    }

    /// Resume from a previously saved partial result
    pub fn set_partial_result(&mut self, partial: A::PartialResult) {
        self.partial = Some(partial);
    }

    /// Forget all accumulated state
    pub fn reset(&mut self) {
        self.partial = None;
        if let Some(selected) = self.kernel.as_mut() {
            selected.kernel.reset();
        }
        self.state = PipelineState::Created;
        self.errors = ErrorList::new();
    }

    /// Fold the current input into the partial result
    pub fn compute_no_throw(&mut self) -> Outcome<A::PartialResult> {
        let mut context = ComputeContext::new(A::NAME, ComputeMode::Online);
        let span = info_span!(
            "compute",
            algorithm = A::NAME,
            mode = %ComputeMode::Online,
            step = A::STEP.map_or("none", |step| step.as_str()),
            trace_id = %context.trace_id()
        );
        let _enter = span.enter();

        self.state = PipelineState::Created;
        match self.run_compute(&mut context) {
            Ok(partial) => {
                self.errors = ErrorList::new();
                self.partial = Some(partial.clone());
                debug!(state = ?self.state, "partial result updated");
                Outcome::success(partial, self.state, context)
            }
            Err(errors) => {
                warn!(state = ?self.state, errors = %errors, "compute aborted");
                self.errors = errors.clone();
                Outcome::failure(errors, self.state, context)
            }
        }
    }

    pub fn compute(&mut self) -> Result<A::PartialResult> {
        self.compute_no_throw().into_result()
    }

    /// Produce the final result from the accumulated state
    pub fn finalize_compute_no_throw(&mut self) -> Outcome<A::Output> {
        let mut context = ComputeContext::new(A::NAME, ComputeMode::Finalize);
        let span = info_span!(
            "compute",
            algorithm = A::NAME,
            mode = %ComputeMode::Finalize,
            step = A::STEP.map_or("none", |step| step.as_str()),
            trace_id = %context.trace_id()
        );
        let _enter = span.enter();

        match self.run_finalize(&mut context) {
            Ok(result) => {
                self.errors = ErrorList::new();
                self.state = PipelineState::Finalized;
                if self.settings.reset_after_compute {
                    self.partial = None;
                    if let Some(selected) = self.kernel.as_mut() {
                        selected.kernel.reset();
                    }
                }
                debug!("finalized");
                Outcome::success(result, self.state, context)
            }
            Err(errors) => {
                warn!(state = ?self.state, errors = %errors, "finalize aborted");
                self.errors = errors.clone();
                Outcome::failure(errors, self.state, context)
            }
        }
    }

    pub fn finalize_compute(&mut self) -> Result<A::Output> {
        self.finalize_compute_no_throw().into_result()
    }

    fn run_compute(&mut self, context: &mut ComputeContext) -> std::result::Result<A::PartialResult, ErrorList> {
        let Self {
            input,
            parameter,
            method,
            settings,
            probe,
            kernel,
            partial,
            state,
            ..
        } = self;
        let checks = settings.enable_checks;

        if checks {
            context.time_stage("check_compute_params", || {
                parameter.check()?;
                A::check_input(input, parameter)
            })?;
            *state = PipelineState::ParamsChecked;
        }
        *state = PipelineState::InputAllocated;

        // Work on a copy so a failed call leaves the accumulator untouched
        let mut next = match partial {
            Some(existing) => existing.clone(),
            None => context.time_stage("initialize_partial", || A::initialize_partial(input, parameter))?,
        };
        *state = PipelineState::ResultAllocated;

        let selected = bind_kernel(kernel, A::kernels, *method, probe.as_ref())?;
        context.set_kernel(selected.kernel.name(), selected.level);

        if checks {
            context.time_stage("check_partial", || A::check_partial(input, parameter, &next))?;
            *state = PipelineState::ResultChecked;
        }

        context.time_stage("kernel", || selected.kernel.compute(input, parameter, &mut next))?;
        *state = PipelineState::Computed;
        Ok(next)
    }

    fn run_finalize(&mut self, context: &mut ComputeContext) -> std::result::Result<A::Output, ErrorList> {
        let Self {
            parameter,
            method,
            settings,
            probe,
            kernel,
            partial,
            state,
            ..
        } = self;
        let checks = settings.enable_checks;

        let partial = partial.as_ref().ok_or_else(|| {
            ErrorList::from(
                ErrorDetail::new(ArgumentRole::PartialResult.null_table_kind())
                    .with_message("finalize called before any compute"),
            )
        })?;

        if checks {
            context.time_stage("check_parameter", || parameter.check())?;
        }

        let mut result = context.time_stage("allocate_result", || A::allocate_result(partial, parameter))?;
        let selected = bind_kernel(kernel, A::kernels, *method, probe.as_ref())?;
        context.set_kernel(selected.kernel.name(), selected.level);

        if checks {
            context.time_stage("check_result", || A::check_result(partial, parameter, &result))?;
            *state = PipelineState::ResultChecked;
        }

        context.time_stage("finalize", || selected.kernel.finalize(partial, parameter, &mut result))?;
        Ok(result)
    }
}

impl<A: OnlineAlgorithm> Default for Online<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: OnlineAlgorithm> fmt::Debug for Online<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Online")
            .field("algorithm", &A::NAME)
            .field("method", &self.method)
            .field("parameter", &self.parameter)
            .field("settings", &self.settings)
            .field("has_partial", &self.partial.is_some())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
