//! Batch algorithm container

use super::algorithm::{Algorithm, Parameter};
use super::context::{ComputeContext, ComputeMode};
use super::state::{Outcome, PipelineState};
use super::{bind_kernel, ComputeSettings};
use crate::dispatch::{CpuLevel, CpuProbe, HostCpu, SelectedKernel};
use crate::error::{ErrorList, Result};
use crate::kernels::Kernel;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info_span, warn};

/// Container running an [`Algorithm`] through the staged pipeline
///
/// The kernel is selected on the first compute call and reused by every
/// later call on the same container. One container must not be driven from
/// several threads at once; use one container per thread instead.
pub struct Batch<A: Algorithm> {
    input: A::Input,
    parameter: A::Parameter,
    method: A::Method,
    settings: ComputeSettings,
    probe: Arc<dyn CpuProbe>,
    kernel: Option<SelectedKernel<dyn Kernel<A>>>,
    state: PipelineState,
    errors: ErrorList,
}

impl<A: Algorithm> Batch<A> {
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
            state: PipelineState::Created,
            errors: ErrorList::new(),
        }
    }

    pub fn with_parameter(parameter: A::Parameter) -> Self {
        let mut batch = Self::new();
        batch.parameter = parameter;
        batch
    }

    /// Use `probe` instead of the host CPU for kernel selection
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

    /// Toggle validation stages; on by default
    pub fn enable_checks(&mut self, enabled: bool) {
        self.settings.enable_checks = enabled;
    }

    pub fn checks_enabled(&self) -> bool {
        self.settings.enable_checks
    }

    /// Reset the kernel after every successful compute
    pub fn set_reset_after_compute(&mut self, reset: bool) {
        self.settings.reset_after_compute = reset;
    }

    pub fn settings(&self) -> ComputeSettings {
        self.settings
    }

    /// Last stage reached by the most recent call
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Errors of the most recent call
    pub fn errors(&self) -> &ErrorList {
        &self.errors
    }

    /// Name of the selected kernel, once one has been selected
    pub fn kernel_name(&self) -> Option<String> {
        self.kernel.as_ref().map(|k| k.kernel.name())
    }

    pub fn kernel_level(&self) -> Option<CpuLevel> {
        self.kernel.as_ref().map(|k| k.level)
    }

    /// Run the pipeline, reporting failures in the returned outcome
    pub fn compute_no_throw(&mut self) -> Outcome<A::Output> {
        let mut context = ComputeContext::new(A::NAME, ComputeMode::Batch);
        let span = info_span!(
            "compute",
            algorithm = A::NAME,
            mode = %ComputeMode::Batch,
            step = A::STEP.map_or("none", |step| step.as_str()),
            trace_id = %context.trace_id()
        );
        let _enter = span.enter();

        self.state = PipelineState::Created;
        match self.run(&mut context) {
            Ok(result) => {
                self.errors = ErrorList::new();
                debug!(state = ?self.state, elapsed = ?context.elapsed(), "compute finished");
                Outcome::success(result, self.state, context)
            }
            Err(errors) => {
                warn!(state = ?self.state, errors = %errors, "compute aborted");
                self.errors = errors.clone();
                Outcome::failure(errors, self.state, context)
            }
        }
    }

    /// Run the pipeline, failing with [`Error::Compute`](crate::Error::Compute)
    pub fn compute(&mut self) -> Result<A::Output> {
        self.compute_no_throw().into_result()
    }

    fn run(&mut self, context: &mut ComputeContext) -> std::result::Result<A::Output, ErrorList> {
        let Self {
            input,
            parameter,
            method,
            settings,
            probe,
            kernel,
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
            debug!("parameters and input checked");
        }

        context.time_stage("allocate_input", || A::allocate_input(input, parameter))?;
        *state = PipelineState::InputAllocated;

        let mut result = context.time_stage("allocate_result", || A::allocate_result(input, parameter))?;
        *state = PipelineState::ResultAllocated;
        debug!("result allocated");

        let selected = bind_kernel(kernel, A::kernels, *method, probe.as_ref())?;
        context.set_kernel(selected.kernel.name(), selected.level);

        if checks {
            context.time_stage("check_result", || A::check_result(input, parameter, &result))?;
            *state = PipelineState::ResultChecked;
        }

        context.time_stage("setup_compute", || A::setup_compute(input, parameter, &mut result))?;
        context.time_stage("kernel", || selected.kernel.compute(input, parameter, &mut result))?;
        *state = PipelineState::Computed;

        if settings.reset_after_compute {
            selected.kernel.reset();
            *state = PipelineState::Reset;
        }
        Ok(result)
    }
}

impl<A: Algorithm> Default for Batch<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Algorithm> fmt::Debug for Batch<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batch")
            .field("algorithm", &A::NAME)
            .field("method", &self.method)
            .field("parameter", &self.parameter)
            .field("settings", &self.settings)
            .field("kernel", &self.kernel_name())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
