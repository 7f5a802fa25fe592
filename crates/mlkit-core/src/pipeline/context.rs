//! Per-call execution context
//!
//! A fresh context is created for every compute call. It carries the trace
//! id recorded on the call's tracing span, timings for each pipeline stage,
//! and the kernel that ran.

use crate::dispatch::CpuLevel;
use std::fmt;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Which entry point produced a context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeMode {
    Batch,
    Online,
    Finalize,
}

impl ComputeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComputeMode::Batch => "batch",
            ComputeMode::Online => "online",
            ComputeMode::Finalize => "finalize",
        }
    }
}

impl fmt::Display for ComputeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context of one compute call
#[derive(Debug, Clone)]
pub struct ComputeContext {
    trace_id: Uuid,
    algorithm: &'static str,
    mode: ComputeMode,
    start_time: Instant,
    stage_timings: Vec<(&'static str, Duration)>,
    kernel: Option<(String, CpuLevel)>,
}

impl ComputeContext {
    pub fn new(algorithm: &'static str, mode: ComputeMode) -> Self {
        Self::with_trace_id(algorithm, mode, Uuid::new_v4())
    }

    /// Create a context with a specific trace ID
    pub fn with_trace_id(algorithm: &'static str, mode: ComputeMode, trace_id: Uuid) -> Self {
        Self {
            trace_id,
            algorithm,
            mode,
            start_time: Instant::now(),
            stage_timings: Vec::new(),
            kernel: None,
        }
    }

    pub fn trace_id(&self) -> Uuid {
        self.trace_id
    }

    pub fn algorithm(&self) -> &'static str {
        self.algorithm
    }

    pub fn mode(&self) -> ComputeMode {
        self.mode
    }

    /// Time a stage execution
    pub fn time_stage<F, R>(&mut self, stage: &'static str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = f();
        self.stage_timings.push((stage, start.elapsed()));
        result
    }

    /// Stages run so far, in execution order
    pub fn stage_timings(&self) -> &[(&'static str, Duration)] {
        &self.stage_timings
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stage_timings.iter().map(|(name, _)| *name).collect()
    }

    pub(crate) fn set_kernel(&mut self, name: String, level: CpuLevel) {
        self.kernel = Some((name, level));
    }

    /// Name and level of the kernel that ran, if the call got that far
    pub fn kernel(&self) -> Option<(&str, CpuLevel)> {
        self.kernel.as_ref().map(|(name, level)| (name.as_str(), *level))
    }

    /// Get total elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}
