//! Shared fixtures for integration tests
//!
//! `ColumnSums` is a small algorithm wired through the real pipeline: batch
//! column sums, and an online variant that accumulates sums and counts and
//! finalizes to column means.

#![allow(dead_code)]

use mlkit_core::{
    check_finite, check_numeric_table, kernel_name, typed_arguments, Algorithm, ArgId, ArgumentRole, ComputePrimitives,
    CpuLevel, ErrorDetail, ErrorKind, ErrorList, Kernel, KernelRegistry, NumericTable, OnlineAlgorithm, OnlineKernel,
    Parameter, ScalarBackend, Status, TableSpec,
};
use std::cell::Cell;
use std::sync::Arc;

pub use approx::assert_relative_eq;

typed_arguments! {
    pub struct SumInput { tag: 0x0c01_0001, slots: 1 }
}

typed_arguments! {
    pub struct SumResult { tag: 0x0c01_0002, slots: 1 }
}

typed_arguments! {
    pub struct SumPartial { tag: 0x0c01_0003, slots: 2 }
}

pub const DATA: ArgId<NumericTable> = ArgId::new(0, "data");
pub const SUMS: ArgId<NumericTable> = ArgId::new(0, "sums");
pub const COUNT: ArgId<NumericTable> = ArgId::new(0, "nObservations");
pub const PARTIAL_SUMS: ArgId<NumericTable> = ArgId::new(1, "partialSums");

thread_local! {
    static KERNELS_BUILT: Cell<usize> = const { Cell::new(0) };
}

/// Kernels built so far on this thread, to observe kernel reuse
pub fn kernels_built() -> usize {
    KERNELS_BUILT.with(Cell::get)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SumParameter {
    pub scale: f64,
}

impl Default for SumParameter {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

impl Parameter for SumParameter {
    fn check(&self) -> Status {
        mlkit_core::check_in_range("scale", self.scale, f64::MIN_POSITIVE, f64::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SumMethod {
    #[default]
    Dense,
    /// Declared but without a kernel
    Sparse,
}

#[derive(Debug, Default)]
pub struct SumKernel {
    backend: ScalarBackend,
    pub calls: usize,
}

impl SumKernel {
    fn column_sums(&self, table: &NumericTable, scale: f64) -> Result<Vec<f64>, ErrorList> {
        let values = table.read_all::<f64>()?;
        let p = table.n_columns();
        let mut sums = vec![0.0; p];
        for row in values.chunks(p) {
            if row.iter().any(|v| !v.is_finite()) {
                return Err(ErrorDetail::new(ErrorKind::NonFiniteValue).with_argument("data").into());
            }
            self.backend.axpy(scale, row, &mut sums);
        }
        Ok(sums)
    }
}

fn build_kernel() -> Option<Box<SumKernel>> {
    KERNELS_BUILT.with(|built| built.set(built.get() + 1));
    Some(Box::default())
}

pub struct ColumnSums;

impl Kernel<ColumnSums> for SumKernel {
    fn name(&self) -> String {
        kernel_name("column_sums", "scalar")
    }

    fn compute(&mut self, input: &SumInput, parameter: &SumParameter, result: &mut SumResult) -> Status {
        self.calls += 1;
        let data = input.require_table(DATA, ArgumentRole::Input)?;
        let sums = self.column_sums(data, parameter.scale)?;
        result
            .table_mut(SUMS)
            .ok_or_else(|| ErrorList::from(ErrorDetail::new(ErrorKind::NullResultNumericTable).with_argument("sums")))?
            .write_rows(0, &sums)
    }

    fn reset(&mut self) {
        self.calls = 0;
    }
}

impl Algorithm for ColumnSums {
    type Input = SumInput;
    type Parameter = SumParameter;
    type Output = SumResult;
    type Method = SumMethod;

    const NAME: &'static str = "column_sums";

    fn kernels() -> KernelRegistry<SumMethod, dyn Kernel<Self>> {
        KernelRegistry::new(Self::NAME).register(SumMethod::Dense, CpuLevel::Baseline, || {
            build_kernel().map(|k| k as Box<dyn Kernel<Self>>)
        })
    }

    fn check_input(input: &SumInput, _parameter: &SumParameter) -> Status {
        check_numeric_table(input.table(DATA), &TableSpec::new("data", ArgumentRole::Input))
    }

    fn allocate_result(input: &SumInput, _parameter: &SumParameter) -> Result<SumResult, ErrorList> {
        let data = input.require_table(DATA, ArgumentRole::Input)?;
        let mut result = SumResult::new();
        result.set(SUMS, mlkit_core::allocate_table::<f64>("sums", 1, data.n_columns())?);
        Ok(result)
    }

    fn check_result(input: &SumInput, _parameter: &SumParameter, result: &SumResult) -> Status {
        let p = input.require_table(DATA, ArgumentRole::Input)?.n_columns();
        check_numeric_table(result.table(SUMS), &TableSpec::new("sums", ArgumentRole::Result).rows(1).columns(p))
    }
}

pub struct ColumnMeans;

impl OnlineKernel<ColumnMeans> for SumKernel {
    fn name(&self) -> String {
        kernel_name("column_means", "scalar")
    }

    fn compute(&mut self, input: &SumInput, parameter: &SumParameter, partial: &mut SumPartial) -> Status {
        let data = input.require_table(DATA, ArgumentRole::Input)?;
        let sums = self.column_sums(data, parameter.scale)?;
        let n = data.n_rows() as f64;

        let count = partial.table_mut(COUNT).ok_or(ErrorKind::NullPartialResult)?;
        let previous = count.value::<f64>(0, 0)?;
        count.write_rows(0, &[previous + n])?;

        let acc = partial.table_mut(PARTIAL_SUMS).ok_or(ErrorKind::NullPartialResult)?;
        let mut merged = acc.read_all::<f64>()?.into_owned();
        self.backend.axpy(1.0, &sums, &mut merged);
        acc.write_rows(0, &merged)
    }

    fn finalize(&mut self, partial: &SumPartial, _parameter: &SumParameter, result: &mut SumResult) -> Status {
        let n = partial.require_table(COUNT, ArgumentRole::PartialResult)?.value::<f64>(0, 0)?;
        let sums = partial.require_table(PARTIAL_SUMS, ArgumentRole::PartialResult)?.read_all::<f64>()?;
        let means: Vec<f64> = sums.iter().map(|s| s / n).collect();
        result.table_mut(SUMS).ok_or(ErrorKind::NullResultNumericTable)?.write_rows(0, &means)
    }
}

impl OnlineAlgorithm for ColumnMeans {
    type Input = SumInput;
    type Parameter = SumParameter;
    type PartialResult = SumPartial;
    type Output = SumResult;
    type Method = SumMethod;

    const NAME: &'static str = "column_means";

    fn kernels() -> KernelRegistry<SumMethod, dyn OnlineKernel<Self>> {
        KernelRegistry::new(Self::NAME).register(SumMethod::Dense, CpuLevel::Baseline, || {
            build_kernel().map(|k| k as Box<dyn OnlineKernel<Self>>)
        })
    }

    fn check_input(input: &SumInput, _parameter: &SumParameter) -> Status {
        let data = input.table(DATA);
        check_numeric_table(data, &TableSpec::new("data", ArgumentRole::Input))?;
        if let Some(data) = data {
            check_finite::<f64>(data, "data")?;
        }
        Ok(())
    }

    fn initialize_partial(input: &SumInput, _parameter: &SumParameter) -> Result<SumPartial, ErrorList> {
        let p = input.require_table(DATA, ArgumentRole::Input)?.n_columns();
        let mut partial = SumPartial::new();
        partial.set(COUNT, mlkit_core::allocate_table::<f64>("nObservations", 1, 1)?);
        partial.set(PARTIAL_SUMS, mlkit_core::allocate_table::<f64>("partialSums", 1, p)?);
        Ok(partial)
    }

    fn check_partial(input: &SumInput, _parameter: &SumParameter, partial: &SumPartial) -> Status {
        let p = input.require_table(DATA, ArgumentRole::Input)?.n_columns();
        check_numeric_table(
            partial.table(PARTIAL_SUMS),
            &TableSpec::new("partialSums", ArgumentRole::PartialResult).rows(1).columns(p),
        )
    }

    fn allocate_result(partial: &SumPartial, _parameter: &SumParameter) -> Result<SumResult, ErrorList> {
        let p = partial.require_table(PARTIAL_SUMS, ArgumentRole::PartialResult)?.n_columns();
        let mut result = SumResult::new();
        result.set(SUMS, mlkit_core::allocate_table::<f64>("sums", 1, p)?);
        Ok(result)
    }
}

/// Input holding `rows` as a caller-owned table
pub fn input_of(rows: &[[f64; 3]]) -> SumInput {
    let values: Arc<[f64]> = rows.iter().flatten().copied().collect::<Vec<_>>().into();
    let mut input = SumInput::new();
    input.set(DATA, NumericTable::from_user(rows.len(), 3, values).unwrap());
    input
}

pub fn sums_of(result: &SumResult) -> Vec<f64> {
    result.table(SUMS).unwrap().read_all::<f64>().unwrap().into_owned()
}
