//! Assignment of new observations with a trained clustering model

use crate::kernel::lloyd_registry;
use crate::types::{data_spec, model, KMeansMethod, MODEL_TAG};
use mlkit_core::{
    allocate_table, check_numeric_table, typed_arguments, Algorithm, ArgId, ArgumentRole, ErrorDetail, ErrorKind,
    ErrorList, FloatElement, Kernel, KernelRegistry, LayoutMask, Model, NumericTable, Status, TableSpec,
};
use std::marker::PhantomData;
use std::sync::Arc;

pub const DATA: ArgId<NumericTable> = ArgId::new(0, "data");
pub const MODEL: ArgId<Model> = ArgId::new(1, "model");

pub const ASSIGNMENTS: ArgId<NumericTable> = ArgId::new(0, "assignments");
pub const OBJECTIVE_FUNCTION: ArgId<NumericTable> = ArgId::new(1, "objectiveFunction");

typed_arguments! {
    pub struct AssignInput { tag: 0x0002_0006, slots: 2 }
}

typed_arguments! {
    /// Nearest cluster of every observation and the resulting objective function
    pub struct AssignResult { tag: 0x0002_0007, slots: 2 }
}

impl AssignInput {
    pub fn with_model(data: impl Into<Arc<NumericTable>>, model: Arc<Model>) -> Self {
        let mut out = Self::new();
        out.set(DATA, data);
        out.set(MODEL, model);
        out
    }
}

/// Nearest centroid of each row, given a model
pub struct KMeansAssign<T>(PhantomData<fn() -> T>);

impl<T: FloatElement> Algorithm for KMeansAssign<T> {
    type Input = AssignInput;
    type Parameter = ();
    type Output = AssignResult;
    type Method = KMeansMethod;

    const NAME: &'static str = "kmeans_assign";

    fn kernels() -> KernelRegistry<KMeansMethod, dyn Kernel<Self>> {
        lloyd_registry!(Self::NAME, T, dyn Kernel<Self>)
    }

    fn check_input(input: &AssignInput, _parameter: &()) -> Status {
        check_numeric_table(input.table(DATA), &data_spec())?;
        let trained = input.require(MODEL, ErrorKind::NullModel)?;
        if trained.tag() != MODEL_TAG {
            return Err(ErrorDetail::new(ErrorKind::IncorrectSerializationTag)
                .with_argument(MODEL.name())
                .with_message(format!("expected a clustering model, found tag {}", trained.tag()))
                .into());
        }
        let p = input.require_table(DATA, ArgumentRole::Input)?.n_columns();
        check_numeric_table(
            trained.table(model::CENTROIDS),
            &TableSpec::new(model::CENTROIDS.name(), ArgumentRole::Input)
                .columns(p)
                .forbid(LayoutMask::PACKED),
        )
    }

    fn allocate_result(input: &AssignInput, _parameter: &()) -> Result<AssignResult, ErrorList> {
        let n = input.require_table(DATA, ArgumentRole::Input)?.n_rows();
        let mut out = AssignResult::new();
        out.set(ASSIGNMENTS, allocate_table::<i32>(ASSIGNMENTS.name(), n, 1)?);
        out.set(OBJECTIVE_FUNCTION, allocate_table::<T>(OBJECTIVE_FUNCTION.name(), 1, 1)?);
        Ok(out)
    }

    fn check_result(input: &AssignInput, _parameter: &(), result: &AssignResult) -> Status {
        let n = input.require_table(DATA, ArgumentRole::Input)?.n_rows();
        check_numeric_table(
            result.table(ASSIGNMENTS),
            &TableSpec::new(ASSIGNMENTS.name(), ArgumentRole::Result).rows(n).columns(1),
        )?;
        check_numeric_table(
            result.table(OBJECTIVE_FUNCTION),
            &TableSpec::new(OBJECTIVE_FUNCTION.name(), ArgumentRole::Result).rows(1).columns(1),
        )
    }
}
