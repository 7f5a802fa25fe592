mod common;

use common::*;
use mlkit_core::{
    Batch, CpuLevel, ErrorKind, FixedCpu, NumericTable, Online, Ownership, PipelineState, StorageLayout,
};

const ROWS: [[f64; 3]; 4] = [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [-1.0, 0.5, 2.0], [0.0, 0.0, 1.0]];

#[test]
fn test_batch_computes_column_sums() {
    let mut batch = Batch::<ColumnSums>::new();
    *batch.input_mut() = input_of(&ROWS);

    let outcome = batch.compute_no_throw();
    assert!(outcome.is_ok());
    assert_eq!(outcome.state(), PipelineState::Computed);
    assert_eq!(
        outcome.context().stage_names(),
        vec!["check_compute_params", "allocate_input", "allocate_result", "check_result", "setup_compute", "kernel"]
    );
    assert_eq!(outcome.context().kernel().map(|(name, _)| name), Some("column_sums/scalar"));

    let result = outcome.into_result().unwrap();
    assert_eq!(sums_of(&result), vec![4.0, 7.5, 12.0]);
    assert_eq!(result.table(SUMS).unwrap().ownership(), Ownership::InternallyAllocated);
}

#[test]
fn test_null_input_reports_single_error() {
    let mut batch = Batch::<ColumnSums>::new();

    let outcome = batch.compute_no_throw();
    assert!(!outcome.is_ok());
    assert!(outcome.output().is_none());
    assert_eq!(outcome.errors().len(), 1);
    assert_eq!(outcome.errors().count(ErrorKind::NullInputNumericTable), 1);
    assert_eq!(outcome.state(), PipelineState::Created);
    // Fails before any kernel is bound
    assert!(batch.kernel_name().is_none());

    let err = batch.compute().unwrap_err();
    assert!(err.has_kind(ErrorKind::NullInputNumericTable));
    assert!(err.to_string().starts_with("Compute failed: Input numeric table is not set"));
}

#[test]
fn test_parameter_check_runs_first() {
    let mut batch = Batch::<ColumnSums>::new();
    batch.parameter_mut().scale = -2.0;

    let errors = batch.compute_no_throw().errors().clone();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.first().unwrap().kind, ErrorKind::IncorrectParameter);
    assert_eq!(errors.first().unwrap().argument.as_deref(), Some("scale"));
}

#[test]
fn test_failed_call_does_not_poison_container() {
    let mut batch = Batch::<ColumnSums>::new();
    batch.input_mut().set(DATA, NumericTable::from_vec(0, 3, Vec::<f64>::new()).unwrap());
    let errors = batch.compute_no_throw().errors().clone();
    assert!(errors.contains(ErrorKind::IncorrectNumberOfObservations));

    *batch.input_mut() = input_of(&ROWS);
    let result = batch.compute().unwrap();
    assert_eq!(sums_of(&result), vec![4.0, 7.5, 12.0]);
    assert!(batch.errors().is_empty());
}

#[test]
fn test_packed_input_is_expanded() {
    let mut batch = Batch::<ColumnSums>::new();
    let packed = NumericTable::packed(2, StorageLayout::PackedSymmetric, vec![1.0f64, 2.0, 3.0]).unwrap();
    batch.input_mut().set(DATA, packed);
    // Dense or packed is accepted here; the kernel reads expanded rows
    let result = batch.compute().unwrap();
    assert_eq!(sums_of(&result)[..2], [3.0, 5.0]);
}

#[test]
fn test_kernel_errors_are_collected() {
    let mut batch = Batch::<ColumnSums>::new();
    *batch.input_mut() = input_of(&[[1.0, f64::NAN, 0.0]]);

    let outcome = batch.compute_no_throw();
    assert!(outcome.errors().contains(ErrorKind::NonFiniteValue));
    assert_eq!(outcome.state(), PipelineState::ResultChecked);
    assert!(outcome.output().is_none());
}

#[test]
fn test_kernel_selected_once_and_reused() {
    let mut batch = Batch::<ColumnSums>::new().with_probe(FixedCpu::new(CpuLevel::Avx512));
    *batch.input_mut() = input_of(&ROWS);

    batch.compute().unwrap();
    let built = kernels_built();
    batch.compute().unwrap();
    batch.compute().unwrap();
    assert_eq!(kernels_built(), built);
    // Only a baseline kernel is registered; wider CPUs fall back to it
    assert_eq!(batch.kernel_level(), Some(CpuLevel::Baseline));
}

#[test]
fn test_unregistered_method() {
    let mut batch = Batch::<ColumnSums>::with_method(SumMethod::Sparse);
    *batch.input_mut() = input_of(&ROWS);

    let outcome = batch.compute_no_throw();
    assert!(outcome.errors().contains(ErrorKind::MethodNotSupported));
    assert_eq!(outcome.state(), PipelineState::ResultAllocated);
}

#[test]
fn test_reset_after_compute() {
    let mut batch = Batch::<ColumnSums>::new();
    batch.set_reset_after_compute(true);
    *batch.input_mut() = input_of(&ROWS);

    let outcome = batch.compute_no_throw();
    assert!(outcome.is_ok());
    assert_eq!(outcome.state(), PipelineState::Reset);
    assert_eq!(batch.state(), PipelineState::Reset);
}

#[test]
fn test_disabled_checks_match_bit_for_bit() {
    let mut checked = Batch::<ColumnSums>::new();
    *checked.input_mut() = input_of(&ROWS);
    let expected = sums_of(&checked.compute().unwrap());

    let mut unchecked = Batch::<ColumnSums>::new();
    unchecked.enable_checks(false);
    *unchecked.input_mut() = input_of(&ROWS);
    let outcome = unchecked.compute_no_throw();
    assert!(!outcome.context().stage_names().contains(&"check_compute_params"));
    assert!(!outcome.context().stage_names().contains(&"check_result"));

    let actual = sums_of(&outcome.into_result().unwrap());
    let bits = |v: &[f64]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
    assert_eq!(bits(&actual), bits(&expected));
}

#[test]
fn test_user_input_is_not_modified() {
    let mut batch = Batch::<ColumnSums>::new();
    *batch.input_mut() = input_of(&ROWS);
    batch.compute().unwrap();

    let data = batch.input().table(DATA).unwrap();
    assert_eq!(data.ownership(), Ownership::UserAllocated);
    assert_eq!(data.value::<f64>(1, 2).unwrap(), 6.0);
}

#[test]
fn test_online_matches_batch_over_concatenation() {
    let mut online = Online::<ColumnMeans>::new();

    *online.input_mut() = input_of(&ROWS[..1]);
    online.compute().unwrap();
    *online.input_mut() = input_of(&ROWS[1..]);
    online.compute().unwrap();
    let means = sums_of(&online.finalize_compute().unwrap());
    assert_eq!(online.state(), PipelineState::Finalized);

    let mut batch = Batch::<ColumnSums>::new();
    *batch.input_mut() = input_of(&ROWS);
    let sums = sums_of(&batch.compute().unwrap());

    for (mean, sum) in means.iter().zip(&sums) {
        assert_relative_eq!(*mean, sum / ROWS.len() as f64, epsilon = 1e-12);
    }
}

#[test]
fn test_online_failure_keeps_partial() {
    let mut online = Online::<ColumnMeans>::new();
    *online.input_mut() = input_of(&ROWS[..2]);
    online.compute().unwrap();
    let before = online.partial_result().unwrap().clone();

    *online.input_mut() = input_of(&[[1.0, f64::INFINITY, 0.0]]);
    let outcome = online.compute_no_throw();
    assert!(outcome.errors().contains(ErrorKind::NonFiniteValue));
    assert_eq!(online.partial_result(), Some(&before));

    // Resume after fixing the input
    *online.input_mut() = input_of(&ROWS[2..]);
    online.compute().unwrap();
    let count = online.partial_result().unwrap().table(COUNT).unwrap().value::<f64>(0, 0).unwrap();
    assert_eq!(count, 4.0);
}

#[test]
fn test_finalize_without_compute() {
    let mut online = Online::<ColumnMeans>::new();
    let err = online.finalize_compute().unwrap_err();
    assert!(err.has_kind(ErrorKind::NullPartialResult));
}

#[test]
fn test_online_reset_after_finalize() {
    let mut online = Online::<ColumnMeans>::new();
    online.set_reset_after_compute(true);
    *online.input_mut() = input_of(&ROWS);
    online.compute().unwrap();
    online.finalize_compute().unwrap();
    assert!(online.partial_result().is_none());

    // Restoring a saved partial result resumes accumulation
    let mut first = Online::<ColumnMeans>::new();
    *first.input_mut() = input_of(&ROWS);
    let saved = first.compute().unwrap();
    online.set_partial_result(saved);
    let means = sums_of(&online.finalize_compute().unwrap());
    assert_relative_eq!(means[0], 1.0, epsilon = 1e-12);
}
