use approx::assert_relative_eq;
use mlkit_core::serialization::{restore, save};
use mlkit_core::{Batch, ErrorKind, NumericTable, StorageLayout};
use mlkit_moments::{result as moments, LowOrderMoments, MomentsInput, MomentsMethod};
use mlkit_normalization::minmax::{self, MinMax, MinMaxInput, MinMaxParameter, MinMaxResult};
use mlkit_normalization::zscore::{self, ZScore, ZScoreInput, ZScoreMethod, ZScoreParameter};
use proptest::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;

const ROWS: [[f64; 3]; 4] = [[1.0, 10.0, 5.0], [2.0, 20.0, 5.0], [4.0, 30.0, 5.0], [5.0, 50.0, 5.0]];

fn random_table(seed: u64, n: usize, p: usize) -> Arc<NumericTable> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let values = (0..n * p).map(|i| rng.gen_range(-10.0..10.0) * (1 + i % p) as f64).collect();
    Arc::new(NumericTable::from_vec(n, p, values).unwrap())
}

fn column(table: &NumericTable, j: usize) -> Vec<f64> {
    table.read_column::<f64>(j).unwrap()
}

fn run_minmax(data: impl Into<Arc<NumericTable>>, parameter: MinMaxParameter) -> MinMaxResult {
    let mut algorithm = Batch::<MinMax<f64>>::with_parameter(parameter);
    *algorithm.input_mut() = MinMaxInput::with_data(data);
    algorithm.compute().unwrap()
}

fn run_zscore(data: impl Into<Arc<NumericTable>>, method: ZScoreMethod) -> NumericTable {
    let mut algorithm = Batch::<ZScore<f64>>::with_method(method);
    *algorithm.input_mut() = ZScoreInput::with_data(data);
    let out = algorithm.compute().unwrap();
    out.table(zscore::NORMALIZED_DATA).unwrap().clone()
}

#[test]
fn test_minmax_unit_interval() {
    let out = run_minmax(NumericTable::from_rows(&ROWS).unwrap(), MinMaxParameter::default());
    let normalized = out.table(minmax::NORMALIZED_DATA).unwrap();

    assert_eq!((normalized.n_rows(), normalized.n_columns()), (4, 3));
    assert_eq!(column(normalized, 0), vec![0.0, 0.25, 0.75, 1.0]);
    assert_eq!(column(normalized, 1), vec![0.0, 0.25, 0.5, 1.0]);
    // Constant column lands on the lower bound
    assert_eq!(column(normalized, 2), vec![0.0; 4]);
}

#[test]
fn test_minmax_custom_bounds() {
    let out = run_minmax(NumericTable::from_rows(&ROWS).unwrap(), MinMaxParameter::new(-2.0, 2.0));
    let normalized = out.table(minmax::NORMALIZED_DATA).unwrap();
    assert_eq!(column(normalized, 0), vec![-2.0, -1.0, 1.0, 2.0]);
    assert_eq!(column(normalized, 2), vec![-2.0; 4]);
}

#[test]
fn test_minmax_moments_methods_agree() {
    let data = random_table(1, 500, 4);
    let default = run_minmax(Arc::clone(&data), MinMaxParameter::default());
    let single_pass = run_minmax(
        data,
        MinMaxParameter {
            moments_method: MomentsMethod::SinglePassDense,
            ..MinMaxParameter::default()
        },
    );
    assert_eq!(
        default.table(minmax::NORMALIZED_DATA).unwrap(),
        single_pass.table(minmax::NORMALIZED_DATA).unwrap()
    );
}

#[test]
fn test_minmax_bounds_check() {
    for (lower, upper) in [(1.0, 1.0), (2.0, -2.0)] {
        let mut algorithm = Batch::<MinMax<f64>>::with_parameter(MinMaxParameter::new(lower, upper));
        *algorithm.input_mut() = MinMaxInput::with_data(NumericTable::from_rows(&ROWS).unwrap());
        let errors = algorithm.compute_no_throw().errors().clone();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.first().unwrap().kind, ErrorKind::LowerBoundGreaterThanOrEqualToUpperBound);
    }
}

#[test]
fn test_input_checks() {
    let mut algorithm = Batch::<MinMax<f64>>::new();
    let errors = algorithm.compute_no_throw().errors().clone();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.first().unwrap().kind, ErrorKind::NullInputNumericTable);

    *algorithm.input_mut() = MinMaxInput::with_data(NumericTable::allocate::<f64>(0, 3).unwrap());
    assert!(algorithm.compute_no_throw().errors().contains(ErrorKind::IncorrectNumberOfObservations));

    let mut standardize = Batch::<ZScore<f64>>::new();
    *standardize.input_mut() =
        ZScoreInput::with_data(NumericTable::packed(2, StorageLayout::PackedSymmetric, vec![1.0f64, 2.0, 3.0]).unwrap());
    assert!(standardize.compute_no_throw().errors().contains(ErrorKind::IncorrectTypeOfNumericTable));
}

#[test]
fn test_zscore_known_values() {
    let data = NumericTable::from_rows(&[[1.0f64, 7.0], [2.0, 7.0], [3.0, 7.0]]).unwrap();
    let normalized = run_zscore(data, ZScoreMethod::DefaultDense);
    assert_eq!(column(&normalized, 0), vec![-1.0, 0.0, 1.0]);
    assert_eq!(column(&normalized, 1), vec![0.0; 3]);
}

#[test]
fn test_zscore_methods_agree() {
    let data = random_table(2, 3000, 5);
    let default = run_zscore(Arc::clone(&data), ZScoreMethod::DefaultDense);
    let sums = run_zscore(data, ZScoreMethod::SumDense);

    let default = default.read_all::<f64>().unwrap();
    let sums = sums.read_all::<f64>().unwrap();
    for (a, b) in default.iter().zip(sums.iter()) {
        assert_relative_eq!(*a, *b, epsilon = 1e-9);
    }
}

#[test]
fn test_zscore_output_is_standardized() {
    for method in [ZScoreMethod::DefaultDense, ZScoreMethod::SumDense] {
        let normalized = run_zscore(random_table(3, 800, 3), method);

        let mut check = Batch::<LowOrderMoments<f64>>::new();
        *check.input_mut() = MomentsInput::with_data(normalized);
        let stats = check.compute().unwrap();
        let mean = stats.table(moments::MEAN).unwrap().read_all::<f64>().unwrap().into_owned();
        let deviation = stats.table(moments::STANDARD_DEVIATION).unwrap().read_all::<f64>().unwrap().into_owned();
        for j in 0..3 {
            assert_relative_eq!(mean[j], 0.0, epsilon = 1e-12);
            assert_relative_eq!(deviation[j], 1.0, epsilon = 1e-12);
        }
    }
}

#[test]
fn test_zscore_single_row() {
    for method in [ZScoreMethod::DefaultDense, ZScoreMethod::SumDense] {
        let normalized = run_zscore(NumericTable::from_rows(&[[3.0f64, -4.0]]).unwrap(), method);
        assert_eq!(normalized.read_all::<f64>().unwrap().as_ref(), &[0.0, 0.0]);
    }
}

#[test]
fn test_single_precision_input() {
    let data = NumericTable::from_rows(&[[1.0f32], [2.0], [3.0]]).unwrap();
    let mut algorithm = Batch::<ZScore<f32>>::with_parameter(ZScoreParameter::default());
    *algorithm.input_mut() = ZScoreInput::with_data(data);
    let out = algorithm.compute().unwrap();
    let normalized = out.table(zscore::NORMALIZED_DATA).unwrap();
    assert_eq!(normalized.read_all::<f32>().unwrap().as_ref(), &[-1.0, 0.0, 1.0]);
}

#[test]
fn test_disabled_checks_match() {
    let data = random_table(4, 100, 2);
    let expected = run_zscore(Arc::clone(&data), ZScoreMethod::DefaultDense);

    let mut unchecked = Batch::<ZScore<f64>>::new();
    unchecked.enable_checks(false);
    *unchecked.input_mut() = ZScoreInput::with_data(data);
    let out = unchecked.compute().unwrap();
    assert_eq!(out.table(zscore::NORMALIZED_DATA).unwrap(), &expected);
}

#[test]
fn test_result_round_trip() {
    let out = run_minmax(NumericTable::from_rows(&ROWS).unwrap(), MinMaxParameter::default());
    let restored: MinMaxResult = restore(&save(&out).unwrap()).unwrap();
    assert_eq!(restored, out);
}

proptest! {
    #[test]
    fn minmax_output_within_bounds(
        values in prop::collection::vec(-1e6f64..1e6, 2..60),
        lower in -100.0f64..100.0,
        width in 0.01f64..100.0,
    ) {
        let upper = lower + width;
        let n = values.len() / 2;
        let data = NumericTable::from_vec(n, 2, values[..n * 2].to_vec()).unwrap();
        let out = run_minmax(data, MinMaxParameter::new(lower, upper));
        let normalized = out.table(minmax::NORMALIZED_DATA).unwrap().read_all::<f64>().unwrap();

        let slack = 1e-9 * (lower.abs() + upper.abs() + 1.0);
        for &v in normalized.iter() {
            prop_assert!(v >= lower - slack && v <= upper + slack, "{v} outside [{lower}, {upper}]");
        }
    }
}
