use mlkit_core::{Batch, KeyedCollection, NumericTable, Online};
use mlkit_moments::{result, MomentsInput, MomentsMasterInput, MomentsPartial, MomentsStep1Local, MomentsStep2Master};
use proptest::prelude::*;

fn local_partial(rows: &[f64], p: usize) -> MomentsPartial {
    let mut local = Batch::<MomentsStep1Local<f64>>::new();
    *local.input_mut() = MomentsInput::with_data(NumericTable::from_vec(rows.len() / p, p, rows.to_vec()).unwrap());
    local.compute().unwrap()
}

fn merged_bits(partials: &[(u64, MomentsPartial)]) -> Vec<u64> {
    let mut collection = KeyedCollection::new();
    for (block, partial) in partials {
        collection.insert_arguments(*block, partial.clone());
    }
    let mut master = Online::<MomentsStep2Master<f64>>::new();
    *master.input_mut() = MomentsMasterInput::with_partials(collection);
    master.compute().unwrap();
    let out = master.finalize_compute().unwrap();

    result::ALL
        .iter()
        .flat_map(|&id| out.table(id).unwrap().read_all::<f64>().unwrap().into_owned())
        .map(f64::to_bits)
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn master_ignores_arrival_order(
        values in proptest::collection::vec(-1.0e3f64..1.0e3, 2..60),
        parts in 1usize..6,
        rotation in 0usize..6,
    ) {
        let p = 2;
        let n = values.len() / p;
        let values = &values[..n * p];
        let per_part = n.div_ceil(parts).max(1);

        let partials: Vec<(u64, MomentsPartial)> = values
            .chunks(per_part * p)
            .enumerate()
            .map(|(block, rows)| (block as u64, local_partial(rows, p)))
            .collect();

        let mut arrived = partials.clone();
        arrived.reverse();
        let shift = rotation % arrived.len();
        arrived.rotate_left(shift);

        prop_assert_eq!(merged_bits(&partials), merged_bits(&arrived));
    }
}
