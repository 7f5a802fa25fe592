use mlkit_core::argument::ArgId;
use mlkit_core::distributed::downcast_all;
use mlkit_core::{
    check_numeric_table, typed_arguments, ArgumentRole, KeyedCollection, LayoutMask, NumericTable, StorageLayout,
    TableSpec,
};
use proptest::prelude::*;

typed_arguments! {
    struct Block { tag: 0x0c02_0001, slots: 1 }
}

const TOTAL: ArgId<NumericTable> = ArgId::new(0, "total");

fn table_strategy() -> impl Strategy<Value = Option<NumericTable>> {
    prop_oneof![
        Just(None),
        (0usize..4, 0usize..4).prop_map(|(r, c)| Some(NumericTable::allocate::<f64>(r, c).unwrap())),
        (1usize..4).prop_map(|n| {
            let len = n * (n + 1) / 2;
            Some(NumericTable::packed(n, StorageLayout::PackedLowerTriangular, vec![1.0f32; len]).unwrap())
        }),
    ]
}

proptest! {
    #[test]
    fn validation_is_idempotent(
        table in table_strategy(),
        rows in proptest::option::of(0usize..4),
        columns in proptest::option::of(0usize..4),
        forbid_packed in any::<bool>(),
    ) {
        let mut spec = TableSpec::new("data", ArgumentRole::Input);
        if let Some(rows) = rows {
            spec = spec.rows(rows);
        }
        if let Some(columns) = columns {
            spec = spec.columns(columns);
        }
        if forbid_packed {
            spec = spec.forbid(LayoutMask::PACKED);
        }

        let first = check_numeric_table(table.as_ref(), &spec);
        let second = check_numeric_table(table.as_ref(), &spec);
        prop_assert_eq!(&first, &second);
        // At most one record per argument
        if let Err(errors) = first {
            prop_assert_eq!(errors.len(), 1);
        }
    }

    #[test]
    fn canonical_order_ignores_insertion_order(
        values in proptest::collection::vec(-1.0e6f64..1.0e6, 1..16),
        seed in any::<u64>(),
    ) {
        let entries: Vec<(u64, f64)> = values.iter().enumerate().map(|(i, v)| (i as u64, *v)).collect();
        let mut shuffled = entries.clone();
        // Deterministic permutation from the seed
        let n = shuffled.len();
        for i in (1..n).rev() {
            let j = (seed.wrapping_mul(6364136223846793005).wrapping_add(i as u64) % (i as u64 + 1)) as usize;
            shuffled.swap(i, j);
        }

        let reduce = |entries: &[(u64, f64)]| {
            let mut collection = KeyedCollection::new();
            for (block, value) in entries {
                let mut partial = Block::new();
                partial.set(TOTAL, NumericTable::scalar(*value));
                collection.insert_arguments(*block, partial);
            }
            downcast_all::<Block>(&collection)
                .unwrap()
                .iter()
                .map(|(_, p)| p.table(TOTAL).unwrap().value::<f64>(0, 0).unwrap())
                .fold(0.0, |acc, v| acc + v)
        };

        prop_assert_eq!(reduce(&entries).to_bits(), reduce(&shuffled).to_bits());
    }
}
