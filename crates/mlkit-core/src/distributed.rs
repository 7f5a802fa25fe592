//! Composition of distributed steps
//!
//! A distributed algorithm is a few ordinary pipeline stages: local steps
//! run per data block and produce partial results, master steps receive a
//! [`KeyedCollection`] mapping block ids to those partial results.
//!
//! Master steps validate their collection in a fixed order: presence,
//! non-emptiness, the subtype of every entry, then cross-entry invariants.
//! Reductions walk entries in block-id order so that the merged result does
//! not depend on the order in which partial results were inserted.

use crate::argument::{ArgId, ArgumentCollection, BlockId, KeyedCollection, TypedArguments, Value};
use crate::error::{ErrorDetail, ErrorKind, ErrorList, Status};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Position of a stage in a distributed computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DistributedStep {
    Step1Local,
    Step2Master,
    Step3Local,
    Step4Master,
}

impl DistributedStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistributedStep::Step1Local => "step1_local",
            DistributedStep::Step2Master => "step2_master",
            DistributedStep::Step3Local => "step3_local",
            DistributedStep::Step4Master => "step4_master",
        }
    }

    pub fn is_master(&self) -> bool {
        matches!(self, DistributedStep::Step2Master | DistributedStep::Step4Master)
    }
}

impl fmt::Display for DistributedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed builder for the keyed collection a master step consumes
#[derive(Debug, Clone, PartialEq)]
pub struct PartialResultsInput<P> {
    collection: KeyedCollection,
    _marker: PhantomData<fn() -> P>,
}

impl<P: TypedArguments> PartialResultsInput<P> {
    pub fn new() -> Self {
        Self {
            collection: KeyedCollection::new(),
            _marker: PhantomData,
        }
    }

    /// Wrap an existing collection; entries are checked on [`downcast_all`](Self::downcast_all)
    pub fn from_collection(collection: KeyedCollection) -> Self {
        Self {
            collection,
            _marker: PhantomData,
        }
    }

    /// Add the partial result computed on `block`
    pub fn add(&mut self, block: BlockId, partial: P) {
        self.collection.insert_arguments(block, partial);
    }

    pub fn with(mut self, block: BlockId, partial: P) -> Self {
        self.add(block, partial);
        self
    }

    pub fn len(&self) -> usize {
        self.collection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collection.is_empty()
    }

    pub fn collection(&self) -> &KeyedCollection {
        &self.collection
    }

    pub fn into_collection(self) -> KeyedCollection {
        self.collection
    }

    pub fn downcast_all(&self) -> Result<Vec<(BlockId, P)>, ErrorList> {
        downcast_all(&self.collection)
    }
}

impl<P: TypedArguments> Default for PartialResultsInput<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: TypedArguments> From<PartialResultsInput<P>> for Arc<KeyedCollection> {
    fn from(input: PartialResultsInput<P>) -> Self {
        Arc::new(input.collection)
    }
}

/// Checked conversion of every entry to the partial-result subtype `P`
///
/// Entries are checked in insertion order and a failure reports the
/// insertion index of the first bad entry. The returned entries are sorted
/// by block id.
pub fn downcast_all<P: TypedArguments>(collection: &KeyedCollection) -> Result<Vec<(BlockId, P)>, ErrorList> {
    let mut partials = Vec::with_capacity(collection.len());
    for (index, (block, value)) in collection.iter().enumerate() {
        let arguments = match value {
            Value::Arguments(arguments) if arguments.tag() == P::TAG => ArgumentCollection::clone(arguments),
            other => {
                return Err(ErrorDetail::new(ErrorKind::IncorrectElementInPartialResultCollection)
                    .with_index(index)
                    .with_message(format!("block {block} holds {}", describe(other)))
                    .into())
            }
        };
        let partial = P::from_arguments(arguments).map_err(|errors| {
            errors
                .into_iter()
                .map(|_| ErrorDetail::new(ErrorKind::IncorrectElementInPartialResultCollection).with_index(index))
                .collect::<ErrorList>()
        })?;
        partials.push((block, partial));
    }
    partials.sort_by_key(|(block, _)| *block);
    Ok(partials)
}

fn describe(value: &Value) -> String {
    match value {
        Value::Arguments(arguments) => format!("arguments tagged {}", arguments.tag()),
        other => other.kind_name().to_string(),
    }
}

/// Keyed collection at `id`, which must be present and non-empty
pub fn require_partials(arguments: &ArgumentCollection, id: ArgId<KeyedCollection>) -> Result<&KeyedCollection, ErrorList> {
    let collection = arguments.require(id, ErrorKind::NullInputDataCollection)?;
    check_not_empty(collection, id.name())?;
    Ok(collection)
}

pub fn check_not_empty(collection: &KeyedCollection, name: &str) -> Status {
    if collection.is_empty() {
        return Err(ErrorDetail::new(ErrorKind::IncorrectNumberOfInputNumericTables)
            .with_argument(name)
            .with_message("partial result collection is empty")
            .into());
    }
    Ok(())
}

/// Check that every value equals the first one, returning it
///
/// `values` yields `(index, value)` pairs; a mismatch reports `kind` with the
/// first value as expected and the offending index.
pub fn check_consistent(
    name: &str,
    kind: ErrorKind,
    values: impl IntoIterator<Item = (usize, usize)>,
) -> Result<Option<usize>, ErrorList> {
    let mut reference = None;
    for (index, value) in values {
        match reference {
            None => reference = Some(value),
            Some(expected) if expected != value => {
                return Err(ErrorDetail::mismatch(kind, name, expected, value).with_index(index).into());
            }
            Some(_) => {}
        }
    }
    Ok(reference)
}

/// Check that per-entry counts add up to `expected`
pub fn check_total(name: &str, kind: ErrorKind, expected: usize, counts: impl IntoIterator<Item = usize>) -> Status {
    let total: usize = counts.into_iter().sum();
    if total != expected {
        return Err(ErrorDetail::mismatch(kind, name, expected, total).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::NumericTable;
    use crate::typed_arguments;

    typed_arguments! {
        struct Partial { tag: 0x7e57_0001, slots: 1 }
    }

    typed_arguments! {
        struct Other { tag: 0x7e57_0002, slots: 1 }
    }

    const COUNT: ArgId<NumericTable> = ArgId::new(0, "count");

    fn partial(count: f64) -> Partial {
        let mut p = Partial::new();
        p.set(COUNT, NumericTable::scalar(count));
        p
    }

    #[test]
    fn test_downcast_sorted_by_block() {
        let input = PartialResultsInput::new().with(7, partial(1.0)).with(2, partial(2.0));
        let partials = input.downcast_all().unwrap();
        let blocks: Vec<_> = partials.iter().map(|(b, _)| *b).collect();
        assert_eq!(blocks, vec![2, 7]);
        assert_eq!(partials[0].1.table(COUNT).unwrap().value::<f64>(0, 0).unwrap(), 2.0);
    }

    #[test]
    fn test_downcast_wrong_subtype() {
        let mut collection = KeyedCollection::new();
        collection.insert_arguments(0, partial(1.0));
        collection.insert_arguments(1, Other::new());
        let errors = downcast_all::<Partial>(&collection).unwrap_err();
        let detail = errors.first().unwrap();
        assert_eq!(detail.kind, ErrorKind::IncorrectElementInPartialResultCollection);
        assert_eq!(detail.index, Some(1));

        let mut collection = KeyedCollection::new();
        collection.insert(3, Value::Table(Arc::new(NumericTable::scalar(1.0f64))));
        let errors = downcast_all::<Partial>(&collection).unwrap_err();
        assert_eq!(errors.first().unwrap().index, Some(0));
    }

    #[test]
    fn test_require_partials() {
        typed_arguments! {
            struct MasterInput { tag: 0x7e57_0003, slots: 1 }
        }
        const PARTIALS: ArgId<KeyedCollection> = ArgId::new(0, "partialResults");

        let mut input = MasterInput::new();
        let errors = require_partials(&input, PARTIALS).unwrap_err();
        assert!(errors.contains(ErrorKind::NullInputDataCollection));

        input.set(PARTIALS, KeyedCollection::new());
        let errors = require_partials(&input, PARTIALS).unwrap_err();
        assert!(errors.contains(ErrorKind::IncorrectNumberOfInputNumericTables));

        input.set(PARTIALS, PartialResultsInput::new().with(0, partial(1.0)));
        assert_eq!(require_partials(&input, PARTIALS).unwrap().len(), 1);
    }

    #[test]
    fn test_consistency_and_total() {
        let common = check_consistent("features", ErrorKind::IncorrectNumberOfFeatures, [(0, 3), (1, 3)]).unwrap();
        assert_eq!(common, Some(3));

        let errors =
            check_consistent("features", ErrorKind::IncorrectNumberOfFeatures, [(0, 3), (1, 3), (2, 4)]).unwrap_err();
        let detail = errors.first().unwrap();
        assert_eq!((detail.expected, detail.actual, detail.index), (Some(3), Some(4), Some(2)));

        assert!(check_total("clusters", ErrorKind::IncorrectTotalNumberOfPartialClusters, 5, [2, 3]).is_ok());
        let errors = check_total("clusters", ErrorKind::IncorrectTotalNumberOfPartialClusters, 6, [2, 3]).unwrap_err();
        assert!(errors.contains(ErrorKind::IncorrectTotalNumberOfPartialClusters));
    }

    #[test]
    fn test_step_names() {
        assert_eq!(DistributedStep::Step2Master.to_string(), "step2_master");
        assert!(DistributedStep::Step2Master.is_master());
        assert!(!DistributedStep::Step1Local.is_master());
    }
}
