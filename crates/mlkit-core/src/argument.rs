//! Keyed heterogeneous argument collections
//!
//! Every algorithm exchanges data through [`ArgumentCollection`]s: a tag
//! naming the concrete subtype plus a vector of optional [`Value`] slots.
//! Slots are addressed by [`ArgId`]s, which carry the expected payload type
//! so that reading a slot is a checked match instead of a cast.

use crate::error::{ErrorDetail, ErrorKind, ErrorList, Status};
use crate::table::{NumericTable, Tensor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Identifier of a worker or data block in distributed computations
pub type BlockId = u64;

/// Self-describing tag of a concrete argument collection subtype
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArgumentTag(pub u32);

impl fmt::Display for ArgumentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Which side of a computation an argument belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentRole {
    Input,
    Result,
    PartialResult,
}

impl ArgumentRole {
    /// Error reported when a required table in this role is missing
    pub fn null_table_kind(&self) -> ErrorKind {
        match self {
            ArgumentRole::Input => ErrorKind::NullInputNumericTable,
            ArgumentRole::Result => ErrorKind::NullResultNumericTable,
            ArgumentRole::PartialResult => ErrorKind::NullPartialResult,
        }
    }
}

/// Value stored in an argument slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    Table(Arc<NumericTable>),
    Tensor(Arc<Tensor>),
    Model(Arc<Model>),
    Arguments(Arc<ArgumentCollection>),
    Collection(Arc<DataCollection>),
    KeyedCollection(Arc<KeyedCollection>),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Table(_) => NumericTable::KIND,
            Value::Tensor(_) => Tensor::KIND,
            Value::Model(_) => Model::KIND,
            Value::Arguments(_) => ArgumentCollection::KIND,
            Value::Collection(_) => DataCollection::KIND,
            Value::KeyedCollection(_) => KeyedCollection::KIND,
        }
    }
}

/// Payload types that can occupy an argument slot
pub trait ValueKind: Sized {
    const KIND: &'static str;

    fn wrap(value: Arc<Self>) -> Value;

    fn unwrap(value: &Value) -> Option<&Arc<Self>>;

    fn unwrap_mut(value: &mut Value) -> Option<&mut Arc<Self>>;
}

macro_rules! impl_value_kind {
    ($ty:ty, $variant:ident, $name:literal) => {
        impl ValueKind for $ty {
            const KIND: &'static str = $name;

            fn wrap(value: Arc<Self>) -> Value {
                Value::$variant(value)
            }

            fn unwrap(value: &Value) -> Option<&Arc<Self>> {
                match value {
                    Value::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn unwrap_mut(value: &mut Value) -> Option<&mut Arc<Self>> {
                match value {
                    Value::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

impl_value_kind!(NumericTable, Table, "numeric table");
impl_value_kind!(Tensor, Tensor, "tensor");
impl_value_kind!(Model, Model, "model");
impl_value_kind!(ArgumentCollection, Arguments, "argument collection");
impl_value_kind!(DataCollection, Collection, "data collection");
impl_value_kind!(KeyedCollection, KeyedCollection, "keyed collection");

/// Slot identifier carrying the payload type stored at that slot
pub struct ArgId<V> {
    index: usize,
    name: &'static str,
    _marker: PhantomData<fn() -> V>,
}

impl<V> ArgId<V> {
    pub const fn new(index: usize, name: &'static str) -> Self {
        Self {
            index,
            name,
            _marker: PhantomData,
        }
    }

    pub const fn index(&self) -> usize {
        self.index
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<V> Clone for ArgId<V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for ArgId<V> {}

impl<V> fmt::Debug for ArgId<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.index)
    }
}

/// Tagged sequence of optional value slots
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArgumentCollection {
    tag: ArgumentTag,
    slots: Vec<Option<Value>>,
}

impl ArgumentCollection {
    pub fn new(tag: ArgumentTag, n_slots: usize) -> Self {
        Self {
            tag,
            slots: vec![None; n_slots],
        }
    }

    pub fn tag(&self) -> ArgumentTag {
        self.tag
    }

    /// Fail unless this collection carries `expected`
    pub fn expect_tag(&self, expected: ArgumentTag) -> Status {
        if self.tag != expected {
            return Err(ErrorDetail::new(ErrorKind::IncorrectSerializationTag)
                .with_message(format!("expected tag {expected}, found {}", self.tag))
                .into());
        }
        Ok(())
    }

    /// Number of occupied slots
    pub fn size(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Payload at `id`, or `None` if unset or holding another kind
    pub fn get<V: ValueKind>(&self, id: ArgId<V>) -> Option<&Arc<V>> {
        self.value(id.index).and_then(V::unwrap)
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Store `value` at `id`, releasing any previous occupant
    pub fn set<V: ValueKind>(&mut self, id: ArgId<V>, value: impl Into<Arc<V>>) {
        self.set_value(id.index, V::wrap(value.into()));
    }

    pub fn set_value(&mut self, index: usize, value: Value) {
        if index >= self.slots.len() {
            self.slots.resize(index + 1, None);
        }
        self.slots[index] = Some(value);
    }

    /// Remove and return the payload at `id`
    pub fn take<V: ValueKind>(&mut self, id: ArgId<V>) -> Option<Arc<V>> {
        let slot = self.slots.get_mut(id.index)?;
        match slot.take() {
            Some(value) => match V::unwrap(&value) {
                Some(inner) => Some(Arc::clone(inner)),
                None => {
                    *slot = Some(value);
                    None
                }
            },
            None => None,
        }
    }

    pub fn clear<V>(&mut self, id: ArgId<V>) {
        if let Some(slot) = self.slots.get_mut(id.index) {
            *slot = None;
        }
    }

    /// Mutable access, cloning the payload first if it is shared
    pub fn get_mut<V: ValueKind + Clone>(&mut self, id: ArgId<V>) -> Option<&mut V> {
        let value = self.slots.get_mut(id.index)?.as_mut()?;
        V::unwrap_mut(value).map(Arc::make_mut)
    }

    pub fn table(&self, id: ArgId<NumericTable>) -> Option<&NumericTable> {
        self.get(id).map(Arc::as_ref)
    }

    pub fn table_mut(&mut self, id: ArgId<NumericTable>) -> Option<&mut NumericTable> {
        self.get_mut(id)
    }

    pub fn tensor(&self, id: ArgId<Tensor>) -> Option<&Tensor> {
        self.get(id).map(Arc::as_ref)
    }

    /// Table at `id`, or the null error appropriate for `role`
    pub fn require_table(&self, id: ArgId<NumericTable>, role: ArgumentRole) -> Result<&NumericTable, ErrorDetail> {
        self.require(id, role.null_table_kind())
    }

    pub fn require_tensor(&self, id: ArgId<Tensor>) -> Result<&Tensor, ErrorDetail> {
        self.require(id, ErrorKind::NullTensor)
    }

    /// Payload at `id`; a slot of another kind is a type error
    pub fn require<V: ValueKind>(&self, id: ArgId<V>, missing: ErrorKind) -> Result<&V, ErrorDetail> {
        match self.value(id.index) {
            None => Err(ErrorDetail::new(missing).with_argument(id.name)),
            Some(value) => V::unwrap(value).map(Arc::as_ref).ok_or_else(|| {
                ErrorDetail::new(ErrorKind::IncorrectDataType)
                    .with_argument(id.name)
                    .with_message(format!("expected {}, found {}", V::KIND, value.kind_name()))
            }),
        }
    }
}

/// Argument collection subtype with a fixed tag
pub trait TypedArguments: Sized {
    const TAG: ArgumentTag;

    /// Checked conversion from a raw collection
    fn from_arguments(arguments: ArgumentCollection) -> Result<Self, ErrorList>;

    fn arguments(&self) -> &ArgumentCollection;

    fn into_arguments(self) -> ArgumentCollection;
}

/// Declare a tagged newtype over [`ArgumentCollection`]
#[macro_export]
macro_rules! typed_arguments {
    ($(#[$meta:meta])* $vis:vis struct $name:ident { tag: $tag:expr, slots: $slots:expr $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        $vis struct $name($crate::argument::ArgumentCollection);

        impl $name {
            pub fn new() -> Self {
                Self($crate::argument::ArgumentCollection::new(
                    <Self as $crate::argument::TypedArguments>::TAG,
                    $slots,
                ))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl $crate::argument::TypedArguments for $name {
            const TAG: $crate::argument::ArgumentTag = $crate::argument::ArgumentTag($tag);

            fn from_arguments(
                arguments: $crate::argument::ArgumentCollection,
            ) -> ::std::result::Result<Self, $crate::error::ErrorList> {
                arguments.expect_tag(Self::TAG)?;
                Ok(Self(arguments))
            }

            fn arguments(&self) -> &$crate::argument::ArgumentCollection {
                &self.0
            }

            fn into_arguments(self) -> $crate::argument::ArgumentCollection {
                self.0
            }
        }

        impl ::std::ops::Deref for $name {
            type Target = $crate::argument::ArgumentCollection;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl ::std::ops::DerefMut for $name {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.0
            }
        }
    };
}

/// Immutable trained aggregate shared between prediction calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    arguments: ArgumentCollection,
}

impl Model {
    /// Freeze `arguments` into a shareable model
    pub fn freeze(arguments: ArgumentCollection) -> Arc<Model> {
        Arc::new(Self { arguments })
    }

    pub fn tag(&self) -> ArgumentTag {
        self.arguments.tag()
    }

    pub fn arguments(&self) -> &ArgumentCollection {
        &self.arguments
    }

    pub fn table(&self, id: ArgId<NumericTable>) -> Option<&NumericTable> {
        self.arguments.table(id)
    }
}

/// Ordered list of values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataCollection {
    items: Vec<Value>,
}

impl DataCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: Value) {
        self.items.push(value);
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.items.iter()
    }
}

impl FromIterator<Value> for DataCollection {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

/// Values keyed by block id, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyedCollection {
    entries: Vec<(BlockId, Value)>,
}

impl KeyedCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the value for `block`
    pub fn insert(&mut self, block: BlockId, value: Value) {
        match self.entries.iter_mut().find(|(id, _)| *id == block) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((block, value)),
        }
    }

    /// Insert a typed argument collection, e.g. a partial result
    pub fn insert_arguments<A: TypedArguments>(&mut self, block: BlockId, arguments: A) {
        self.insert(block, Value::Arguments(Arc::new(arguments.into_arguments())));
    }

    pub fn get(&self, block: BlockId) -> Option<&Value> {
        self.entries.iter().find(|(id, _)| *id == block).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (BlockId, &Value)> {
        self.entries.iter().map(|(id, v)| (*id, v))
    }

    /// Entries sorted by block id
    ///
    /// Reductions walk this view so that results do not depend on the order
    /// in which partial results arrived.
    pub fn canonical(&self) -> Vec<(BlockId, &Value)> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by_key(|(id, _)| *id);
        entries
    }
}

impl FromIterator<(BlockId, Value)> for KeyedCollection {
    fn from_iter<I: IntoIterator<Item = (BlockId, Value)>>(iter: I) -> Self {
        let mut collection = Self::new();
        for (block, value) in iter {
            collection.insert(block, value);
        }
        collection
    }
}
