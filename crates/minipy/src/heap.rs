//! Arena storage for heap-allocated values.
//!
//! The heap is a per-run arena: entries are allocated while a run
//! executes and dropped wholesale when the run's heap goes away.
//! `Value::Ref` copies alias the same entry, which gives mutable
//! containers Python's aliasing semantics without per-value bookkeeping.

use crate::{
    function::Closure,
    types::{Dict, IterState, Set, Slice},
    value::Value,
};

/// Index of an entry in the heap arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct HeapId(u32);

impl HeapId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A heap-allocated value.
#[derive(Debug, Clone)]
pub(crate) enum HeapData {
    /// A computed (non-interned) string.
    Str(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Set(Set),
    Dict(Dict),
    Slice(Slice),
    Closure(Closure),
    Iter(IterState),
}

impl HeapData {
    /// Python-style type name, used in fault messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::Set(_) => "set",
            Self::Dict(_) => "dict",
            Self::Slice(_) => "slice",
            Self::Closure(_) => "function",
            Self::Iter(_) => "iterator",
        }
    }
}

/// The arena of heap values for one run.
#[derive(Debug, Default)]
pub(crate) struct Heap {
    entries: Vec<HeapData>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a new entry and returns its id.
    pub fn allocate(&mut self, data: HeapData) -> HeapId {
        let id = HeapId(u32::try_from(self.entries.len()).expect("heap arena overflow"));
        self.entries.push(data);
        id
    }

    /// Allocates a string, returning it as a value.
    pub fn allocate_str(&mut self, s: String) -> Value {
        Value::Ref(self.allocate(HeapData::Str(s)))
    }

    pub fn get(&self, id: HeapId) -> &HeapData {
        &self.entries[id.index()]
    }

    pub fn get_mut(&mut self, id: HeapId) -> &mut HeapData {
        &mut self.entries[id.index()]
    }
}
