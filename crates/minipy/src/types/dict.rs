//! Insertion-ordered dictionary keyed by a hashable value projection.

use indexmap::IndexMap;

use crate::{heap::Heap, intern::Interns, value::Value};

/// Hashable projection of a value, used as the lookup key for dicts and
/// sets.
///
/// Numeric values are normalized so that `True`, `1` and `1.0` address the
/// same slot, matching Python's cross-type key equality. Strings are
/// unified across interned and heap forms by owning the text. Tuples
/// project recursively. Mutable containers have no projection and are
/// rejected as unhashable by [`DictKey::from_value`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum DictKey {
    None,
    Int(i64),
    /// Bit pattern of a float with no integral normalization.
    FloatBits(u64),
    Str(String),
    Tuple(Vec<DictKey>),
}

impl DictKey {
    /// Projects a value into a key, or `None` if the value is unhashable.
    pub fn from_value(value: &Value, heap: &Heap, interns: &Interns) -> Option<Self> {
        match value {
            Value::None => Some(Self::None),
            Value::Bool(b) => Some(Self::Int(i64::from(*b))),
            Value::Int(i) => Some(Self::Int(*i)),
            Value::Float(x) => Some(Self::from_float(*x)),
            Value::InternString(id) => Some(Self::Str(interns.get_str(*id).to_owned())),
            Value::Ref(id) => match heap.get(*id) {
                crate::heap::HeapData::Str(s) => Some(Self::Str(s.clone())),
                crate::heap::HeapData::Tuple(items) => {
                    let keys = items
                        .iter()
                        .map(|item| Self::from_value(item, heap, interns))
                        .collect::<Option<Vec<_>>>()?;
                    Some(Self::Tuple(keys))
                }
                _ => None,
            },
            Value::Code(_) => None,
        }
    }

    /// Projects a string directly, used for keyword-argument collection
    /// where keys are interned identifiers.
    pub fn from_name(s: &str) -> Self {
        Self::Str(s.to_owned())
    }

    fn from_float(x: f64) -> Self {
        // Integral floats share a slot with the equal int (1.0 == 1).
        if x.fract() == 0.0 && x >= -9_007_199_254_740_992.0 && x <= 9_007_199_254_740_992.0 {
            Self::Int(x as i64)
        } else {
            Self::FloatBits(x.to_bits())
        }
    }
}

/// An insertion-ordered mapping from hashable keys to values.
///
/// Each entry stores the original key value alongside the bound value so
/// iteration and repr can reproduce the keys as written.
#[derive(Debug, Clone, Default)]
pub(crate) struct Dict {
    entries: IndexMap<DictKey, (Value, Value)>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts or replaces an entry, returning the previous value if any.
    pub fn set(&mut self, key: DictKey, key_value: Value, value: Value) -> Option<Value> {
        self.entries.insert(key, (key_value, value)).map(|(_, old)| old)
    }

    pub fn get(&self, key: &DictKey) -> Option<&Value> {
        self.entries.get(key).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &DictKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Removes an entry, preserving the order of the remaining entries.
    pub fn remove(&mut self, key: &DictKey) -> Option<Value> {
        self.entries.shift_remove(key).map(|(_, v)| v)
    }

    /// Iterates `(key value, bound value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.values().map(|(k, v)| (k, v))
    }

    /// Iterates entries with their key projections, for merging.
    pub fn iter_projected(&self) -> impl Iterator<Item = (&DictKey, &Value, &Value)> {
        self.entries.iter().map(|(pk, (k, v))| (pk, k, v))
    }
}
