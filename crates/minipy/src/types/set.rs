//! Insertion-ordered set backed by the same key projection as dicts.

use indexmap::IndexMap;

use crate::{types::DictKey, value::Value};

/// An insertion-ordered collection of unique hashable values.
#[derive(Debug, Clone, Default)]
pub(crate) struct Set {
    entries: IndexMap<DictKey, Value>,
}

impl Set {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds an element; returns false if it was already present.
    pub fn add(&mut self, key: DictKey, value: Value) -> bool {
        self.entries.insert(key, value).is_none()
    }

    pub fn contains(&self, key: &DictKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.entries.values()
    }

    pub fn iter_projected(&self) -> impl Iterator<Item = (&DictKey, &Value)> {
        self.entries.iter()
    }

    /// Elements of `self` also present in `other`.
    pub fn intersection(&self, other: &Self) -> Self {
        let entries = self
            .entries
            .iter()
            .filter(|(key, _)| other.contains(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Self { entries }
    }

    /// Elements of `self` not present in `other`.
    pub fn difference(&self, other: &Self) -> Self {
        let entries = self
            .entries
            .iter()
            .filter(|(key, _)| !other.contains(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Self { entries }
    }

    /// Elements of `self` and `other`, keeping first-seen order.
    pub fn union(&self, other: &Self) -> Self {
        let mut out = self.clone();
        for (key, value) in &other.entries {
            if !out.contains(key) {
                out.add(key.clone(), value.clone());
            }
        }
        out
    }

    /// Elements present in exactly one of the two sets.
    pub fn symmetric_difference(&self, other: &Self) -> Self {
        let mut out = self.difference(other);
        for (key, value) in &other.entries {
            if !self.contains(key) {
                out.add(key.clone(), value.clone());
            }
        }
        out
    }
}
